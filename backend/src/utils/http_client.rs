use reqwest::{Client, ClientBuilder};
use std::time::Duration;

const USER_AGENT: &str = "repo-pulse/1.0.0";

/// Create a configured HTTP client for outbound API calls. Every request made
/// through it is bounded by `timeout`.
pub fn create_http_client(timeout: Duration) -> reqwest::Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}
