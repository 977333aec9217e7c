use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub http_timeout_secs: u64,
    pub sync_concurrency: usize,
    pub narrative: NarrativeConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NarrativeConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 4000)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            github_token: non_empty_var("GITHUB_TOKEN"),
            github_api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", 15)?,
            sync_concurrency: parse_var::<usize>("SYNC_CONCURRENCY", 8)?.max(1),
            narrative: NarrativeConfig {
                api_key: non_empty_var("NARRATIVE_API_KEY"),
                api_url: env::var("NARRATIVE_API_URL")
                    .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string()),
                model: env::var("NARRATIVE_MODEL")
                    .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
                timeout_secs: parse_var("NARRATIVE_TIMEOUT_SECS", 60)?,
            },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number, got '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}
