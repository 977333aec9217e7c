use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::errors::SourceError;

/// Items requested per page when walking a paginated collection.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Thin REST client for the source platform. Owns no state beyond the
/// injected HTTP client, base URL and credential.
#[derive(Clone, Debug)]
pub struct SourceClient {
    http: Client,
    api_base_url: String,
    token: Option<String>,
}

impl SourceClient {
    pub fn new(http: Client, api_base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            api_base_url: api_base_url.into(),
            token,
        }
    }

    fn request(&self, endpoint: &str, params: &[(&str, String)]) -> RequestBuilder {
        let url = format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );

        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .query(params);

        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        request
    }

    /// Single GET returning one JSON document.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let response = self.request(endpoint, params).send().await?;
        decode(classify(response, endpoint).await?).await
    }

    /// Fetch a single page of a collection endpoint.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        page: u32,
        page_size: u32,
    ) -> Result<Vec<T>, SourceError> {
        let mut paged = params.to_vec();
        paged.push(("per_page", page_size.to_string()));
        paged.push(("page", page.to_string()));

        self.get(endpoint, &paged).await
    }

    /// Walk a collection from page 1 until the platform answers with an empty
    /// page. The first failing page aborts the walk; no partial result is returned.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, SourceError> {
        let mut results = Vec::new();
        let mut page = 1;

        loop {
            let items: Vec<T> = self
                .fetch_page(endpoint, params, page, DEFAULT_PAGE_SIZE)
                .await?;

            if items.is_empty() {
                break;
            }

            log::debug!("📥 Fetched {} items from {} (page {})", items.len(), endpoint, page);
            results.extend(items);
            page += 1;
        }

        Ok(results)
    }
}

async fn classify(response: Response, endpoint: &str) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(SourceError::Unauthorized),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimited),
        StatusCode::NOT_FOUND => Err(SourceError::NotFound(endpoint.to_string())),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(SourceError::Upstream {
                status: status.as_u16(),
                body,
            })
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SourceError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode(e.to_string()))
}
