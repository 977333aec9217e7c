use url::Url;

use crate::errors::ServiceError;

/// Validate that a string is a valid URL with http or https scheme
pub fn validate_url(url_str: &str) -> Result<Url, ServiceError> {
    let url = Url::parse(url_str.trim())
        .map_err(|e| ServiceError::InvalidInput(format!("Invalid URL format: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ServiceError::InvalidInput(format!(
            "URL must use http or https scheme, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(ServiceError::InvalidInput("URL must have a host".to_string()));
    }

    Ok(url)
}

/// Split a GitHub repository URL into `(owner, name)`.
///
/// Accepts `https://github.com/<owner>/<name>` with an optional trailing slash,
/// `.git` suffix or extra path segments (`/tree/main`, `/pulls`, ...).
pub fn parse_repo_url(url_str: &str) -> Result<(String, String), ServiceError> {
    let url = validate_url(url_str)?;

    let host = url.host_str().unwrap_or_default();
    if host != "github.com" && host != "www.github.com" {
        return Err(ServiceError::InvalidInput(format!(
            "Not a GitHub repository URL: {}",
            url_str
        )));
    }

    let mut segments = url
        .path_segments()
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty());

    let owner = segments.next();
    let name = segments.next().map(|n| n.trim_end_matches(".git"));

    match (owner, name) {
        (Some(owner), Some(name)) if !name.is_empty() => Ok((owner.to_string(), name.to_string())),
        _ => Err(ServiceError::InvalidInput(format!(
            "Failed to parse GitHub repository URL: {}",
            url_str
        ))),
    }
}
