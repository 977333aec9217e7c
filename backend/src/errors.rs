use thiserror::Error;

/// Failures talking to the source-hosting platform.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("GitHub API unauthorized, check GITHUB_TOKEN")]
    Unauthorized,
    #[error("GitHub API rate limit exceeded, try again later")]
    RateLimited,
    #[error("GitHub resource not found: {0}")]
    NotFound(String),
    #[error("GitHub API error ({status}): {body}")]
    Upstream { status: u16, body: String },
    #[error("GitHub request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("GitHub response could not be decoded: {0}")]
    Decode(String),
}

/// Failures of the narrative-generation collaborator.
#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("narrative request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("narrative API error ({status}): {body}")]
    Upstream { status: u16, body: String },
    #[error("narrative generator returned empty output")]
    Empty,
    #[error("failed to parse structured narrative output: {0}")]
    Parse(String),
    #[error("failed to encode narrative context: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Narrative(#[from] NarrativeError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        ServiceError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
