pub mod issues;
pub mod pull_requests;
pub mod repos;
pub mod sync;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::errors::{ServiceError, SourceError};

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Source(SourceError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServiceError::Source(SourceError::Unauthorized) => StatusCode::UNAUTHORIZED,
            ServiceError::Source(SourceError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Source(_) | ServiceError::Narrative(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        HttpResponse::build(status).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
