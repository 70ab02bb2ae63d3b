//! Error types for the claim API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use claim_core::{ClaimError, ClassificationError, EmbeddingError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Claim(e) => match e {
                ClaimError::InvalidClaim
                | ClaimError::InvalidTopK
                | ClaimError::Embedding(EmbeddingError::EmptyInput) => StatusCode::BAD_REQUEST,
                ClaimError::NotFound(_) => StatusCode::NOT_FOUND,
                ClaimError::Embedding(EmbeddingError::Timeout(_))
                | ClaimError::Classification(ClassificationError::Timeout(_)) => {
                    StatusCode::GATEWAY_TIMEOUT
                }
                ClaimError::Embedding(EmbeddingError::Backend(_))
                | ClaimError::Classification(ClassificationError::Backend(_)) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::Claim(e) => e.code(),
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!("{} ({}): {}", status, self.code(), self);
            match &self {
                ApiError::Claim(e) if e.is_retryable() => self.to_string(),
                _ => "Internal error".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(ClaimError::InvalidClaim).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(ClaimError::InvalidTopK).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(ClaimError::NotFound(3)).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(ClaimError::from(EmbeddingError::Timeout(Duration::from_secs(1)))).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::from(ClaimError::from(ClassificationError::Backend("gone".into()))).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(ClaimError::CorpusWrite("disk full".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(ApiError::InvalidRequest("x".into()).code(), "INVALID_REQUEST");
        assert_eq!(ApiError::from(ClaimError::InvalidClaim).code(), "INVALID_CLAIM");
    }
}
