use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use raven_messaging::HookError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// User-facing rejection of a write, shown to the sender as-is.
    #[error("{0}")]
    Validation(String),
    #[error("Not found")]
    NotFound,
    #[error("Forbidden")]
    Forbidden,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<HookError> for ApiError {
    fn from(err: HookError) -> Self {
        match err {
            HookError::Validation(msg) => Self::Validation(msg),
            HookError::NotFound(_) => Self::NotFound,
            HookError::Publish(e) => Self::Internal(e.to_string()),
            HookError::Storage(e) => Self::Internal(format!("{:#}", e)),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => {
                debug!(message = %msg, "Validation failed");
                (StatusCode::UNPROCESSABLE_ENTITY, msg)
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            ApiError::BadRequest(msg) => {
                debug!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::Internal(e) => {
                error!(error = %e, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Run blocking storage work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.to_string())
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_messaging::PublishError;
    use uuid::Uuid;

    #[test]
    fn hook_errors_map_to_statuses() {
        let cases = [
            (HookError::Validation("Linked message should be in the same channel".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (HookError::NotFound(Uuid::new_v4()), StatusCode::NOT_FOUND),
            (HookError::Publish(PublishError::Closed), StatusCode::INTERNAL_SERVER_ERROR),
            (HookError::Storage(anyhow::anyhow!("disk full")), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn validation_message_is_passed_through() {
        let err = ApiError::from(HookError::Validation("nope".into()));
        assert_eq!(err.to_string(), "nope");
    }
}
