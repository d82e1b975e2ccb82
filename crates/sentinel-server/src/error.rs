//! API error type shared by all handlers.

use axum::http::StatusCode;
use axum::Json;
use sentinel_store::StoreError;
use thiserror::Error;

/// Error taxonomy surfaced by the HTTP API.
///
/// Fan-out delivery failures never appear here: they are recovered inside
/// the broadcast registry and the push dispatcher, and an ingestion call
/// succeeds regardless of what happens to its fan-out.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, unknown, or inactive device credential.
    #[error("Invalid or inactive API key")]
    Unauthorized,

    /// Malformed request content, rejected before any persistence.
    #[error("{0}")]
    Validation(String),

    /// Referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness conflict (e.g. duplicate employee id).
    #[error("{0}")]
    Conflict(String),

    /// Storage failure. For batch ingestion this means the whole batch
    /// was rolled back.
    #[error("storage error: {0}")]
    Storage(String),

    /// Anything else (pool exhaustion, task join failure, key material).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthorized => Self::Unauthorized,
            StoreError::DeviceNotFound(id) => Self::NotFound(format!("Device not found: {id}")),
            StoreError::EmployeeNotFound(id) => {
                Self::NotFound(format!("Employee not found: {id}"))
            }
            StoreError::EmployeeExists(id) => {
                Self::Conflict(format!("Employee already exists: {id}"))
            }
            StoreError::Database(e) => Self::Storage(e.to_string()),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Runs a closure against a pooled connection on the blocking thread pool.
///
/// All rusqlite work in request handlers goes through here so the async
/// runtime is never blocked on SQLite I/O.
pub(crate) async fn with_blocking_conn<T, F>(
    pool: sentinel_db::DbPool,
    f: F,
) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| ApiError::Internal(format!("connection pool: {e}")))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}
