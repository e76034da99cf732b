use thiserror::Error;

/// エラー型
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Transaction aborted after repeated write conflicts")]
    Conflict,
}
