use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("store session is not connected")]
    NotConnected,
    #[error("no document matches the filter")]
    NotFound,
    #[error("query error: {0}")]
    Query(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}
