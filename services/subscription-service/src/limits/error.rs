use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum LimitError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no agent limits found for company {company_id}")]
    NotFound { company_id: String },
    #[error("unable to decode agent limits: {0}")]
    Decode(String),
    #[error("store connection error: {0}")]
    Connection(String),
    #[error("store query error: {0}")]
    Query(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

impl LimitError {
    pub(crate) fn from_store(err: StoreError, company_id: &str) -> Self {
        match err {
            StoreError::NotFound => LimitError::NotFound {
                company_id: company_id.to_string(),
            },
            StoreError::Connection(message) => LimitError::Connection(message),
            StoreError::NotConnected => {
                LimitError::Connection("store session is not connected".into())
            }
            StoreError::Query(message) => LimitError::Query(message),
            StoreError::Serialization(err) => LimitError::Decode(err.to_string()),
        }
    }
}
