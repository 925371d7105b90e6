use domain_ledger::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectionsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store failure")]
    Store(#[from] StoreError),
}

impl CollectionsError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        CollectionsError::InvalidInput(msg.into())
    }
}
