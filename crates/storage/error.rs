use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Lock Error: Panicked when trying to acquire a lock")]
    LockError,
    #[error("{0}")]
    Custom(String),
}
