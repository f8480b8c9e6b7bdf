use thiserror::Error;

/// Errors from local store operations (used by the `LocalStore` trait in parley-core).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database not initialized")]
    NotInitialized,

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Reasons a send request is rejected or cut short by the conversation controller.
///
/// A failed model call is not a `SendError`: it is reported through the
/// turn outcome and the errored assistant message.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("no API key configured")]
    MissingCredential,

    #[error("a message is already being sent")]
    Busy,

    #[error(transparent)]
    Store(#[from] StoreError),
}
