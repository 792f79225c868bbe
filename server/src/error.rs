//! Server error types.

use shared::RegistrationError;
use thiserror::Error;

/// Failure on the socket side of a connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection is closed")]
    Closed,

    #[error("message of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reading or writing the account file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account file i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("account file is corrupt: {0}")]
    Corrupt(#[from] bincode::Error),
}

/// Fatal startup or shutdown failure.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("packet handler registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),
}
