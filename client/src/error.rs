use shared::RegistrationError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Io(#[from] io::Error),

    #[error("bad handshake: expected a {expected}-byte token, got {actual} bytes")]
    Handshake { expected: usize, actual: usize },

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("server sent a malformed packet")]
    Corrupted,

    #[error("login refused: {0}")]
    LoginRefused(String),
}
