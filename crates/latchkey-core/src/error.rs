use thiserror::Error;

use crate::types::{CountdownKind, CredentialId};

#[derive(Error, Debug)]
pub enum Error {
    // Authentication errors
    #[error("A scan is already in progress")]
    ScanInProgress,

    #[error("Credential not found: {0}")]
    CredentialNotFound(CredentialId),

    #[error("Administrator credential {0} cannot be removed")]
    AdminRemovalRejected(CredentialId),

    #[error("Invalid credential id: {0}")]
    InvalidCredentialId(String),

    // Countdown errors
    #[error("Countdown {kind} is already running")]
    CountdownRunning { kind: CountdownKind },

    // Controller errors
    #[error("Controller is not running")]
    ControllerStopped,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
