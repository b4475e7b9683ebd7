use thiserror::Error;

pub type Result<T> = std::result::Result<T, WsError>;

/// Error taxonomy for the workstation extension core.
///
/// Validation and concurrency errors are reported synchronously and never
/// retried. Transport errors surface to direct callers; the operation
/// watcher swallows them inside its own polling loop. Timeouts are not an
/// error variant at all: they are a distinct outcome delivered through the
/// watcher's completion callback.
#[derive(Error, Debug)]
pub enum WsError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cannot {action} a workstation that is {state}")]
    InvalidState { action: String, state: String },

    #[error("Remote call failed with HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Management plane unreachable: {0}")]
    Unreachable(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("An operation monitor is already active for '{0}'")]
    AlreadyWatching(String),

    #[error("Creation operation already in progress")]
    AlreadyInProgress,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
