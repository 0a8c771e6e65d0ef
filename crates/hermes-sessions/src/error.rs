use thiserror::Error;

/// Errors that can occur during session-store operations.
///
/// Store errors never kill the gateway: the policy is log, reset the
/// affected session, continue.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading or writing a session blob failed.
    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted blob could not be decoded.
    #[error("corrupt session blob for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
