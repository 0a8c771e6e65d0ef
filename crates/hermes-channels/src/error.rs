use thiserror::Error;

/// Errors that can occur within adapters and the delivery pipeline.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The adapter has no live connection to its platform.
    #[error("Not connected")]
    NotConnected,

    /// Connection failure, 5xx, timeout. Retried with exponential backoff
    /// before being surfaced.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The platform rejected the message formatting (e.g. markdown parse).
    /// Adapters fall back to plain text before surfacing this.
    #[error("Format rejected: {0}")]
    Format(String),

    /// A delivery target spec named an unknown platform or an unresolvable
    /// channel. Contained per target; other targets are unaffected.
    #[error("Delivery target unresolved: {0}")]
    Unresolved(String),

    /// Document path outside the trusted roots. Never sent.
    #[error("Untrusted path: {0}")]
    UntrustedPath(String),

    /// Document path containing `..` segments. Rejected before any
    /// filesystem access.
    #[error("Path traversal detected: {0}")]
    PathTraversal(String),

    /// The adapter-specific configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
