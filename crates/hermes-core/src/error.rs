use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing token, invalid policy, unreadable config file. Fatal at
    /// startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Propagated from the external agent engine. The turn ends; the
    /// session survives.
    #[error("Agent error: {0}")]
    Agent(String),

    /// The running turn was cooperatively interrupted. Not a failure;
    /// partial output up to the interrupt is preserved.
    #[error("Turn interrupted")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
