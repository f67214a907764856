use thiserror::Error;

/// Common error types used across the relay.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broker connection or channel failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Queue declaration, subscription or passive check failure.
    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
