//! Certificate delivery error types.

use thiserror::Error;

/// Errors that can occur while handing a certificate email to the transport.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The recipient address cannot be used.
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    /// The transport refused or failed to accept the message.
    #[error("Transport failed: {0}")]
    Transport(String),

    /// IO error when writing to the outbox.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;
