//! Error types for the Mixpanel client.

/// Errors that can occur when using the Mixpanel client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request could not complete (connect, DNS, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with something other than `1`.
    #[error("Mixpanel Server Error: {0}")]
    ServerRejection(String),

    /// Invalid argument or configuration.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Background send requested outside a tokio runtime.
    #[error("No tokio runtime available for a background send")]
    NoRuntime,

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
