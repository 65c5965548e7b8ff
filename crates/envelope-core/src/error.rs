//! Error types for the Envelope core.

/// Core error type for Envelope infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A capability was requested from the library registry under an unknown name.
    #[error("Unsupported library to load: '{0}'")]
    UnsupportedLibrary(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Encoded content could not be decoded.
    #[error("invalid encoded content: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for Envelope core operations.
pub type CoreResult<T> = Result<T, CoreError>;
