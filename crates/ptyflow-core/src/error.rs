//! Error types for ptyflow-core

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ptyflow-core.
///
/// The engine's hot path never returns errors: overload is handled through
/// backpressure advice, bad input is ignored, and recording budget
/// exhaustion is reported through sticky truncation flags. What remains is
/// configuration rejected at construction time and failures reported by
/// registered flush handlers.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration, raised synchronously at construction only.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A flush handler reported a delivery failure. Logged per handler and
    /// isolated from other handlers and from buffer state.
    #[error("flush handler failed: {0}")]
    Handler(String),
}

impl Error {
    /// Shorthand for a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Shorthand for a handler error.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let error = Error::config("buffer capacity must be greater than zero");
        assert_eq!(
            error.to_string(),
            "invalid configuration: buffer capacity must be greater than zero"
        );
    }

    #[test]
    fn handler_error_display() {
        let error = Error::handler("renderer disconnected");
        assert_eq!(error.to_string(), "flush handler failed: renderer disconnected");
    }
}
