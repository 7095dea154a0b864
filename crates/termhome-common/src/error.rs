//! Common error types for termhome.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`TermhomeError`].
pub type TermhomeResult<T> = Result<T, TermhomeError>;

/// Common errors across termhome.
///
/// Probe failures are never reported through this type; they become
/// `Critical` or `Warning` status results instead.
#[derive(Error, Diagnostic, Debug)]
pub enum TermhomeError {
    /// The container runtime could not be reached.
    #[error("Container runtime unreachable at {endpoint}: {reason}")]
    #[diagnostic(
        code(termhome::runtime::unreachable),
        help("Check that the Docker daemon is running and the socket or host in the docker config is correct")
    )]
    RuntimeUnreachable {
        /// The endpoint that was tried.
        endpoint: String,
        /// Why the connection failed.
        reason: String,
    },

    /// The container runtime answered with something we could not use.
    #[error("Container runtime error: {message}")]
    #[diagnostic(code(termhome::runtime::response))]
    Runtime {
        /// The error message.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(termhome::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(termhome::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(termhome::serialization))]
    Serialization(String),

    /// Internal error (should not happen).
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(termhome::internal),
        help("This is a bug, please report it")
    )]
    Internal {
        /// The error message.
        message: String,
    },
}

impl From<serde_json::Error> for TermhomeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for TermhomeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TermhomeError::RuntimeUnreachable {
            endpoint: "unix:///var/run/docker.sock".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Container runtime unreachable at unix:///var/run/docker.sock: connection refused"
        );
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TermhomeError = io_err.into();
        assert!(matches!(err, TermhomeError::Io(_)));
    }

    #[test]
    fn error_from_yaml_is_config() {
        let yaml_err = serde_yaml::from_str::<Vec<u32>>("{not: a list}").unwrap_err();
        let err: TermhomeError = yaml_err.into();
        assert!(matches!(err, TermhomeError::Config { .. }));
    }
}
