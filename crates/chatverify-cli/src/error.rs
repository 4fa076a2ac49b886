//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Argument names neither a catalog scenario nor a file
    #[error("Unknown scenario '{name}' (run `chatverify list` for built-in ids)")]
    UnknownScenario {
        /// Name as given on the command line
        name: String,
    },

    /// One or more scenario files failed validation
    #[error("{invalid} of {total} scenario file(s) invalid")]
    InvalidScenarios {
        /// Files that failed
        invalid: usize,
        /// Files checked
        total: usize,
    },

    /// One or more scenarios failed
    #[error("{failed} of {total} scenario(s) failed")]
    ScenariosFailed {
        /// Scenarios that failed
        failed: usize,
        /// Scenarios run
        total: usize,
    },

    /// Browser support was compiled out
    #[error("Browser support not enabled. Rebuild with --features browser")]
    BrowserUnavailable,

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Library error
    #[error("Scenario error: {0}")]
    Verify(#[from] chatverify::VerifyError),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an unknown scenario error
    #[must_use]
    pub fn unknown_scenario(name: impl Into<String>) -> Self {
        Self::UnknownScenario { name: name.into() }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("bad timeout");
        assert!(err.to_string().contains("Configuration"));
        assert!(err.to_string().contains("bad timeout"));
    }

    #[test]
    fn test_unknown_scenario_error() {
        let err = CliError::unknown_scenario("chat-nope");
        assert!(err.to_string().contains("'chat-nope'"));
        assert!(err.to_string().contains("chatverify list"));
    }

    #[test]
    fn test_scenarios_failed_error() {
        let err = CliError::ScenariosFailed {
            failed: 1,
            total: 3,
        };
        assert_eq!(err.to_string(), "1 of 3 scenario(s) failed");
    }

    #[test]
    fn test_verify_error_from() {
        let err: CliError = chatverify::VerifyError::invalid_scenario("no steps").into();
        assert!(err.to_string().contains("no steps"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(cli_err.to_string().contains("I/O"));
    }
}
