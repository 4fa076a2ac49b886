//! Result and error types for chatverify.

use thiserror::Error;

/// Result type for chatverify operations
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Errors raised by sessions, route tables and scenario loading.
///
/// The runner never lets these escape: it folds them into a
/// [`crate::outcome::Outcome::Failed`] via [`VerifyError::kind`].
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Browser could not be launched or the session broke
    #[error("Browser session error: {message}")]
    Session {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Selector did not resolve to an element in time
    #[error("Timed out after {timeout_ms}ms waiting for selector `{selector}`")]
    SelectorTimeout {
        /// Selector that never appeared
        selector: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Element assertion failed
    #[error("Assertion failed: {message}")]
    Assertion {
        /// Error message
        message: String,
    },

    /// A fixture producer failed or panicked
    #[error("Route mock for `{pattern}` failed on {url}: {message}")]
    RouteMock {
        /// Pattern of the rule whose producer failed
        pattern: String,
        /// Request URL being resolved
        url: String,
        /// Error message
        message: String,
    },

    /// Strict mode rejected a request no rule matched
    #[error("Unhandled request in strict mode: {method} {url}")]
    UnhandledRequest {
        /// Request method
        method: String,
        /// Request URL
        url: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Script evaluation error
    #[error("Script evaluation failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Invalid glob or selector
    #[error("Invalid pattern `{pattern}`: {message}")]
    InvalidPattern {
        /// Offending pattern
        pattern: String,
        /// Error message
        message: String,
    },

    /// Scenario definition is invalid
    #[error("Invalid scenario: {message}")]
    InvalidScenario {
        /// Error message
        message: String,
    },

    /// Scenario file could not be parsed
    #[error("Failed to parse scenario file: {0}")]
    Parse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VerifyError {
    /// Create a session error
    #[must_use]
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create an assertion error
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    /// Create an invalid scenario error
    #[must_use]
    pub fn invalid_scenario(message: impl Into<String>) -> Self {
        Self::InvalidScenario {
            message: message.into(),
        }
    }

    /// Create a screenshot error
    #[must_use]
    pub fn screenshot(message: impl Into<String>) -> Self {
        Self::Screenshot {
            message: message.into(),
        }
    }

    /// Classify this error for a `Failed` outcome
    #[must_use]
    pub const fn kind(&self) -> crate::outcome::ErrorKind {
        use crate::outcome::ErrorKind;
        match self {
            Self::SelectorTimeout { .. } => ErrorKind::SelectorTimeout,
            Self::Navigation { .. } => ErrorKind::NavigationError,
            Self::RouteMock { .. } | Self::UnhandledRequest { .. } => ErrorKind::RouteMockError,
            Self::Assertion { .. } => ErrorKind::AssertionFailure,
            Self::Screenshot { .. } | Self::Io(_) => ErrorKind::ScreenshotError,
            Self::Session { .. }
            | Self::Script { .. }
            | Self::InvalidPattern { .. }
            | Self::InvalidScenario { .. }
            | Self::Parse(_)
            | Self::Json(_) => ErrorKind::SessionError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::ErrorKind;

    #[test]
    fn test_selector_timeout_display() {
        let err = VerifyError::SelectorTimeout {
            selector: "#missing".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 5000ms waiting for selector `#missing`"
        );
        assert_eq!(err.kind(), ErrorKind::SelectorTimeout);
    }

    #[test]
    fn test_unhandled_request_is_route_mock_error() {
        let err = VerifyError::UnhandledRequest {
            method: "GET".to_string(),
            url: "http://localhost:3000/api/other".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::RouteMockError);
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: VerifyError = io_err.into();
        assert!(err.to_string().contains("I/O"));
        assert_eq!(err.kind(), ErrorKind::ScreenshotError);
    }

    #[test]
    fn test_constructors() {
        assert_eq!(VerifyError::session("x").kind(), ErrorKind::SessionError);
        assert_eq!(
            VerifyError::assertion("x").kind(),
            ErrorKind::AssertionFailure
        );
        assert!(VerifyError::invalid_scenario("no steps")
            .to_string()
            .contains("no steps"));
    }
}
