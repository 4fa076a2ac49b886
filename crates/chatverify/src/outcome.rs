//! Terminal results of a scenario run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Classification of a failed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Element not found within its timeout
    SelectorTimeout,
    /// Page failed to load
    NavigationError,
    /// A mock producer failed, or strict mode rejected a request
    RouteMockError,
    /// An element assertion did not hold
    AssertionFailure,
    /// The scenario-level deadline elapsed mid-step
    ScenarioTimeout,
    /// A requested screenshot could not be captured or written
    ScreenshotError,
    /// Browser launch or scripting failure
    SessionError,
}

impl ErrorKind {
    /// Stable name used in reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SelectorTimeout => "SelectorTimeout",
            Self::NavigationError => "NavigationError",
            Self::RouteMockError => "RouteMockError",
            Self::AssertionFailure => "AssertionFailure",
            Self::ScenarioTimeout => "ScenarioTimeout",
            Self::ScreenshotError => "ScreenshotError",
            Self::SessionError => "SessionError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Every step completed
    Passed,
    /// Execution stopped at `step_index` (1-based; 0 means before the first step)
    Failed {
        /// Index of the failing step
        step_index: usize,
        /// Error classification
        kind: ErrorKind,
        /// Human-readable message
        message: String,
    },
}

impl Outcome {
    /// Check if the outcome is a pass
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if the outcome is a failure
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Index of the failing step, if any
    #[must_use]
    pub const fn failed_step(&self) -> Option<usize> {
        match self {
            Self::Passed => None,
            Self::Failed { step_index, .. } => Some(*step_index),
        }
    }

    /// Error kind of the failure, if any
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Passed => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Scenario identifier
    pub scenario_id: String,
    /// Terminal outcome
    pub outcome: Outcome,
    /// Screenshots written during the run, failure screenshot included
    pub artifacts: Vec<PathBuf>,
    /// Number of steps that were started
    pub steps_executed: usize,
    /// Wall-clock duration
    pub duration: Duration,
}

impl RunResult {
    /// Create a passing result
    #[must_use]
    pub fn passed(scenario_id: impl Into<String>, steps_executed: usize) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            outcome: Outcome::Passed,
            artifacts: Vec::new(),
            steps_executed,
            duration: Duration::ZERO,
        }
    }

    /// Create a failing result
    #[must_use]
    pub fn failed(
        scenario_id: impl Into<String>,
        step_index: usize,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            outcome: Outcome::Failed {
                step_index,
                kind,
                message: message.into(),
            },
            artifacts: Vec::new(),
            steps_executed: step_index,
            duration: Duration::ZERO,
        }
    }

    /// Attach artifacts
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Vec<PathBuf>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Attach duration
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Check if the scenario passed
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        self.outcome.is_passed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let passed = Outcome::Passed;
        assert!(passed.is_passed());
        assert_eq!(passed.failed_step(), None);

        let failed = Outcome::Failed {
            step_index: 3,
            kind: ErrorKind::SelectorTimeout,
            message: "gone".to_string(),
        };
        assert!(failed.is_failed());
        assert_eq!(failed.failed_step(), Some(3));
        assert_eq!(failed.error_kind(), Some(ErrorKind::SelectorTimeout));
    }

    #[test]
    fn test_failed_result_counts_steps_up_to_failure() {
        let result = RunResult::failed("s", 2, ErrorKind::AssertionFailure, "nope");
        assert_eq!(result.steps_executed, 2);
        assert!(!result.is_passed());
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(Outcome::Failed {
            step_index: 1,
            kind: ErrorKind::NavigationError,
            message: "refused".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "navigation_error");
        assert_eq!(json["step_index"], 1);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::RouteMockError.to_string(), "RouteMockError");
    }
}
