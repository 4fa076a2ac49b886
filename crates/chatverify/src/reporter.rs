//! Result Reporter
//!
//! Accumulates [`RunResult`]s for one batch. The reporter is an explicit
//! `&mut` accumulator handed to [`crate::runner::ScenarioRunner::run_batch`];
//! nothing is persisted unless [`Reporter::write_json`] is called.

use crate::outcome::{Outcome, RunResult};
use crate::result::VerifyResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Aggregate counts for a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Scenarios recorded
    pub total_run: usize,
    /// Scenarios that passed
    pub passed: usize,
    /// Scenarios that failed
    pub failed: usize,
    /// Every artifact written, in record order
    pub artifact_paths: Vec<PathBuf>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} run, {} passed, {} failed",
            self.total_run, self.passed, self.failed
        )
    }
}

/// JSON report document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Unique id of this batch
    pub run_id: Uuid,
    /// When the batch started
    pub started_at: DateTime<Utc>,
    /// Suite name
    pub suite: String,
    /// Aggregate counts
    pub summary: Summary,
    /// Per-scenario results
    pub results: Vec<RunResult>,
}

/// Batch result accumulator
#[derive(Debug)]
pub struct Reporter {
    suite_name: String,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    results: Vec<RunResult>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    /// Create an empty reporter
    #[must_use]
    pub fn new() -> Self {
        Self {
            suite_name: "chatverify".to_string(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            results: Vec::new(),
        }
    }

    /// Set suite name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.suite_name = name.into();
        self
    }

    /// Drop recorded results and start a new batch
    pub fn reset(&mut self) {
        self.results.clear();
        self.run_id = Uuid::new_v4();
        self.started_at = Utc::now();
    }

    /// Record the result of one scenario
    pub fn record(&mut self, scenario_id: impl Into<String>, mut result: RunResult) {
        result.scenario_id = scenario_id.into();
        self.results.push(result);
    }

    /// Id of the current batch
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Results in record order
    #[must_use]
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    /// Failed results
    #[must_use]
    pub fn failures(&self) -> Vec<&RunResult> {
        self.results.iter().filter(|r| !r.is_passed()).collect()
    }

    /// Check if every recorded scenario passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(RunResult::is_passed)
    }

    /// Sum of scenario durations
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.results.iter().map(|r| r.duration).sum()
    }

    /// Aggregate counts and artifacts
    #[must_use]
    pub fn summary(&self) -> Summary {
        let passed = self.results.iter().filter(|r| r.is_passed()).count();
        Summary {
            total_run: self.results.len(),
            passed,
            failed: self.results.len() - passed,
            artifact_paths: self
                .results
                .iter()
                .flat_map(|r| r.artifacts.iter().cloned())
                .collect(),
        }
    }

    /// Plain-text report, one block per scenario
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            let secs = result.duration.as_secs_f64();
            match &result.outcome {
                Outcome::Passed => {
                    out.push_str(&format!("PASS {} ({secs:.2}s)\n", result.scenario_id));
                }
                Outcome::Failed {
                    step_index,
                    kind,
                    message,
                } => {
                    out.push_str(&format!(
                        "FAIL {} ({secs:.2}s) at step {step_index}: {kind}: {message}\n",
                        result.scenario_id
                    ));
                }
            }
            for artifact in &result.artifacts {
                out.push_str(&format!("  artifact: {}\n", artifact.display()));
            }
        }
        out.push_str(&format!("{}: {}\n", self.suite_name, self.summary()));
        out
    }

    /// Snapshot of the batch as a report document
    #[must_use]
    pub fn report(&self) -> Report {
        Report {
            run_id: self.run_id,
            started_at: self.started_at,
            suite: self.suite_name.clone(),
            summary: self.summary(),
            results: self.results.clone(),
        }
    }

    /// Pretty-printed JSON report
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> VerifyResult<String> {
        Ok(serde_json::to_string_pretty(&self.report())?)
    }

    /// Write the JSON report, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns error if file writing fails
    pub fn write_json(&self, path: &Path) -> VerifyResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::ErrorKind;

    fn sample() -> Reporter {
        let mut reporter = Reporter::new().with_name("chat");
        reporter.record(
            "chat-admin-view",
            RunResult::passed("chat-admin-view", 11)
                .with_artifacts(vec![PathBuf::from("out/chat_admin_view.png")])
                .with_duration(Duration::from_millis(1500)),
        );
        reporter.record(
            "chat-new-modal",
            RunResult::failed(
                "chat-new-modal",
                5,
                ErrorKind::SelectorTimeout,
                "Timed out after 5000ms waiting for selector `text=Nova Conversa`",
            )
            .with_artifacts(vec![PathBuf::from("out/chat-new-modal-failure.png")]),
        );
        reporter
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn test_empty_reporter() {
            let reporter = Reporter::new();
            assert_eq!(reporter.summary(), Summary::default());
            assert!(reporter.all_passed());
        }

        #[test]
        fn test_counts_and_artifacts() {
            let reporter = sample();
            let summary = reporter.summary();
            assert_eq!(summary.total_run, 2);
            assert_eq!(summary.passed, 1);
            assert_eq!(summary.failed, 1);
            assert_eq!(
                summary.artifact_paths,
                vec![
                    PathBuf::from("out/chat_admin_view.png"),
                    PathBuf::from("out/chat-new-modal-failure.png"),
                ]
            );
            assert!(!reporter.all_passed());
            assert_eq!(reporter.failures().len(), 1);
            assert_eq!(summary.to_string(), "2 run, 1 passed, 1 failed");
        }

        #[test]
        fn test_record_uses_given_id() {
            let mut reporter = Reporter::new();
            reporter.record("renamed", RunResult::passed("original", 1));
            assert_eq!(reporter.results()[0].scenario_id, "renamed");
        }

        #[test]
        fn test_reset_starts_new_batch() {
            let mut reporter = sample();
            let first_run = reporter.run_id();
            reporter.reset();
            assert!(reporter.results().is_empty());
            assert_ne!(reporter.run_id(), first_run);
        }

        #[test]
        fn test_total_duration() {
            assert_eq!(sample().total_duration(), Duration::from_millis(1500));
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_render_text() {
            let text = sample().render_text();
            assert!(text.contains("PASS chat-admin-view (1.50s)"));
            assert!(text.contains("FAIL chat-new-modal (0.00s) at step 5: SelectorTimeout:"));
            assert!(text.contains("  artifact: out/chat-new-modal-failure.png"));
            assert!(text.ends_with("chat: 2 run, 1 passed, 1 failed\n"));
        }

        #[test]
        fn test_json_report() {
            let reporter = sample();
            let json: serde_json::Value =
                serde_json::from_str(&reporter.to_json().unwrap()).unwrap();
            assert_eq!(json["suite"], "chat");
            assert_eq!(json["run_id"], reporter.run_id().to_string());
            assert_eq!(json["summary"]["failed"], 1);
            assert_eq!(json["results"][1]["outcome"]["status"], "failed");
            assert_eq!(json["results"][1]["outcome"]["kind"], "selector_timeout");
        }

        #[test]
        fn test_write_json_creates_directories() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("reports/run.json");
            sample().write_json(&path).unwrap();
            let report: Report =
                serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
            assert_eq!(report.summary.total_run, 2);
            assert_eq!(report.results.len(), 2);
        }
    }
}
