//! Console output and progress reporting

use chatverify::{Outcome, RunResult, Summary};
use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// One-line description of a scenario result, without status prefix
#[must_use]
pub fn describe_result(result: &RunResult) -> String {
    let secs = result.duration.as_secs_f64();
    match &result.outcome {
        Outcome::Passed => format!(
            "{} ({} steps, {secs:.2}s)",
            result.scenario_id, result.steps_executed
        ),
        Outcome::Failed {
            step_index,
            kind,
            message,
        } => format!(
            "{} at step {step_index} ({secs:.2}s): {}: {message}",
            result.scenario_id,
            kind.as_str()
        ),
    }
}

/// Progress reporter for scenario runs, writes to stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over `total` scenarios
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Show which scenario is running
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Remove the progress bar
    pub fn finish(&mut self) {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_and_clear();
        }
    }

    fn line(&self, line: &str) {
        match &self.progress_bar {
            Some(pb) => pb.println(line),
            None => {
                let _ = self.term.write_line(line);
            }
        }
    }

    fn prefix(&self, symbol: &str, plain: &str, color: Style) -> String {
        if self.use_color {
            color.bold().apply_to(symbol).to_string()
        } else {
            plain.to_string()
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("✓", "PASS", Style::new().green());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message, even in quiet mode
    pub fn failure(&self, message: &str) {
        let prefix = self.prefix("✗", "FAIL", Style::new().red());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print one scenario result and advance the bar
    pub fn scenario_result(&self, result: &RunResult) {
        let line = describe_result(result);
        if result.is_passed() {
            self.success(&line);
        } else {
            self.failure(&line);
        }
        if !self.quiet || !result.is_passed() {
            for artifact in &result.artifacts {
                self.line(&format!("    artifact: {}", artifact.display()));
            }
        }
        if let Some(ref pb) = self.progress_bar {
            pb.inc(1);
        }
    }

    /// Print the validation outcome of one scenario file
    pub fn validation_result(&self, path: &Path, outcome: Result<&str, String>) {
        match outcome {
            Ok(id) => self.success(&format!("{} ({id})", path.display())),
            Err(message) => self.failure(&format!("{}: {message}", path.display())),
        }
    }

    /// Print batch summary
    pub fn summary(&self, summary: &Summary, duration: Duration) {
        if self.quiet && summary.failed == 0 {
            return;
        }

        let _ = self.term.write_line("");
        let secs = duration.as_secs_f64();
        let line = if self.use_color {
            let status = if summary.failed > 0 {
                style("FAILED").red().bold()
            } else {
                style("PASSED").green().bold()
            };
            format!(
                "{status} {} scenario(s) in {secs:.2}s ({} passed, {} failed)",
                summary.total_run,
                style(summary.passed).green(),
                style(summary.failed).red()
            )
        } else {
            let status = if summary.failed > 0 { "FAILED" } else { "PASSED" };
            format!(
                "{status} {} scenario(s) in {secs:.2}s ({} passed, {} failed)",
                summary.total_run, summary.passed, summary.failed
            )
        };
        let _ = self.term.write_line(&line);
    }
}
