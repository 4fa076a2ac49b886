//! Scenario runner.
//!
//! Runs one scenario per fresh session:
//!
//! 1. build a fresh route table from the scenario's mocks
//! 2. launch an isolated session and install the table before any navigation
//! 3. execute steps in order, stopping at the first failure
//! 4. on failure, capture `<artifact_dir>/<scenario_id>-failure.png`
//! 5. close the session on every path
//!
//! Both teardown steps are bounded by the action timeout.
//!
//! [`ScenarioRunner::run`] never returns an error; every problem ends up in
//! the [`RunResult`]'s [`Outcome`].

use crate::driver::{BrowserSession, ElementState, SessionLauncher};
use crate::network::{RouteTable, UrlGlob};
use crate::outcome::{ErrorKind, RunResult};
use crate::reporter::Reporter;
use crate::result::{VerifyError, VerifyResult};
use crate::scenario::Scenario;
use crate::selector::Selector;
use crate::step::Step;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default base URL of the app under test
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
/// Default artifact directory
pub const DEFAULT_ARTIFACT_DIR: &str = "target/chatverify";
/// URLs strict mode applies to by default
pub const DEFAULT_STRICT_SCOPE: &str = "**/api/**";

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Directory for screenshots
    pub artifact_dir: PathBuf,
    /// Base for relative navigation URLs
    pub base_url: String,
    /// Auto-wait for `click` and `assert_visible`
    pub action_timeout: Duration,
    /// Limit for one navigation
    pub navigation_timeout: Duration,
    /// Limit for the whole step sequence (None = unlimited)
    pub scenario_timeout: Option<Duration>,
    /// Fail on requests no mock answers
    pub strict: bool,
    /// URLs strict mode applies to
    pub strict_scope: String,
    /// Delay between element polls
    pub poll_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            base_url: DEFAULT_BASE_URL.to_string(),
            action_timeout: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(30),
            scenario_timeout: Some(Duration::from_secs(60)),
            strict: false,
            strict_scope: DEFAULT_STRICT_SCOPE.to_string(),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl RunnerConfig {
    /// Set artifact directory
    #[must_use]
    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Set base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set action timeout
    #[must_use]
    pub const fn action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Set navigation timeout
    #[must_use]
    pub const fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Set scenario timeout
    #[must_use]
    pub const fn scenario_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.scenario_timeout = timeout;
        self
    }

    /// Enable strict mode
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set strict-mode scope
    #[must_use]
    pub fn strict_scope(mut self, scope: impl Into<String>) -> Self {
        self.strict_scope = scope.into();
        self
    }

    /// Set element poll interval
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Resolve a step URL against the base URL
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        if url.contains("://") || url.starts_with("about:") || url.starts_with("data:") {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }

    /// Path of a step's screenshot
    #[must_use]
    pub fn artifact_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.artifact_dir.join(path)
        }
    }

    /// Path of a scenario's failure screenshot
    #[must_use]
    pub fn failure_screenshot_path(&self, scenario_id: &str) -> PathBuf {
        self.artifact_dir.join(format!("{scenario_id}-failure.png"))
    }
}

/// Step progress, readable after the step future is dropped
#[derive(Debug, Default)]
struct Progress {
    step: usize,
    artifacts: Vec<PathBuf>,
}

/// Executes scenarios against sessions from a launcher
pub struct ScenarioRunner<L: SessionLauncher> {
    launcher: L,
    config: RunnerConfig,
}

impl<L: SessionLauncher> std::fmt::Debug for ScenarioRunner<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<L: SessionLauncher> ScenarioRunner<L> {
    /// Create a runner
    pub const fn new(launcher: L, config: RunnerConfig) -> Self {
        Self { launcher, config }
    }

    /// Runner configuration
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Session launcher
    #[must_use]
    pub const fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Run one scenario to its terminal result
    pub async fn run(&self, scenario: &Scenario) -> RunResult {
        let started = Instant::now();
        let id = scenario.id();
        tracing::info!(scenario = id, steps = scenario.steps().len(), "running scenario");

        let table = match self.route_table(scenario) {
            Ok(table) => Arc::new(table),
            Err(e) => {
                return RunResult::failed(id, 0, ErrorKind::SessionError, e.to_string())
                    .with_duration(started.elapsed());
            }
        };

        let mut session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(scenario = id, error = %e, "session launch failed");
                return RunResult::failed(id, 0, ErrorKind::SessionError, e.to_string())
                    .with_duration(started.elapsed());
            }
        };

        let mut progress = Progress::default();
        let failure = match session.install_routes(Arc::clone(&table)).await {
            Err(e) => Some((0, ErrorKind::SessionError, e.to_string())),
            Ok(()) => {
                self.execute_with_deadline(&mut *session, scenario, &table, &mut progress)
                    .await
            }
        };

        let teardown = self.config.action_timeout;
        if let Some((step, _, _)) = &failure {
            if *step > 0 {
                let path = self.config.failure_screenshot_path(id);
                match tokio::time::timeout(teardown, capture(&mut *session, &path)).await {
                    Ok(Ok(())) => progress.artifacts.push(path),
                    Ok(Err(e)) => {
                        tracing::warn!(scenario = id, error = %e, "failure screenshot not captured");
                    }
                    Err(_) => {
                        tracing::warn!(scenario = id, "failure screenshot timed out");
                    }
                }
            }
        }

        match tokio::time::timeout(teardown, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(scenario = id, error = %e, "session did not close cleanly");
            }
            Err(_) => tracing::warn!(scenario = id, "session close timed out"),
        }

        let result = match failure {
            None => RunResult::passed(id, scenario.steps().len()),
            Some((step, kind, message)) => {
                tracing::warn!(scenario = id, step, %kind, %message, "scenario failed");
                RunResult::failed(id, step, kind, message)
            }
        };
        let result = result
            .with_artifacts(progress.artifacts)
            .with_duration(started.elapsed());
        tracing::info!(
            scenario = id,
            passed = result.is_passed(),
            duration_ms = millis(result.duration),
            "scenario finished"
        );
        result
    }

    /// Run scenarios in order, recording each result.
    ///
    /// The reporter is reset first. A failed scenario never stops the batch.
    pub async fn run_batch(&self, scenarios: &[Scenario], reporter: &mut Reporter) {
        reporter.reset();
        for scenario in scenarios {
            let result = self.run(scenario).await;
            reporter.record(scenario.id(), result);
        }
    }

    fn route_table(&self, scenario: &Scenario) -> VerifyResult<RouteTable> {
        let table = scenario.route_table();
        if !self.config.strict {
            return Ok(table);
        }
        let scope = if self.config.strict_scope.is_empty() {
            None
        } else {
            Some(UrlGlob::new(&self.config.strict_scope)?)
        };
        Ok(table.strict(scope))
    }

    async fn execute_with_deadline(
        &self,
        session: &mut dyn BrowserSession,
        scenario: &Scenario,
        table: &RouteTable,
        progress: &mut Progress,
    ) -> Option<(usize, ErrorKind, String)> {
        let Some(limit) = self.config.scenario_timeout else {
            return self.execute(session, scenario, table, progress).await;
        };
        let execution = self.execute(session, scenario, table, progress);
        let outcome = tokio::time::timeout(limit, execution).await;
        outcome.unwrap_or_else(|_| {
            Some((
                progress.step,
                ErrorKind::ScenarioTimeout,
                format!(
                    "scenario exceeded {}ms during step {}",
                    limit.as_millis(),
                    progress.step
                ),
            ))
        })
    }

    async fn execute(
        &self,
        session: &mut dyn BrowserSession,
        scenario: &Scenario,
        table: &RouteTable,
        progress: &mut Progress,
    ) -> Option<(usize, ErrorKind, String)> {
        for (i, step) in scenario.steps().iter().enumerate() {
            let index = i + 1;
            progress.step = index;
            tracing::debug!(
                scenario = scenario.id(),
                step = index,
                action = %step.describe(),
                "step"
            );

            let outcome = self.execute_step(session, step).await;
            // Mock faults win over the step's own error.
            if let Some(fault) = fault_message(table) {
                let message = match outcome {
                    Ok(artifact) => {
                        progress.artifacts.extend(artifact);
                        fault
                    }
                    Err(e) => format!("{fault} (step failed with: {e})"),
                };
                return Some((index, ErrorKind::RouteMockError, message));
            }
            match outcome {
                Ok(artifact) => progress.artifacts.extend(artifact),
                Err(e) => return Some((index, e.kind(), e.to_string())),
            }
        }
        None
    }

    async fn execute_step(
        &self,
        session: &mut dyn BrowserSession,
        step: &Step,
    ) -> VerifyResult<Option<PathBuf>> {
        match step {
            Step::Navigate { url } => {
                let url = self.config.resolve_url(url);
                let timeout = self.config.navigation_timeout;
                match tokio::time::timeout(timeout, session.navigate(&url)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        return Err(VerifyError::Navigation {
                            url,
                            message: format!("no load event within {}ms", timeout.as_millis()),
                        })
                    }
                }
            }
            Step::SetStorage { key, value } => session.set_storage(key, value).await?,
            Step::Click { selector } => {
                let timeout = self.config.action_timeout;
                self.wait_for_state(session, selector, timeout, |s| s == ElementState::Visible)
                    .await?;
                if !session.click(selector).await? {
                    return Err(VerifyError::SelectorTimeout {
                        selector: selector.to_string(),
                        timeout_ms: millis(timeout),
                    });
                }
            }
            Step::WaitFor {
                selector,
                timeout_ms,
            } => {
                self.wait_for_state(
                    session,
                    selector,
                    Duration::from_millis(*timeout_ms),
                    |s| s == ElementState::Visible,
                )
                .await?;
            }
            Step::AssertVisible { selector } => {
                let timeout = self.config.action_timeout;
                let last = self
                    .poll(session, selector, timeout, |s| s == ElementState::Visible)
                    .await?;
                if last != ElementState::Visible {
                    let state = if last == ElementState::Hidden {
                        "hidden"
                    } else {
                        "not found"
                    };
                    return Err(VerifyError::assertion(format!(
                        "expected `{selector}` to be visible, but it was {state} after {}ms",
                        timeout.as_millis()
                    )));
                }
            }
            Step::Screenshot { path } => {
                let path = self.config.artifact_path(path);
                capture(session, &path).await?;
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    async fn wait_for_state(
        &self,
        session: &mut dyn BrowserSession,
        selector: &Selector,
        timeout: Duration,
        done: impl Fn(ElementState) -> bool + Send + Sync,
    ) -> VerifyResult<()> {
        let last = self.poll(session, selector, timeout, &done).await?;
        if done(last) {
            Ok(())
        } else {
            Err(VerifyError::SelectorTimeout {
                selector: selector.to_string(),
                timeout_ms: millis(timeout),
            })
        }
    }

    /// Poll until `done` holds or `timeout` elapses; returns the last state seen
    async fn poll(
        &self,
        session: &mut dyn BrowserSession,
        selector: &Selector,
        timeout: Duration,
        done: impl Fn(ElementState) -> bool + Send + Sync,
    ) -> VerifyResult<ElementState> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = session.query(selector).await?;
            let now = Instant::now();
            if done(state) || now >= deadline {
                return Ok(state);
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Faults recorded by the route table since the last check
fn fault_message(table: &RouteTable) -> Option<String> {
    let faults = table.take_faults();
    let first = faults.first()?;
    Some(if faults.len() > 1 {
        format!("{} (+{} more)", first.message, faults.len() - 1)
    } else {
        first.message.clone()
    })
}

async fn capture(session: &mut dyn BrowserSession, path: &Path) -> VerifyResult<()> {
    let png = session.screenshot().await?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, png).await?;
    tracing::debug!(path = %path.display(), "screenshot written");
    Ok(())
}
