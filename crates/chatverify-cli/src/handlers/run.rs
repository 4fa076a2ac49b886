//! Run command handler

use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use chatverify::{catalog, Reporter, RunnerConfig, Scenario, ScenarioRunner, SessionLauncher};
use std::path::Path;
use std::time::Duration;

/// Turn command-line targets into scenarios.
///
/// Each target is a built-in id or a path to a scenario file. No targets
/// selects the whole catalog.
pub fn resolve_targets(targets: &[String]) -> CliResult<Vec<Scenario>> {
    if targets.is_empty() {
        return Ok(catalog::all()?);
    }
    targets.iter().map(|target| resolve_target(target)).collect()
}

fn resolve_target(target: &str) -> CliResult<Scenario> {
    if let Some(scenario) = catalog::get(target)? {
        return Ok(scenario);
    }
    let path = Path::new(target);
    let looks_like_file = path
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    if path.is_file() || looks_like_file {
        return Ok(Scenario::load(path)?);
    }
    Err(CliError::unknown_scenario(target))
}

/// Run scenarios one after another, reporting each as it finishes
pub async fn run_scenarios<L: SessionLauncher>(
    runner: &ScenarioRunner<L>,
    scenarios: &[Scenario],
    progress: &mut ProgressReporter,
) -> Reporter {
    let mut reporter = Reporter::new();
    progress.start_progress(scenarios.len() as u64, "starting");
    for scenario in scenarios {
        progress.set_message(scenario.id());
        let result = runner.run(scenario).await;
        progress.scenario_result(&result);
        reporter.record(scenario.id(), result);
    }
    progress.finish();
    reporter
}

/// Write the optional JSON report, print the summary and map failures to an error
pub fn finish_run(
    reporter: &Reporter,
    args: &RunArgs,
    progress: &ProgressReporter,
    elapsed: Duration,
) -> CliResult<()> {
    if let Some(path) = &args.json_report {
        reporter.write_json(path)?;
        tracing::info!(path = %path.display(), "JSON report written");
    }
    let summary = reporter.summary();
    progress.summary(&summary, elapsed);
    if summary.failed > 0 {
        return Err(CliError::ScenariosFailed {
            failed: summary.failed,
            total: summary.total_run,
        });
    }
    Ok(())
}

/// Execute the run command
pub fn execute_run(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let runner_config = args.runner_config()?;
    let scenarios = resolve_targets(&args.targets)?;
    if config.verbosity.is_verbose() {
        let ids: Vec<&str> = scenarios.iter().map(Scenario::id).collect();
        tracing::info!(scenarios = ?ids, base_url = %args.base_url, "resolved scenarios");
    }
    run_in_browser(config, args, runner_config, &scenarios)
}

#[cfg(feature = "browser")]
fn run_in_browser(
    config: &CliConfig,
    args: &RunArgs,
    runner_config: RunnerConfig,
    scenarios: &[Scenario],
) -> CliResult<()> {
    use chatverify::CdpLauncher;

    let rt = tokio::runtime::Runtime::new()?;
    let mut progress =
        ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    let started = std::time::Instant::now();

    let reporter = rt.block_on(async {
        let runner = ScenarioRunner::new(CdpLauncher::new(args.cdp_config()), runner_config);
        let reporter = run_scenarios(&runner, scenarios, &mut progress).await;
        if let Err(e) = runner.launcher().shutdown().await {
            tracing::warn!(error = %e, "chromium did not shut down cleanly");
        }
        reporter
    });

    finish_run(&reporter, args, &progress, started.elapsed())
}

#[cfg(not(feature = "browser"))]
fn run_in_browser(
    _config: &CliConfig,
    _args: &RunArgs,
    _runner_config: RunnerConfig,
    _scenarios: &[Scenario],
) -> CliResult<()> {
    Err(CliError::BrowserUnavailable)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use chatverify::{PageScript, ScriptedLauncher};
    use clap::Parser;

    fn run_args(args: &[&str]) -> RunArgs {
        match Cli::parse_from(["chatverify", "run"].iter().chain(args).copied()).command {
            Commands::Run(args) => args,
            other => panic!("expected Run command, got {other:?}"),
        }
    }

    fn new_modal_page() -> PageScript {
        PageScript::new()
            .element("/chat", "text=Nova Conversa")
            .on_click("text=Nova Conversa", "text=Iniciar conversa com usuário")
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn test_no_targets_selects_catalog() {
            let scenarios = resolve_targets(&[]).unwrap();
            assert_eq!(scenarios.len(), catalog::CATALOG_IDS.len());
        }

        #[test]
        fn test_catalog_id() {
            let scenarios = resolve_targets(&["chat-new-modal".to_string()]).unwrap();
            assert_eq!(scenarios[0].id(), "chat-new-modal");
        }

        #[test]
        fn test_scenario_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("custom.yaml");
            std::fs::write(
                &path,
                "version: \"1.0\"\nid: custom\nsteps:\n  - type: navigate\n    url: /\n",
            )
            .unwrap();
            let scenarios = resolve_targets(&[path.display().to_string()]).unwrap();
            assert_eq!(scenarios[0].id(), "custom");
        }

        #[test]
        fn test_unknown_target() {
            let err = resolve_targets(&["chat-nope".to_string()]).unwrap_err();
            assert!(matches!(err, CliError::UnknownScenario { ref name } if name == "chat-nope"));
        }

        #[test]
        fn test_missing_yaml_file_is_a_load_error() {
            let err = resolve_targets(&["does/not/exist.yaml".to_string()]).unwrap_err();
            assert!(matches!(err, CliError::Verify(_)));
        }
    }

    mod execution_tests {
        use super::*;

        #[tokio::test]
        async fn test_run_scenarios_records_every_result() {
            let dir = tempfile::tempdir().unwrap();
            let runner = ScenarioRunner::new(
                ScriptedLauncher::new(new_modal_page()),
                RunnerConfig::default()
                    .artifact_dir(dir.path())
                    .action_timeout(Duration::from_millis(100)),
            );
            let scenarios = vec![
                catalog::chat_new_modal().unwrap(),
                Scenario::builder("never-renders")
                    .navigate("/chat")
                    .wait_for("text=Conversas", 50)
                    .build()
                    .unwrap(),
            ];
            let mut progress = ProgressReporter::new(false, true);

            let reporter = run_scenarios(&runner, &scenarios, &mut progress).await;

            let summary = reporter.summary();
            assert_eq!(summary.total_run, 2);
            assert_eq!(summary.passed, 1);
            assert_eq!(summary.failed, 1);
            assert!(dir.path().join("chat_new_modal.png").exists());
            assert!(dir.path().join("never-renders-failure.png").exists());
        }

        #[test]
        fn test_finish_run_writes_report_and_fails_on_failures() {
            let dir = tempfile::tempdir().unwrap();
            let report = dir.path().join("report.json");
            let args = run_args(&["--json-report", report.to_str().unwrap()]);
            let progress = ProgressReporter::new(false, true);

            let mut reporter = Reporter::new();
            reporter.record("a", chatverify::RunResult::passed("a", 1));
            finish_run(&reporter, &args, &progress, Duration::ZERO).unwrap();
            assert!(report.exists());

            reporter.record(
                "b",
                chatverify::RunResult::failed(
                    "b",
                    2,
                    chatverify::ErrorKind::AssertionFailure,
                    "hidden",
                ),
            );
            let err = finish_run(&reporter, &args, &progress, Duration::ZERO).unwrap_err();
            assert!(matches!(err, CliError::ScenariosFailed { failed: 1, total: 2 }));
        }
    }
}
