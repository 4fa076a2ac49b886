//! CLI command definitions using clap

use chatverify::runner::{DEFAULT_ARTIFACT_DIR, DEFAULT_BASE_URL};
use crate::error::{CliError, CliResult};
use chatverify::RunnerConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// chatverify: declarative UI verification scenarios for the chat interface
#[derive(Parser, Debug)]
#[command(name = "chatverify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (failures only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenarios in a headless browser
    Run(RunArgs),

    /// List built-in scenarios
    List(ListArgs),

    /// Validate scenario files without launching a browser
    Validate(ValidateArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Built-in scenario ids or scenario files (default: every built-in scenario)
    pub targets: Vec<String>,

    /// Base URL of the chat app
    #[arg(long, env = "CHATVERIFY_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Directory for screenshots
    #[arg(short, long, default_value = DEFAULT_ARTIFACT_DIR)]
    pub artifact_dir: PathBuf,

    /// Fail on API requests no mock answers
    #[arg(long)]
    pub strict: bool,

    /// Write a JSON report to this path
    #[arg(long)]
    pub json_report: Option<PathBuf>,

    /// Auto-wait for click and assert_visible, in milliseconds
    #[arg(long, default_value = "5000")]
    pub action_timeout: u64,

    /// Navigation timeout in milliseconds
    #[arg(long, default_value = "30000")]
    pub navigation_timeout: u64,

    /// Scenario timeout in milliseconds (0 = unlimited)
    #[arg(long, default_value = "60000")]
    pub scenario_timeout: u64,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Path to the Chromium executable
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<PathBuf>,
}

impl RunArgs {
    /// Runner configuration from flags.
    ///
    /// Action and navigation timeouts must be positive; a zero scenario
    /// timeout disables it.
    pub fn runner_config(&self) -> CliResult<RunnerConfig> {
        if self.action_timeout == 0 {
            return Err(CliError::config("--action-timeout must be greater than 0"));
        }
        if self.navigation_timeout == 0 {
            return Err(CliError::config(
                "--navigation-timeout must be greater than 0",
            ));
        }
        let scenario_timeout =
            (self.scenario_timeout > 0).then(|| Duration::from_millis(self.scenario_timeout));
        Ok(RunnerConfig::default()
            .base_url(self.base_url.clone())
            .artifact_dir(self.artifact_dir.clone())
            .strict(self.strict)
            .action_timeout(Duration::from_millis(self.action_timeout))
            .navigation_timeout(Duration::from_millis(self.navigation_timeout))
            .scenario_timeout(scenario_timeout))
    }

    /// Chromium launch options from flags
    #[cfg(feature = "browser")]
    #[must_use]
    pub fn cdp_config(&self) -> chatverify::CdpConfig {
        let mut config = chatverify::CdpConfig::default().with_headless(!self.headed);
        if self.no_sandbox {
            config = config.with_no_sandbox();
        }
        if let Some(path) = &self.chromium_path {
            config = config.with_chromium_path(path.clone());
        }
        config
    }
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: ListFormat,
}

/// Output format of the list command
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListFormat {
    /// One scenario per line
    #[default]
    Text,
    /// JSON array
    Json,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Scenario files to check
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> RunArgs {
        let cli = Cli::parse_from(["chatverify", "run"].iter().chain(args).copied());
        match cli.command {
            Commands::Run(args) => args,
            other => panic!("expected Run command, got {other:?}"),
        }
    }

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_run_defaults() {
            let args = run_args(&[]);
            assert!(args.targets.is_empty());
            assert_eq!(args.artifact_dir, PathBuf::from(DEFAULT_ARTIFACT_DIR));
            assert!(!args.strict);
            assert!(args.json_report.is_none());
        }

        #[test]
        fn test_parse_run_targets() {
            let args = run_args(&["chat-admin-view", "scenarios/custom.yaml"]);
            assert_eq!(args.targets, vec!["chat-admin-view", "scenarios/custom.yaml"]);
        }

        #[test]
        fn test_parse_run_flags() {
            let args = run_args(&[
                "--strict",
                "--headed",
                "--no-sandbox",
                "--json-report",
                "out/report.json",
                "--action-timeout",
                "250",
            ]);
            assert!(args.strict);
            assert!(args.headed);
            assert!(args.no_sandbox);
            assert_eq!(args.json_report, Some(PathBuf::from("out/report.json")));
            assert_eq!(args.action_timeout, 250);
        }

        #[test]
        fn test_parse_list_json() {
            let cli = Cli::parse_from(["chatverify", "list", "--format", "json"]);
            match cli.command {
                Commands::List(args) => assert_eq!(args.format, ListFormat::Json),
                other => panic!("expected List command, got {other:?}"),
            }
        }

        #[test]
        fn test_validate_requires_files() {
            assert!(Cli::try_parse_from(["chatverify", "validate"]).is_err());
        }

        #[test]
        fn test_global_verbosity() {
            let cli = Cli::parse_from(["chatverify", "list", "-vv"]);
            assert_eq!(cli.verbose, 2);
            assert!(!cli.quiet);
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_runner_config_from_flags() {
            let config = run_args(&[
                "--base-url",
                "http://127.0.0.1:5173",
                "--artifact-dir",
                "shots",
                "--strict",
                "--navigation-timeout",
                "1000",
            ])
            .runner_config()
            .unwrap();
            assert_eq!(config.base_url, "http://127.0.0.1:5173");
            assert_eq!(config.artifact_dir, PathBuf::from("shots"));
            assert!(config.strict);
            assert_eq!(config.navigation_timeout, Duration::from_secs(1));
            assert_eq!(config.scenario_timeout, Some(Duration::from_secs(60)));
        }

        #[test]
        fn test_zero_scenario_timeout_disables_it() {
            let config = run_args(&["--scenario-timeout", "0"])
                .runner_config()
                .unwrap();
            assert_eq!(config.scenario_timeout, None);
        }

        #[test]
        fn test_zero_action_timeout_is_rejected() {
            let err = run_args(&["--action-timeout", "0"])
                .runner_config()
                .unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
            assert!(err.to_string().contains("--action-timeout"));

            let err = run_args(&["--navigation-timeout", "0"])
                .runner_config()
                .unwrap_err();
            assert!(err.to_string().contains("--navigation-timeout"));
        }

        #[cfg(feature = "browser")]
        #[test]
        fn test_cdp_config_from_flags() {
            let config = run_args(&["--headed", "--no-sandbox", "--chromium-path", "/opt/chrome"])
                .cdp_config();
            assert!(!config.headless);
            assert!(!config.sandbox);
            assert_eq!(config.chromium_path, Some(PathBuf::from("/opt/chrome")));
        }
    }
}
