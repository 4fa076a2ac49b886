//! chatverify CLI: run chat UI verification scenarios
//!
//! ## Usage
//!
//! ```bash
//! chatverify list                             # Built-in scenarios
//! chatverify run                              # Run the whole catalog
//! chatverify run chat-new-modal my.yaml       # Run selected scenarios
//! chatverify validate scenarios/*.yaml        # Check files, no browser
//! ```

use chatverify_cli::{handlers, logging, Cli, CliConfig, CliResult, Commands, Verbosity};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init_logging(config.verbosity, config.color.should_color());

    match cli.command {
        Commands::Run(args) => handlers::execute_run(&config, &args),
        Commands::List(args) => handlers::execute_list(&args),
        Commands::Validate(args) => handlers::execute_validate(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
}
