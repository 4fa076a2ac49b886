//! Command handlers - kept out of main.rs for testability

pub mod list;
pub mod run;
pub mod validate;

pub use list::{catalog_entries, execute_list, render_list, ScenarioEntry};
pub use run::{execute_run, finish_run, resolve_targets, run_scenarios};
pub use validate::{execute_validate, validate_files};
