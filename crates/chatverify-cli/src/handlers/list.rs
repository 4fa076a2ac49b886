//! List command handler

use crate::commands::{ListArgs, ListFormat};
use crate::error::CliResult;
use chatverify::{catalog, Scenario};
use serde::Serialize;

/// Catalog entry as printed by `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioEntry {
    /// Scenario id
    pub id: String,
    /// Scenario description
    pub description: String,
    /// Number of steps
    pub steps: usize,
    /// Number of route mocks
    pub routes: usize,
}

impl From<&Scenario> for ScenarioEntry {
    fn from(scenario: &Scenario) -> Self {
        Self {
            id: scenario.id().to_string(),
            description: scenario.description().to_string(),
            steps: scenario.steps().len(),
            routes: scenario.routes().len(),
        }
    }
}

/// Entries for every built-in scenario
pub fn catalog_entries() -> CliResult<Vec<ScenarioEntry>> {
    Ok(catalog::all()?.iter().map(ScenarioEntry::from).collect())
}

/// Render entries in the requested format
pub fn render_list(entries: &[ScenarioEntry], format: ListFormat) -> CliResult<String> {
    match format {
        ListFormat::Json => Ok(serde_json::to_string_pretty(entries)? + "\n"),
        ListFormat::Text => {
            let width = entries.iter().map(|e| e.id.len()).max().unwrap_or(0);
            let mut out = String::new();
            for entry in entries {
                out.push_str(&format!(
                    "{:<width$}  {} ({} steps, {} routes)\n",
                    entry.id, entry.description, entry.steps, entry.routes
                ));
            }
            Ok(out)
        }
    }
}

/// Execute the list command
pub fn execute_list(args: &ListArgs) -> CliResult<()> {
    print!("{}", render_list(&catalog_entries()?, args.format)?);
    Ok(())
}
