//! Validate command handler

use crate::commands::ValidateArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use chatverify::Scenario;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Load every file, returning the id or the error message per file.
///
/// A file whose id was already used by an earlier file is reported as
/// invalid, since artifacts are named after the id.
pub fn validate_files(files: &[PathBuf]) -> Vec<(PathBuf, Result<String, String>)> {
    let mut seen: HashMap<String, &Path> = HashMap::new();
    files
        .iter()
        .map(|file| {
            let outcome = match Scenario::load(file) {
                Ok(scenario) => match seen.get(scenario.id()) {
                    Some(first) => Err(format!(
                        "duplicate scenario id '{}' (first defined in {})",
                        scenario.id(),
                        first.display()
                    )),
                    None => {
                        seen.insert(scenario.id().to_string(), file);
                        Ok(scenario.id().to_string())
                    }
                },
                Err(e) => Err(e.to_string()),
            };
            (file.clone(), outcome)
        })
        .collect()
}

/// Execute the validate command
pub fn execute_validate(config: &CliConfig, args: &ValidateArgs) -> CliResult<()> {
    let progress = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    let results = validate_files(&args.files);
    let mut invalid = 0;
    for (path, outcome) in &results {
        if outcome.is_err() {
            invalid += 1;
        }
        progress.validation_result(path, outcome.as_deref().map_err(Clone::clone));
    }
    if invalid > 0 {
        return Err(CliError::InvalidScenarios {
            invalid,
            total: results.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;

    const MINIMAL: &str = r#"
version: "1.0"
id: minimal
steps:
  - type: navigate
    url: /chat
"#;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "ok.yaml", MINIMAL);
        let results = validate_files(&[file]);
        assert_eq!(results[0].1, Ok("minimal".to_string()));
    }

    #[test]
    fn test_invalid_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(
            dir.path(),
            "bad.yaml",
            "version: \"2.0\"\nid: x\nsteps: []\n",
        );
        let missing = dir.path().join("missing.yaml");
        let results = validate_files(&[bad, missing]);
        assert!(results[0].1.as_ref().unwrap_err().contains("version"));
        assert!(results[1].1.is_err());
    }

    #[test]
    fn test_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.yaml", MINIMAL);
        let b = write(dir.path(), "b.yaml", MINIMAL);
        let results = validate_files(&[a, b]);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.as_ref().unwrap_err().contains("duplicate scenario id"));
    }

    #[test]
    fn test_execute_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "good.yaml", MINIMAL);
        let bad = write(dir.path(), "bad.yaml", "not: [valid");
        let config = CliConfig::new().with_color(crate::config::ColorChoice::Never);
        let err = execute_validate(
            &config,
            &ValidateArgs {
                files: vec![good, bad],
            },
        )
        .unwrap_err();
        assert!(matches!(err, CliError::InvalidScenarios { invalid: 1, total: 2 }));
    }
}
