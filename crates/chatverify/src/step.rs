//! Scenario steps.
//!
//! A step is atomic: it either completes or fails, and a failed step leaves
//! nothing for the runner to undo. The serialized form is the one used in
//! scenario files:
//!
//! ```yaml
//! - type: navigate
//!   url: /chat
//! - type: wait_for
//!   selector: "h2:has-text('Conversas')"
//!   timeout_ms: 5000
//! ```

use crate::result::{VerifyError, VerifyResult};
use crate::selector::Selector;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default `wait_for` timeout in milliseconds
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

const fn default_wait_timeout() -> u64 {
    DEFAULT_WAIT_TIMEOUT_MS
}

/// One browser action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Load a URL; relative URLs resolve against the base URL
    Navigate {
        /// Target URL
        url: String,
    },
    /// Write a key into the page's `localStorage`
    SetStorage {
        /// Storage key
        key: String,
        /// Storage value
        value: String,
    },
    /// Click an element
    Click {
        /// Element to click
        selector: Selector,
    },
    /// Wait until an element is rendered and visible
    WaitFor {
        /// Element to wait for
        selector: Selector,
        /// Timeout in milliseconds
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },
    /// Capture the viewport to a PNG file
    Screenshot {
        /// Output path; relative paths land in the artifact directory
        path: PathBuf,
    },
    /// Assert that an element is rendered and visible
    AssertVisible {
        /// Element expected to be visible
        selector: Selector,
    },
}

impl Step {
    /// Navigate step
    #[must_use]
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::Navigate { url: url.into() }
    }

    /// Storage step
    #[must_use]
    pub fn set_storage(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::SetStorage {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Screenshot step
    #[must_use]
    pub fn screenshot(path: impl Into<PathBuf>) -> Self {
        Self::Screenshot { path: path.into() }
    }

    /// Serialized tag of this step
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::SetStorage { .. } => "set_storage",
            Self::Click { .. } => "click",
            Self::WaitFor { .. } => "wait_for",
            Self::Screenshot { .. } => "screenshot",
            Self::AssertVisible { .. } => "assert_visible",
        }
    }

    /// One-line description for logs and progress output
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Navigate { url } => format!("navigate to {url}"),
            Self::SetStorage { key, .. } => format!("set localStorage[{key}]"),
            Self::Click { selector } => format!("click {selector}"),
            Self::WaitFor {
                selector,
                timeout_ms,
            } => format!("wait for {selector} ({timeout_ms}ms)"),
            Self::Screenshot { path } => format!("screenshot {}", path.display()),
            Self::AssertVisible { selector } => format!("assert {selector} is visible"),
        }
    }

    /// Check the step's own fields
    pub fn validate(&self) -> VerifyResult<()> {
        let fail = |message: String| Err(VerifyError::invalid_scenario(message));
        match self {
            Self::Navigate { url } if url.trim().is_empty() => {
                fail("navigate step has an empty url".to_string())
            }
            Self::SetStorage { key, .. } if key.is_empty() => {
                fail("set_storage step has an empty key".to_string())
            }
            Self::WaitFor {
                selector,
                timeout_ms: 0,
            } => fail(format!("wait_for `{selector}` has a zero timeout")),
            Self::Screenshot { path } if path.as_os_str().is_empty() => {
                fail("screenshot step has an empty path".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_tagged_form() {
        let yaml = r#"
- type: navigate
  url: /chat
- type: set_storage
  key: token
  value: abc
- type: click
  selector: "text=Conversa 1"
- type: wait_for
  selector: "h3:has-text('user@example.com')"
- type: screenshot
  path: out.png
- type: assert_visible
  selector: role=tab[name="Todas"]
"#;
        let steps: Vec<Step> = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(steps.len(), 6);
        assert_eq!(steps[0], Step::navigate("/chat"));
        assert_eq!(
            steps[3],
            Step::WaitFor {
                selector: Selector::CssWithText {
                    css: "h3".to_string(),
                    text: "user@example.com".to_string()
                },
                timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            }
        );
        assert_eq!(
            steps[5],
            Step::AssertVisible {
                selector: Selector::role("tab", "Todas")
            }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        let yaml = "- type: hover\n  selector: x\n";
        assert!(serde_yaml_ng::from_str::<Vec<Step>>(yaml).is_err());
    }

    #[test]
    fn test_describe_and_kind() {
        let step = Step::WaitFor {
            selector: Selector::text("Nova Conversa"),
            timeout_ms: 200,
        };
        assert_eq!(step.kind_name(), "wait_for");
        assert_eq!(step.describe(), "wait for text=Nova Conversa (200ms)");
        assert_eq!(
            Step::set_storage("token", "secret").describe(),
            "set localStorage[token]"
        );
    }

    #[test]
    fn test_validate() {
        assert!(Step::navigate("/").validate().is_ok());
        assert!(Step::navigate("  ").validate().is_err());
        assert!(Step::set_storage("", "v").validate().is_err());
        assert!(Step::screenshot("").validate().is_err());
        assert!(Step::WaitFor {
            selector: Selector::css("#x"),
            timeout_ms: 0
        }
        .validate()
        .is_err());
    }
}
