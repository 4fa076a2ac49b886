//! Element selectors.
//!
//! Scenarios address elements with the selector syntax the chat app's
//! verification flows were written in:
//!
//! | Syntax                       | Meaning                                              |
//! |------------------------------|------------------------------------------------------|
//! | `text=Nova Conversa`         | innermost element whose text contains the string     |
//! | `text="Nova Conversa"`       | innermost element whose text equals the string       |
//! | `h2:has-text('Conversas')`   | CSS match whose text contains the string             |
//! | `role=tab[name="Todas"]`     | element with that ARIA role and accessible name      |
//! | anything else                | plain CSS, including `:has(...)`                     |
//!
//! Each selector compiles to a JavaScript expression that is evaluated in
//! the page, so a backend only needs `evaluate` to support all of them.

use crate::result::{VerifyError, VerifyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parsed selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Selector {
    /// CSS selector (e.g., "button:has(svg.lucide-more-vertical)")
    Css(String),
    /// Text content selector
    Text {
        /// Text to look for
        text: String,
        /// Whole-text match instead of substring
        exact: bool,
    },
    /// CSS selector filtered by contained text
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// ARIA role with accessible name
    Role {
        /// Role, e.g. `tab`
        role: String,
        /// Accessible name filter
        name: Option<String>,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a substring text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: false,
        }
    }

    /// Create a role selector
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    /// Parse selector syntax
    pub fn parse(input: &str) -> VerifyResult<Self> {
        let input = input.trim();
        let invalid = |message: &str| VerifyError::InvalidPattern {
            pattern: input.to_string(),
            message: message.to_string(),
        };

        if input.is_empty() {
            return Err(invalid("selector is empty"));
        }

        if let Some(rest) = input.strip_prefix("text=") {
            return match unquote(rest) {
                Some(text) => Ok(Self::Text {
                    text: text.to_string(),
                    exact: true,
                }),
                None if rest.is_empty() => Err(invalid("text= needs a value")),
                None => Ok(Self::text(rest)),
            };
        }

        if let Some(rest) = input.strip_prefix("role=") {
            let (role, name) = match rest.split_once('[') {
                None => (rest, None),
                Some((role, attrs)) => {
                    let attrs = attrs
                        .strip_suffix(']')
                        .ok_or_else(|| invalid("unterminated role attribute"))?;
                    let value = attrs
                        .strip_prefix("name=")
                        .ok_or_else(|| invalid("only the `name` role attribute is supported"))?;
                    let name = unquote(value).unwrap_or(value);
                    (role, Some(name.to_string()))
                }
            };
            if role.is_empty() {
                return Err(invalid("role= needs a role"));
            }
            return Ok(Self::Role {
                role: role.to_string(),
                name,
            });
        }

        if let Some(at) = input.find(":has-text(") {
            let inner = input[at + ":has-text(".len()..]
                .strip_suffix(')')
                .ok_or_else(|| invalid(":has-text(...) must end the selector"))?;
            let text = unquote(inner).ok_or_else(|| invalid(":has-text needs a quoted string"))?;
            let css = &input[..at];
            return Ok(Self::CssWithText {
                css: if css.is_empty() { "*" } else { css }.to_string(),
                text: text.to_string(),
            });
        }

        Ok(Self::Css(input.to_string()))
    }

    /// JavaScript expression evaluating to the first matching element or `null`
    #[must_use]
    pub fn to_query(&self) -> String {
        match self {
            Self::Css(css) => format!("document.querySelector({})", js_string(css)),
            Self::Text { text, exact } => {
                let matcher = text_matcher(text, *exact);
                format!(
                    "(() => {{ const m = {matcher}; \
                     return Array.from(document.querySelectorAll('body, body *')) \
                     .filter(m).find(el => !Array.from(el.children).some(m)) || null; }})()"
                )
            }
            Self::CssWithText { css, text } => {
                let matcher = text_matcher(text, false);
                format!(
                    "Array.from(document.querySelectorAll({})).find({matcher}) || null",
                    js_string(css)
                )
            }
            Self::Role { role, name } => {
                let name_filter = name.as_ref().map_or_else(
                    || "() => true".to_string(),
                    |n| {
                        format!(
                            "el => ((el.getAttribute('aria-label') || el.textContent || '') \
                             .replace(/\\s+/g, ' ').trim().toLowerCase()) \
                             .includes({})",
                            js_string(&n.to_lowercase())
                        )
                    },
                );
                format!(
                    "Array.from(document.querySelectorAll({})).find({name_filter}) || null",
                    js_string(&format!("[role=\"{role}\"]"))
                )
            }
        }
    }

    /// JavaScript expression evaluating to `"missing"`, `"hidden"` or `"visible"`
    #[must_use]
    pub fn to_state_check(&self) -> String {
        format!(
            "(() => {{ const el = {}; if (!el) return 'missing'; \
             const style = window.getComputedStyle(el); \
             const shown = style.visibility !== 'hidden' && style.display !== 'none' \
             && el.getClientRects().length > 0; \
             return shown ? 'visible' : 'hidden'; }})()",
            self.to_query()
        )
    }

    /// JavaScript expression that clicks the element, returning whether it was found
    #[must_use]
    pub fn to_click_script(&self) -> String {
        format!(
            "(() => {{ const el = {}; if (!el) return false; \
             el.scrollIntoView({{ block: 'center' }}); el.click(); return true; }})()",
            self.to_query()
        )
    }
}

impl FromStr for Selector {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Selector {
    type Error = VerifyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => f.write_str(css),
            Self::Text { text, exact: true } => write!(f, "text=\"{text}\""),
            Self::Text { text, exact: false } => write!(f, "text={text}"),
            Self::CssWithText { css, text } => write!(f, "{css}:has-text(\"{text}\")"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role}[name=\"{name}\"]"),
        }
    }
}

fn unquote(s: &str) -> Option<&str> {
    ['"', '\'']
        .iter()
        .find_map(|q| s.strip_prefix(*q).and_then(|r| r.strip_suffix(*q)))
}

/// Quote a string as a JavaScript literal
pub(crate) fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn text_matcher(text: &str, exact: bool) -> String {
    let normalized = "(el.innerText || el.textContent || '').replace(/\\s+/g, ' ').trim()";
    if exact {
        format!("el => {normalized} === {}", js_string(text))
    } else {
        format!(
            "el => {normalized}.toLowerCase().includes({})",
            js_string(&text.to_lowercase())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_plain_css() {
            let sel = Selector::parse("button:has(svg.lucide-more-vertical)").unwrap();
            assert_eq!(sel, Selector::css("button:has(svg.lucide-more-vertical)"));
        }

        #[test]
        fn test_text_substring() {
            let sel = Selector::parse("text=Nova Conversa").unwrap();
            assert_eq!(sel, Selector::text("Nova Conversa"));
        }

        #[test]
        fn test_text_quoted_is_exact() {
            let sel = Selector::parse("text='Conversa 1'").unwrap();
            assert_eq!(
                sel,
                Selector::Text {
                    text: "Conversa 1".to_string(),
                    exact: true
                }
            );
        }

        #[test]
        fn test_has_text() {
            let sel = Selector::parse("h3:has-text('user@example.com')").unwrap();
            assert_eq!(
                sel,
                Selector::CssWithText {
                    css: "h3".to_string(),
                    text: "user@example.com".to_string()
                }
            );
        }

        #[test]
        fn test_has_text_without_css_defaults_to_any() {
            let sel = Selector::parse(":has-text(\"x\")").unwrap();
            assert!(matches!(sel, Selector::CssWithText { ref css, .. } if css == "*"));
        }

        #[test]
        fn test_role_with_name() {
            let sel = Selector::parse("role=tab[name=\"Não lidas\"]").unwrap();
            assert_eq!(sel, Selector::role("tab", "Não lidas"));
        }

        #[test]
        fn test_role_without_name() {
            let sel = Selector::parse("role=dialog").unwrap();
            assert_eq!(
                sel,
                Selector::Role {
                    role: "dialog".to_string(),
                    name: None
                }
            );
        }

        #[test]
        fn test_rejects_malformed() {
            assert!(Selector::parse("").is_err());
            assert!(Selector::parse("text=").is_err());
            assert!(Selector::parse("role=tab[label=x]").is_err());
            assert!(Selector::parse("h2:has-text('a') span").is_err());
            assert!(Selector::parse("h2:has-text(a)").is_err());
        }

        #[test]
        fn test_display_reparses_to_same_selector() {
            for input in [
                "text=Nova Conversa",
                "text=\"Conversa 1\"",
                "h2:has-text(\"Conversas\")",
                "role=tab[name=\"Todas\"]",
                "div.modal",
            ] {
                let sel = Selector::parse(input).unwrap();
                assert_eq!(Selector::parse(&sel.to_string()).unwrap(), sel);
            }
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_css_query_escapes_quotes() {
            let query = Selector::css("a[title=\"x\"]").to_query();
            assert_eq!(query, r#"document.querySelector("a[title=\"x\"]")"#);
        }

        #[test]
        fn test_text_query_lowercases_needle() {
            let query = Selector::text("Nova Conversa").to_query();
            assert!(query.contains("\"nova conversa\""));
            assert!(query.contains("el.children"));
        }

        #[test]
        fn test_role_query_targets_role_attribute() {
            let query = Selector::role("tab", "Todas").to_query();
            assert!(query.contains(r#"[role=\"tab\"]"#));
            assert!(query.contains("\"todas\""));
        }

        #[test]
        fn test_visible_and_click_wrap_query() {
            let sel = Selector::css("#x");
            assert!(sel.to_state_check().contains("getClientRects"));
            assert!(sel.to_click_script().contains("el.click()"));
        }
    }

    #[test]
    fn test_serde_as_string() {
        let sel: Selector = serde_json::from_str("\"text=Conversa 1\"").unwrap();
        assert_eq!(sel, Selector::text("Conversa 1"));
        assert_eq!(
            serde_json::to_string(&sel).unwrap(),
            "\"text=Conversa 1\""
        );
        assert!(serde_json::from_str::<Selector>("\"\"").is_err());
    }
}
