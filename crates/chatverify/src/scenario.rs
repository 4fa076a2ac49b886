//! Scenarios and the YAML scenario-file format.
//!
//! A [`Scenario`] is an id, an ordered list of [`Step`]s and the route
//! mocks that stay active for the whole run. It is built up front (through
//! [`ScenarioBuilder`] or [`Scenario::from_yaml`]) and never changes while
//! it runs.
//!
//! # File format
//!
//! ```yaml
//! version: "1.0"
//! id: chat-new-modal
//! description: New conversation modal opens from the sidebar
//! routes:
//!   - pattern: "**/api/chat/conversations*"
//!     method: GET
//!     body: []
//!   - pattern: "**/api/chat/unread-count"
//!     body: { count: 0 }
//! steps:
//!   - type: navigate
//!     url: /
//!   - type: click
//!     selector: text=Nova Conversa
//! ```

use crate::fixtures::AuthToken;
use crate::network::{FixtureProducer, HttpMethod, MockResponse, RouteMock, RouteTable, Sequence};
use crate::result::{VerifyError, VerifyResult};
use crate::selector::Selector;
use crate::step::Step;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Only supported scenario-file version
pub const SCENARIO_FILE_VERSION: &str = "1.0";

/// An immutable verification scenario
#[derive(Debug, Clone)]
pub struct Scenario {
    id: String,
    description: String,
    steps: Vec<Step>,
    routes: Vec<RouteMock>,
}

impl Scenario {
    /// Start building a scenario
    #[must_use]
    pub fn builder(id: impl Into<String>) -> ScenarioBuilder {
        ScenarioBuilder::new(id)
    }

    /// Parse and validate a scenario file
    pub fn from_yaml(yaml: &str) -> VerifyResult<Self> {
        ScenarioFile::from_yaml(yaml)?.into_scenario()
    }

    /// Load a scenario file from disk
    pub fn load(path: impl AsRef<Path>) -> VerifyResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml).map_err(|e| match e {
            VerifyError::Parse(message) => {
                VerifyError::Parse(format!("{}: {message}", path.display()))
            }
            VerifyError::InvalidScenario { message } => {
                VerifyError::invalid_scenario(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Scenario identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Route mocks active during the run
    #[must_use]
    pub fn routes(&self) -> &[RouteMock] {
        &self.routes
    }

    /// Fresh route table holding this scenario's mocks.
    ///
    /// Hit counters, request log and faults start empty on every call, so
    /// two runs never observe each other's traffic.
    #[must_use]
    pub fn route_table(&self) -> RouteTable {
        let mut table = RouteTable::new();
        for route in &self.routes {
            table.register_route(route.clone());
        }
        table
    }

    /// Check id and steps
    pub fn validate(&self) -> VerifyResult<()> {
        if self.id.trim().is_empty() {
            return Err(VerifyError::invalid_scenario("scenario id is empty"));
        }
        if self.id.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\') {
            return Err(VerifyError::invalid_scenario(format!(
                "scenario id `{}` must not contain whitespace or path separators",
                self.id
            )));
        }
        if self.steps.is_empty() {
            return Err(VerifyError::invalid_scenario(format!(
                "scenario `{}` has no steps",
                self.id
            )));
        }
        for (i, step) in self.steps.iter().enumerate() {
            step.validate().map_err(|e| match e {
                VerifyError::InvalidScenario { message } => {
                    VerifyError::invalid_scenario(format!("step {}: {message}", i + 1))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

/// Fluent scenario construction.
///
/// Selector strings are parsed as they are added; the first parse error is
/// kept and returned from [`ScenarioBuilder::build`].
#[derive(Debug)]
pub struct ScenarioBuilder {
    id: String,
    description: String,
    steps: Vec<Step>,
    routes: Vec<RouteMock>,
    error: Option<VerifyError>,
}

impl ScenarioBuilder {
    /// Create a builder
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            steps: Vec::new(),
            routes: Vec::new(),
            error: None,
        }
    }

    /// Set the description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mock a URL pattern for the whole run
    #[must_use]
    pub fn route(mut self, pattern: &str, producer: impl FixtureProducer + 'static) -> Self {
        match RouteMock::new(pattern, producer) {
            Ok(route) => self.routes.push(route),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Add prepared route mocks
    #[must_use]
    pub fn routes(mut self, routes: impl IntoIterator<Item = RouteMock>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Navigate to a URL
    #[must_use]
    pub fn navigate(self, url: impl Into<String>) -> Self {
        self.step(Step::navigate(url))
    }

    /// Write a `localStorage` entry
    #[must_use]
    pub fn set_storage(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.step(Step::set_storage(key, value))
    }

    /// Store an auth token for the client
    #[must_use]
    pub fn auth(mut self, token: &AuthToken) -> Self {
        match token.storage_step() {
            Ok(step) => self.steps.push(step),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Click an element
    #[must_use]
    pub fn click(self, selector: &str) -> Self {
        self.with_selector(selector, |selector| Step::Click { selector })
    }

    /// Wait for an element
    #[must_use]
    pub fn wait_for(self, selector: &str, timeout_ms: u64) -> Self {
        self.with_selector(selector, |selector| Step::WaitFor {
            selector,
            timeout_ms,
        })
    }

    /// Assert an element is visible
    #[must_use]
    pub fn assert_visible(self, selector: &str) -> Self {
        self.with_selector(selector, |selector| Step::AssertVisible { selector })
    }

    /// Capture a screenshot
    #[must_use]
    pub fn screenshot(self, path: impl Into<PathBuf>) -> Self {
        self.step(Step::screenshot(path))
    }

    /// Finish and validate
    pub fn build(self) -> VerifyResult<Scenario> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let scenario = Scenario {
            id: self.id,
            description: self.description,
            steps: self.steps,
            routes: self.routes,
        };
        scenario.validate()?;
        Ok(scenario)
    }

    fn with_selector(mut self, selector: &str, make: impl FnOnce(Selector) -> Step) -> Self {
        match Selector::parse(selector) {
            Ok(selector) => self.steps.push(make(selector)),
            Err(e) => self.fail(e),
        }
        self
    }

    fn fail(&mut self, error: VerifyError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// Root of a scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFile {
    /// Schema version (must be "1.0")
    pub version: String,
    /// Scenario identifier
    pub id: String,
    /// Scenario description
    #[serde(default)]
    pub description: String,
    /// Route mocks
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    /// Steps in order
    pub steps: Vec<Step>,
}

/// A route mock as written in a scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    /// URL glob
    pub pattern: String,
    /// Method filter
    #[serde(default)]
    pub method: HttpMethod,
    /// Response served on every call (ignored when `sequence` is set)
    #[serde(flatten)]
    pub response: ResponseSpec,
    /// Responses served in call order; the last one repeats
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sequence: Vec<ResponseSpec>,
}

const fn default_status() -> u16 {
    200
}

/// A canned response as written in a scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSpec {
    /// HTTP status
    #[serde(default = "default_status")]
    pub status: u16,
    /// Content type override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// JSON body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Plain-text body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Extra headers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl ResponseSpec {
    fn validate(&self, pattern: &str) -> VerifyResult<()> {
        if !(100..=599).contains(&self.status) {
            return Err(VerifyError::invalid_scenario(format!(
                "route `{pattern}` has invalid status {}",
                self.status
            )));
        }
        if self.body.is_some() && self.text.is_some() {
            return Err(VerifyError::invalid_scenario(format!(
                "route `{pattern}` sets both `body` and `text`"
            )));
        }
        Ok(())
    }

    fn to_response(&self) -> VerifyResult<MockResponse> {
        let mut response = match (&self.body, &self.text) {
            (Some(body), _) => MockResponse::json(body)?,
            (None, Some(text)) => MockResponse::text(text),
            (None, None) => MockResponse::new(),
        }
        .with_status(self.status);
        if let Some(content_type) = &self.content_type {
            response = response.with_content_type(content_type);
        }
        for (key, value) in &self.headers {
            response = response.with_header(key, value);
        }
        Ok(response)
    }
}

impl RouteSpec {
    fn to_route(&self) -> VerifyResult<RouteMock> {
        self.response.validate(&self.pattern)?;
        let route = if self.sequence.is_empty() {
            RouteMock::new(&self.pattern, self.response.to_response()?)?
        } else {
            let responses = self
                .sequence
                .iter()
                .map(|spec| {
                    spec.validate(&self.pattern)?;
                    spec.to_response()
                })
                .collect::<VerifyResult<Vec<_>>>()?;
            RouteMock::new(&self.pattern, Sequence::new(responses))?
        };
        Ok(route.with_method(self.method))
    }
}

impl ScenarioFile {
    /// Parse a scenario file from YAML.
    ///
    /// # Errors
    /// Returns error if YAML is invalid or the version is unsupported.
    pub fn from_yaml(yaml: &str) -> VerifyResult<Self> {
        let file: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| VerifyError::Parse(e.to_string()))?;
        if file.version != SCENARIO_FILE_VERSION {
            return Err(VerifyError::invalid_scenario(format!(
                "invalid version '{}', expected '{SCENARIO_FILE_VERSION}'",
                file.version
            )));
        }
        Ok(file)
    }

    /// Compile routes and validate into a [`Scenario`]
    pub fn into_scenario(self) -> VerifyResult<Scenario> {
        let routes = self
            .routes
            .iter()
            .map(RouteSpec::to_route)
            .collect::<VerifyResult<Vec<_>>>()
            .map_err(|e| match e {
                VerifyError::InvalidPattern { pattern, message } => {
                    VerifyError::invalid_scenario(format!("route `{pattern}`: {message}"))
                }
                other => other,
            })?;

        let scenario = Scenario {
            id: self.id,
            description: self.description,
            steps: self.steps,
            routes,
        };
        scenario.validate()?;
        Ok(scenario)
    }
}
