//! Browser session seam.
//!
//! The runner only talks to a [`BrowserSession`], obtained from a
//! [`SessionLauncher`]. Each launch is a fresh, isolated browser context
//! with one page, so storage and cookies never leak between scenarios.
//!
//! - `CdpLauncher` (feature `browser`) drives Chromium over CDP
//! - [`ScriptedLauncher`] is an in-memory page for tests

use crate::network::{HttpMethod, InterceptedRequest, Resolution, RouteTable};
use crate::result::{VerifyError, VerifyResult};
use crate::selector::Selector;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// What a selector currently resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    /// No element matches
    Missing,
    /// Attached but not rendered
    Hidden,
    /// Attached and rendered
    Visible,
}

impl ElementState {
    /// Parse the string produced by [`Selector::to_state_check`]
    #[must_use]
    pub fn from_js(value: &serde_json::Value) -> Self {
        match value.as_str() {
            Some("visible") => Self::Visible,
            Some("hidden") => Self::Hidden,
            _ => Self::Missing,
        }
    }

    /// Whether an element is attached
    #[must_use]
    pub const fn is_attached(self) -> bool {
        !matches!(self, Self::Missing)
    }
}

/// One page in an isolated browser context
#[async_trait]
pub trait BrowserSession: Send {
    /// Route every request the page makes through `table`.
    ///
    /// Called once, before the first navigation.
    async fn install_routes(&mut self, table: Arc<RouteTable>) -> VerifyResult<()>;

    /// Load a URL and wait for the load event
    async fn navigate(&mut self, url: &str) -> VerifyResult<()>;

    /// Write a `localStorage` entry for the current origin
    async fn set_storage(&mut self, key: &str, value: &str) -> VerifyResult<()>;

    /// Click the element; `false` when nothing matched
    async fn click(&mut self, selector: &Selector) -> VerifyResult<bool>;

    /// Current state of the element
    async fn query(&mut self, selector: &Selector) -> VerifyResult<ElementState>;

    /// Evaluate a JavaScript expression
    async fn evaluate(&mut self, script: &str) -> VerifyResult<serde_json::Value>;

    /// Capture the viewport as PNG
    async fn screenshot(&mut self) -> VerifyResult<Vec<u8>>;

    /// Close the page and its context
    async fn close(&mut self) -> VerifyResult<()>;
}

/// Opens fresh sessions
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Launch (or reuse) a browser and open a page in a new isolated context
    async fn launch(&self) -> VerifyResult<Box<dyn BrowserSession>>;
}

/// Smallest valid PNG, returned by scripted screenshots
pub const BLANK_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

fn selector_key(selector: &str) -> String {
    Selector::parse(selector).map_or_else(|_| selector.to_string(), |s| s.to_string())
}

fn url_path(url: &str) -> String {
    InterceptedRequest::new(url, HttpMethod::Get).path().to_string()
}

/// Scripted page behaviour.
///
/// Pages are keyed by URL path. Elements are keyed by selector text and
/// appear when their trigger fires: a page load, a click, or a mocked
/// response to a request the page makes on load.
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    on_load: HashMap<String, Vec<(String, Duration)>>,
    on_click: HashMap<String, Vec<String>>,
    requests: HashMap<String, Vec<String>>,
    on_fulfilled: HashMap<String, Vec<String>>,
    hidden: HashSet<String>,
    navigation_errors: HashMap<String, String>,
    navigation_delay: Duration,
    close_delay: Duration,
    screenshot_error: Option<String>,
}

impl PageScript {
    /// Empty script: every page is blank
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Element present as soon as `page` loads
    #[must_use]
    pub fn element(self, page: &str, selector: &str) -> Self {
        self.element_after(page, selector, Duration::ZERO)
    }

    /// Element that appears `delay` after `page` loads
    #[must_use]
    pub fn element_after(mut self, page: &str, selector: &str, delay: Duration) -> Self {
        self.on_load
            .entry(url_path(page))
            .or_default()
            .push((selector_key(selector), delay));
        self
    }

    /// Clicking `selector` attaches `reveals`
    #[must_use]
    pub fn on_click(mut self, selector: &str, reveals: &str) -> Self {
        self.on_click
            .entry(selector_key(selector))
            .or_default()
            .push(selector_key(reveals));
        self
    }

    /// `page` issues `GET request_url` while loading
    #[must_use]
    pub fn request(mut self, page: &str, request_url: &str) -> Self {
        self.requests
            .entry(url_path(page))
            .or_default()
            .push(request_url.to_string());
        self
    }

    /// `selector` is attached once `request_url` is answered by a mock
    #[must_use]
    pub fn on_fulfilled(mut self, request_url: &str, selector: &str) -> Self {
        self.on_fulfilled
            .entry(request_url.to_string())
            .or_default()
            .push(selector_key(selector));
        self
    }

    /// Element is attached but never visible
    #[must_use]
    pub fn hidden(mut self, selector: &str) -> Self {
        self.hidden.insert(selector_key(selector));
        self
    }

    /// Navigation to `page` fails
    #[must_use]
    pub fn navigation_error(mut self, page: &str, message: &str) -> Self {
        self.navigation_errors
            .insert(url_path(page), message.to_string());
        self
    }

    /// Every navigation takes this long
    #[must_use]
    pub const fn navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = delay;
        self
    }

    /// Closing the session hangs this long
    #[must_use]
    pub const fn close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    /// Screenshots fail
    #[must_use]
    pub fn screenshot_error(mut self, message: &str) -> Self {
        self.screenshot_error = Some(message.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct LogState {
    launches: usize,
    closes: usize,
    calls: Vec<String>,
    storage: HashMap<String, String>,
}

/// Calls observed across every session of one launcher
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    inner: Arc<Mutex<LogState>>,
}

impl SessionLog {
    fn with<T>(&self, f: impl FnOnce(&mut LogState) -> T) -> T {
        let mut state = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state)
    }

    fn push(&self, call: String) {
        self.with(|s| s.calls.push(call));
    }

    /// Sessions opened
    #[must_use]
    pub fn launches(&self) -> usize {
        self.with(|s| s.launches)
    }

    /// Sessions closed
    #[must_use]
    pub fn closes(&self) -> usize {
        self.with(|s| s.closes)
    }

    /// Calls in order, e.g. `navigate:http://localhost:3000/chat`
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    /// Whether a call with this prefix happened
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.with(|s| s.calls.iter().any(|c| c.starts_with(prefix)))
    }

    /// Storage of the most recently launched session
    #[must_use]
    pub fn storage(&self) -> HashMap<String, String> {
        self.with(|s| s.storage.clone())
    }
}

/// Launcher for in-memory scripted sessions
#[derive(Debug, Clone, Default)]
pub struct ScriptedLauncher {
    script: Arc<PageScript>,
    log: SessionLog,
    launch_error: Option<String>,
}

impl ScriptedLauncher {
    /// Create a launcher for `script`
    #[must_use]
    pub fn new(script: PageScript) -> Self {
        Self {
            script: Arc::new(script),
            log: SessionLog::default(),
            launch_error: None,
        }
    }

    /// Launcher whose every launch fails
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            launch_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Shared call log
    #[must_use]
    pub fn log(&self) -> SessionLog {
        self.log.clone()
    }
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn launch(&self) -> VerifyResult<Box<dyn BrowserSession>> {
        if let Some(message) = &self.launch_error {
            return Err(VerifyError::session(message.clone()));
        }
        self.log.with(|s| {
            s.launches += 1;
            s.storage.clear();
        });
        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
            log: self.log.clone(),
            routes: None,
            attached: HashMap::new(),
            closed: false,
        }))
    }
}

/// In-memory page driven by a [`PageScript`]
#[derive(Debug)]
pub struct ScriptedSession {
    script: Arc<PageScript>,
    log: SessionLog,
    routes: Option<Arc<RouteTable>>,
    attached: HashMap<String, Instant>,
    closed: bool,
}

impl ScriptedSession {
    fn ensure_open(&self) -> VerifyResult<()> {
        if self.closed {
            return Err(VerifyError::session("session is closed"));
        }
        Ok(())
    }

    fn attach(&mut self, selectors: &[String], at: Instant) {
        for selector in selectors {
            self.attached.entry(selector.clone()).or_insert(at);
        }
    }

    fn state(&self, key: &str) -> ElementState {
        match self.attached.get(key) {
            Some(at) if *at <= Instant::now() => {
                if self.script.hidden.contains(key) {
                    ElementState::Hidden
                } else {
                    ElementState::Visible
                }
            }
            _ => ElementState::Missing,
        }
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn install_routes(&mut self, table: Arc<RouteTable>) -> VerifyResult<()> {
        self.ensure_open()?;
        self.log.push("install_routes".to_string());
        self.routes = Some(table);
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> VerifyResult<()> {
        self.ensure_open()?;
        self.log.push(format!("navigate:{url}"));
        if !self.script.navigation_delay.is_zero() {
            tokio::time::sleep(self.script.navigation_delay).await;
        }
        let path = url_path(url);
        if let Some(message) = self.script.navigation_errors.get(&path) {
            return Err(VerifyError::Navigation {
                url: url.to_string(),
                message: message.clone(),
            });
        }

        self.attached.clear();
        let now = Instant::now();
        let script = Arc::clone(&self.script);
        if let Some(elements) = script.on_load.get(&path) {
            for (selector, delay) in elements {
                self.attached.entry(selector.clone()).or_insert(now + *delay);
            }
        }

        for request_url in script.requests.get(&path).into_iter().flatten() {
            let Some(table) = self.routes.clone() else {
                continue;
            };
            let request = InterceptedRequest::new(request_url.clone(), HttpMethod::Get)
                .with_resource_type("Fetch");
            // Producer failures are recorded as faults by the table itself.
            if let Ok(Resolution::Fulfill(_)) = table.resolve(&request) {
                if let Some(reveals) = script.on_fulfilled.get(request_url) {
                    self.attach(reveals, now);
                }
            }
        }
        Ok(())
    }

    async fn set_storage(&mut self, key: &str, value: &str) -> VerifyResult<()> {
        self.ensure_open()?;
        self.log.push(format!("set_storage:{key}"));
        self.log.with(|s| {
            s.storage.insert(key.to_string(), value.to_string());
        });
        Ok(())
    }

    async fn click(&mut self, selector: &Selector) -> VerifyResult<bool> {
        self.ensure_open()?;
        let key = selector.to_string();
        self.log.push(format!("click:{key}"));
        if !self.state(&key).is_attached() {
            return Ok(false);
        }
        if let Some(reveals) = self.script.on_click.get(&key).cloned() {
            self.attach(&reveals, Instant::now());
        }
        Ok(true)
    }

    async fn query(&mut self, selector: &Selector) -> VerifyResult<ElementState> {
        self.ensure_open()?;
        Ok(self.state(&selector.to_string()))
    }

    async fn evaluate(&mut self, script: &str) -> VerifyResult<serde_json::Value> {
        self.ensure_open()?;
        self.log.push(format!("evaluate:{script}"));
        Ok(serde_json::Value::Null)
    }

    async fn screenshot(&mut self) -> VerifyResult<Vec<u8>> {
        self.ensure_open()?;
        self.log.push("screenshot".to_string());
        match &self.script.screenshot_error {
            Some(message) => Err(VerifyError::screenshot(message.clone())),
            None => Ok(BLANK_PNG.to_vec()),
        }
    }

    async fn close(&mut self) -> VerifyResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.log.push("close".to_string());
        self.log.with(|s| s.closes += 1);
        if !self.script.close_delay.is_zero() {
            tokio::time::sleep(self.script.close_delay).await;
        }
        Ok(())
    }
}
