//! Chromium backend over the Chrome DevTools Protocol.
//!
//! One Chromium process is launched lazily and shared by every session of a
//! [`CdpLauncher`]; each session gets its own browser context, so storage
//! and cookies are isolated per scenario.
//!
//! Route mocks are served through the CDP Fetch domain: every paused
//! request is resolved against the installed [`RouteTable`] and then
//! fulfilled, continued or failed.

use crate::driver::{BrowserSession, ElementState, SessionLauncher};
use crate::network::{HttpMethod, InterceptedRequest, MockResponse, Resolution, RouteTable};
use crate::result::{VerifyError, VerifyResult};
use crate::selector::{js_string, Selector};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
    FulfillRequestParams, HeaderEntry, RequestId,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Chromium launch options
#[derive(Debug, Clone)]
pub struct CdpConfig {
    /// Run without a visible window
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<PathBuf>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl CdpConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    fn to_browser_config(&self) -> VerifyResult<ChromiumConfig> {
        let mut builder =
            ChromiumConfig::builder().window_size(self.viewport_width, self.viewport_height);
        if !self.headless {
            builder = builder.with_head();
        }
        if !self.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &self.chromium_path {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(VerifyError::session)
    }
}

struct SharedBrowser {
    browser: Arc<Mutex<CdpBrowser>>,
    handler: JoinHandle<()>,
}

/// Launches sessions in isolated contexts of one shared Chromium
pub struct CdpLauncher {
    config: CdpConfig,
    shared: Mutex<Option<SharedBrowser>>,
}

impl std::fmt::Debug for CdpLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpLauncher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CdpLauncher {
    /// Create a launcher; Chromium starts on the first launch
    #[must_use]
    pub fn new(config: CdpConfig) -> Self {
        Self {
            config,
            shared: Mutex::new(None),
        }
    }

    /// Launcher options
    #[must_use]
    pub const fn config(&self) -> &CdpConfig {
        &self.config
    }

    async fn browser(&self) -> VerifyResult<Arc<Mutex<CdpBrowser>>> {
        let mut shared = self.shared.lock().await;
        if let Some(existing) = shared.as_ref() {
            return Ok(Arc::clone(&existing.browser));
        }

        let (browser, mut handler) = CdpBrowser::launch(self.config.to_browser_config()?)
            .await
            .map_err(|e| VerifyError::session(e.to_string()))?;
        tracing::info!(headless = self.config.headless, "chromium launched");

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        let browser = Arc::new(Mutex::new(browser));
        *shared = Some(SharedBrowser {
            browser: Arc::clone(&browser),
            handler,
        });
        Ok(browser)
    }

    /// Close Chromium if it was started
    pub async fn shutdown(&self) -> VerifyResult<()> {
        let Some(shared) = self.shared.lock().await.take() else {
            return Ok(());
        };
        let result = shared.browser.lock().await.close().await;
        shared.handler.abort();
        result
            .map(|_| ())
            .map_err(|e| VerifyError::session(e.to_string()))
    }
}

impl Drop for CdpLauncher {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.get_mut().take() {
            shared.handler.abort();
        }
    }
}

#[async_trait]
impl SessionLauncher for CdpLauncher {
    async fn launch(&self) -> VerifyResult<Box<dyn BrowserSession>> {
        let browser = self.browser().await?;
        let mut guard = browser.lock().await;
        let context_id = guard
            .create_browser_context(CreateBrowserContextParams::default())
            .await
            .map_err(|e| VerifyError::session(e.to_string()))?;
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(VerifyError::session)?;
        let page = guard
            .new_page(target)
            .await
            .map_err(|e| VerifyError::session(e.to_string()))?;
        drop(guard);
        tracing::debug!(context = ?context_id, "opened isolated browser context");

        Ok(Box::new(CdpSession {
            page,
            browser,
            context_id: Some(context_id),
            interceptor: None,
        }))
    }
}

/// One page in its own browser context
pub struct CdpSession {
    page: CdpPage,
    browser: Arc<Mutex<CdpBrowser>>,
    context_id: Option<BrowserContextId>,
    interceptor: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for CdpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpSession")
            .field("context_id", &self.context_id)
            .finish_non_exhaustive()
    }
}

impl CdpSession {
    async fn eval(&self, script: &str) -> VerifyResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| VerifyError::Script {
                message: e.to_string(),
            })?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        if let Some(task) = self.interceptor.take() {
            task.abort();
        }
    }
}

async fn answer(
    page: &CdpPage,
    id: RequestId,
    resolution: VerifyResult<Resolution>,
) -> VerifyResult<()> {
    let sent = match resolution {
        Ok(Resolution::Fulfill(response)) => page
            .execute(fulfill_params(id, &response)?)
            .await
            .map(|_| ()),
        Ok(Resolution::PassThrough) => page
            .execute(ContinueRequestParams::new(id))
            .await
            .map(|_| ()),
        Ok(Resolution::Reject) | Err(_) => page
            .execute(FailRequestParams::new(id, ErrorReason::Failed))
            .await
            .map(|_| ()),
    };
    sent.map_err(|e| VerifyError::session(e.to_string()))
}

fn fulfill_params(id: RequestId, response: &MockResponse) -> VerifyResult<FulfillRequestParams> {
    let headers: Vec<HeaderEntry> = response
        .header_pairs()
        .into_iter()
        .map(|(name, value)| HeaderEntry::new(name, value))
        .collect();
    FulfillRequestParams::builder()
        .request_id(id)
        .response_code(i64::from(response.status))
        .response_headers(headers)
        .body(base64::engine::general_purpose::STANDARD.encode(&response.body))
        .build()
        .map_err(VerifyError::session)
}

#[async_trait]
impl BrowserSession for CdpSession {
    async fn install_routes(&mut self, table: Arc<RouteTable>) -> VerifyResult<()> {
        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| VerifyError::session(e.to_string()))?;
        self.page
            .execute(EnableParams::default())
            .await
            .map_err(|e| VerifyError::session(e.to_string()))?;

        let page = self.page.clone();
        self.interceptor = Some(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let request = InterceptedRequest::new(
                    event.request.url.clone(),
                    HttpMethod::parse(&event.request.method),
                )
                .with_resource_type(format!("{:?}", event.resource_type));
                let resolution = table.resolve(&request);
                if let Err(e) = answer(&page, event.request_id.clone(), resolution).await {
                    tracing::debug!(
                        url = %request.url,
                        error = %e,
                        "could not answer paused request"
                    );
                }
            }
        }));
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> VerifyResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| VerifyError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn set_storage(&mut self, key: &str, value: &str) -> VerifyResult<()> {
        self.eval(&format!(
            "localStorage.setItem({}, {})",
            js_string(key),
            js_string(value)
        ))
        .await?;
        Ok(())
    }

    async fn click(&mut self, selector: &Selector) -> VerifyResult<bool> {
        Ok(self.eval(&selector.to_click_script()).await?.as_bool() == Some(true))
    }

    async fn query(&mut self, selector: &Selector) -> VerifyResult<ElementState> {
        Ok(ElementState::from_js(
            &self.eval(&selector.to_state_check()).await?,
        ))
    }

    async fn evaluate(&mut self, script: &str) -> VerifyResult<serde_json::Value> {
        self.eval(script).await
    }

    async fn screenshot(&mut self) -> VerifyResult<Vec<u8>> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let screenshot = self
            .page
            .execute(params)
            .await
            .map_err(|e| VerifyError::screenshot(e.to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(&screenshot.data)
            .map_err(|e| VerifyError::screenshot(e.to_string()))
    }

    async fn close(&mut self) -> VerifyResult<()> {
        if let Some(task) = self.interceptor.take() {
            task.abort();
        }
        let Some(context_id) = self.context_id.take() else {
            return Ok(());
        };
        let closed = self.page.clone().close().await;
        let disposed = self
            .browser
            .lock()
            .await
            .dispose_browser_context(context_id)
            .await;
        closed.map_err(|e| VerifyError::session(e.to_string()))?;
        disposed.map_err(|e| VerifyError::session(e.to_string()))?;
        Ok(())
    }
}
