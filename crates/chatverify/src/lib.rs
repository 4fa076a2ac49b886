//! chatverify: Declarative UI Verification for the Chat Interface
//!
//! Scenarios describe a browser session against a mocked backend: which API
//! routes answer with which fixtures, and which steps to take (navigate,
//! seed storage, click, wait, assert, screenshot). The runner executes each
//! scenario in a fresh isolated session and reports a structured outcome.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐
//! │ Scenario     │    │ Scenario     │    │ BrowserSession   │
//! │ (YAML/Rust)  │───►│ Runner       │───►│ (CDP / scripted) │
//! └──────────────┘    └──────┬───────┘    └────────┬─────────┘
//!                            │                     │ intercept
//!                            ▼                     ▼
//!                     ┌──────────────┐    ┌──────────────────┐
//!                     │ Reporter     │    │ RouteTable       │
//!                     └──────────────┘    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use chatverify::{PageScript, RunnerConfig, Scenario, ScenarioRunner, ScriptedLauncher};
//!
//! let scenario = Scenario::builder("smoke")
//!     .navigate("/chat")
//!     .assert_visible("text=Nova Conversa")
//!     .build()?;
//! let launcher = ScriptedLauncher::new(PageScript::new().element("/chat", "text=Nova Conversa"));
//! let runner = ScenarioRunner::new(launcher, RunnerConfig::default());
//!
//! let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
//! let result = rt.block_on(runner.run(&scenario));
//! assert!(result.is_passed());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod browser;
pub mod catalog;
pub mod driver;
pub mod fixtures;
pub mod network;
pub mod outcome;
pub mod reporter;
pub mod result;
pub mod runner;
pub mod scenario;
pub mod selector;
pub mod step;

#[cfg(feature = "browser")]
pub use browser::{CdpConfig, CdpLauncher, CdpSession};
pub use driver::{
    BrowserSession, ElementState, PageScript, ScriptedLauncher, ScriptedSession, SessionLauncher,
    SessionLog,
};
pub use fixtures::{AdminUser, AuthToken, ChatBackend, Conversation, Message, UnreadCount};
pub use network::{
    FixtureProducer, HttpMethod, InterceptedRequest, MockFault, MockResponse, Resolution,
    RouteMock, RouteTable, Sequence, UrlGlob,
};
pub use outcome::{ErrorKind, Outcome, RunResult};
pub use reporter::{Report, Reporter, Summary};
pub use result::{VerifyError, VerifyResult};
pub use runner::{RunnerConfig, ScenarioRunner};
pub use scenario::{ResponseSpec, RouteSpec, Scenario, ScenarioBuilder, ScenarioFile};
pub use selector::Selector;
pub use step::Step;
