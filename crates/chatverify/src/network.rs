//! Route Mock Table
//!
//! Maps URL glob patterns to canned responses. The table is shared with the
//! browser's network-interception hook, which calls [`RouteTable::resolve`]
//! for every request the page issues.
//!
//! Glob semantics follow Playwright's `page.route`:
//!
//! - `**` matches any run of characters, `/` included
//! - `*` matches any run of characters except `/`
//! - `?` matches a single character except `/`
//! - `{a,b}` matches either alternative
//!
//! The pattern must match the whole URL. When several rules match, the
//! last-registered rule wins.

use crate::result::{VerifyError, VerifyResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// HTTP methods for request matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// DELETE request
    Delete,
    /// PATCH request
    Patch,
    /// HEAD request
    Head,
    /// OPTIONS request
    Options,
    /// Any method
    #[default]
    #[serde(rename = "*")]
    Any,
}

impl HttpMethod {
    /// Parse from a request method string
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            _ => Self::Any,
        }
    }

    /// Convert to string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "*",
        }
    }

    /// Check if this method matches another
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        *self == Self::Any || *other == Self::Any || *self == *other
    }
}

/// A canned HTTP response served in place of the real backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockResponse {
    /// HTTP status code
    pub status: u16,
    /// Additional response headers
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: Vec<u8>,
    /// Content type
    pub content_type: String,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
            content_type: "application/json".to_string(),
        }
    }
}

impl MockResponse {
    /// Create an empty 200 response
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a JSON response
    pub fn json<T: Serialize>(data: &T) -> VerifyResult<Self> {
        Ok(Self {
            body: serde_json::to_vec(data)?,
            ..Self::default()
        })
    }

    /// Create a text response
    #[must_use]
    pub fn text(content: &str) -> Self {
        Self {
            body: content.as_bytes().to_vec(),
            content_type: "text/plain".to_string(),
            ..Self::default()
        }
    }

    /// Create an error response with a `{"error": ...}` body
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self {
            status,
            body: body.into_bytes(),
            ..Self::default()
        }
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    /// Set content type
    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    /// Get body as string
    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Header list as sent on the wire, content type first
    #[must_use]
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("Content-Type".to_string(), self.content_type.clone())];
        let mut extra: Vec<_> = self
            .headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("content-type"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        extra.sort();
        pairs.extend(extra);
        pairs
    }
}

/// Compiled URL glob
#[derive(Debug, Clone)]
pub struct UrlGlob {
    source: String,
    regex: Regex,
}

impl UrlGlob {
    /// Compile a glob pattern
    pub fn new(pattern: &str) -> VerifyResult<Self> {
        let regex = Regex::new(&glob_to_regex(pattern)?).map_err(|e| {
            VerifyError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Check if a URL matches
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// The original pattern text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for UrlGlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn glob_to_regex(glob: &str) -> VerifyResult<String> {
    let invalid = |message: &str| VerifyError::InvalidPattern {
        pattern: glob.to_string(),
        message: message.to_string(),
    };

    let mut re = String::with_capacity(glob.len() * 2 + 2);
    re.push('^');
    let mut in_group = false;
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                re.push_str(".*");
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '{' if !in_group => {
                in_group = true;
                re.push('(');
            }
            '{' => return Err(invalid("nested `{` groups are not supported")),
            '}' if in_group => {
                in_group = false;
                re.push(')');
            }
            ',' if in_group => re.push('|'),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    if in_group {
        return Err(invalid("unclosed `{` group"));
    }
    re.push('$');
    Ok(re)
}

/// Request metadata handed to fixture producers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptedRequest {
    /// Full request URL
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Browser resource type (`XHR`, `Fetch`, `Document`, ...), when known
    pub resource_type: Option<String>,
}

impl InterceptedRequest {
    /// Create a request record
    #[must_use]
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            resource_type: None,
        }
    }

    /// Set resource type
    #[must_use]
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// URL path without scheme, authority, query or fragment
    #[must_use]
    pub fn path(&self) -> &str {
        let after_scheme = self
            .url
            .find("://")
            .map_or(self.url.as_str(), |i| &self.url[i + 3..]);
        let path = after_scheme
            .find('/')
            .map_or("/", |i| &after_scheme[i..]);
        let end = path.find(['?', '#']).unwrap_or(path.len());
        &path[..end]
    }
}

/// Produces the fixture served for a matched request.
///
/// Producers should be pure functions of the request; [`Sequence`] is the
/// exception, varying by call count for pagination or refresh flows.
pub trait FixtureProducer: Send + Sync {
    /// Produce the response for a request
    fn produce(&self, request: &InterceptedRequest) -> Result<MockResponse, String>;
}

impl<F> FixtureProducer for F
where
    F: Fn(&InterceptedRequest) -> Result<MockResponse, String> + Send + Sync,
{
    fn produce(&self, request: &InterceptedRequest) -> Result<MockResponse, String> {
        self(request)
    }
}

impl FixtureProducer for MockResponse {
    fn produce(&self, _request: &InterceptedRequest) -> Result<MockResponse, String> {
        Ok(self.clone())
    }
}

/// Serves responses in order; the last one repeats once the list is exhausted
#[derive(Debug)]
pub struct Sequence {
    responses: Vec<MockResponse>,
    calls: AtomicUsize,
}

impl Sequence {
    /// Create a sequence producer
    #[must_use]
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times the sequence has been asked for a response
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FixtureProducer for Sequence {
    fn produce(&self, _request: &InterceptedRequest) -> Result<MockResponse, String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let last = self
            .responses
            .len()
            .checked_sub(1)
            .ok_or_else(|| "sequence has no responses".to_string())?;
        Ok(self.responses[call.min(last)].clone())
    }
}

/// One registered rule: pattern, method filter and producer
#[derive(Clone)]
pub struct RouteMock {
    /// URL pattern
    pub pattern: UrlGlob,
    /// Method filter
    pub method: HttpMethod,
    /// Fixture producer
    pub producer: Arc<dyn FixtureProducer>,
}

impl RouteMock {
    /// Create a rule matching any method
    pub fn new(pattern: &str, producer: impl FixtureProducer + 'static) -> VerifyResult<Self> {
        Ok(Self {
            pattern: UrlGlob::new(pattern)?,
            method: HttpMethod::Any,
            producer: Arc::new(producer),
        })
    }

    /// Restrict to one method
    #[must_use]
    pub const fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Check if this rule matches a request
    #[must_use]
    pub fn matches(&self, request: &InterceptedRequest) -> bool {
        self.method.matches(&request.method) && self.pattern.matches(&request.url)
    }
}

impl fmt::Debug for RouteMock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMock")
            .field("pattern", &self.pattern.as_str())
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// What the interception hook should do with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Serve this fixture
    Fulfill(MockResponse),
    /// No rule matched; let the request reach the network
    PassThrough,
    /// No rule matched in strict mode; fail the request
    Reject,
}

/// A problem observed while resolving requests, surfaced to the runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockFault {
    /// Request URL
    pub url: String,
    /// Description of the fault
    pub message: String,
}

#[derive(Debug)]
struct RouteEntry {
    mock: RouteMock,
    hits: AtomicUsize,
}

/// Route mock table for one scenario run
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<RouteEntry>,
    strict: bool,
    strict_scope: Option<UrlGlob>,
    requests: Mutex<Vec<InterceptedRequest>>,
    faults: Mutex<Vec<MockFault>>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    /// Create an empty, non-strict table
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            strict: false,
            strict_scope: None,
            requests: Mutex::new(Vec::new()),
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Reject unmatched requests whose URL falls inside `scope`
    /// (every URL when `scope` is `None`)
    #[must_use]
    pub fn strict(mut self, scope: Option<UrlGlob>) -> Self {
        self.strict = true;
        self.strict_scope = scope;
        self
    }

    /// Whether strict mode is on
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Register a producer for a glob pattern
    pub fn register(
        &mut self,
        pattern: &str,
        producer: impl FixtureProducer + 'static,
    ) -> VerifyResult<()> {
        self.register_route(RouteMock::new(pattern, producer)?);
        Ok(())
    }

    /// Register a prepared rule
    pub fn register_route(&mut self, mock: RouteMock) {
        self.routes.push(RouteEntry {
            mock,
            hits: AtomicUsize::new(0),
        });
    }

    /// Number of registered rules
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Resolve a request against the table.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::RouteMock`] when the winning producer fails or
    /// panics. The failure is also recorded as a fault.
    pub fn resolve(&self, request: &InterceptedRequest) -> VerifyResult<Resolution> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let Some(entry) = self.routes.iter().rev().find(|e| e.mock.matches(request)) else {
            if self.strict && self.strict_scope.as_ref().map_or(true, |s| s.matches(&request.url))
            {
                self.record_fault(
                    &request.url,
                    format!(
                        "no route matched {} {} in strict mode",
                        request.method.as_str(),
                        request.url
                    ),
                );
                return Ok(Resolution::Reject);
            }
            return Ok(Resolution::PassThrough);
        };

        entry.hits.fetch_add(1, Ordering::SeqCst);
        let produced = catch_unwind(AssertUnwindSafe(|| entry.mock.producer.produce(request)))
            .unwrap_or_else(|panic| Err(panic_message(panic.as_ref())));

        match produced {
            Ok(response) => Ok(Resolution::Fulfill(response)),
            Err(message) => {
                self.record_fault(
                    &request.url,
                    format!("producer for `{}` failed: {message}", entry.mock.pattern),
                );
                Err(VerifyError::RouteMock {
                    pattern: entry.mock.pattern.to_string(),
                    url: request.url.clone(),
                    message,
                })
            }
        }
    }

    fn record_fault(&self, url: &str, message: String) {
        tracing::warn!(url, %message, "route mock fault");
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(MockFault {
                url: url.to_string(),
                message,
            });
        }
    }

    /// Drain recorded faults
    pub fn take_faults(&self) -> Vec<MockFault> {
        self.faults
            .lock()
            .map(|mut f| std::mem::take(&mut *f))
            .unwrap_or_default()
    }

    /// All requests seen so far
    #[must_use]
    pub fn requests(&self) -> Vec<InterceptedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Total hits across rules registered with this pattern text
    #[must_use]
    pub fn hits(&self, pattern: &str) -> usize {
        self.routes
            .iter()
            .filter(|e| e.mock.pattern.as_str() == pattern)
            .map(|e| e.hits.load(Ordering::SeqCst))
            .sum()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .map_or_else(
            || "producer panicked".to_string(),
            |m| format!("producer panicked: {m}"),
        )
}
