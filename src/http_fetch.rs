//! Blocking HTTP transport shared by the catalog scraper, the metadata
//! client and poster downloads.

use std::io::Read;
use std::time::Duration;

use serde_json::Value;

const USER_AGENT: &str = "reelshelf/0.1.0 (catalog poster enrichment)";
const TRANSIENT_PREFIX: &str = "transient:";
const THROTTLED_PREFIX: &str = "throttled:";
const FATAL_PREFIX: &str = "fatal:";

/// How a failed request should be read by callers. Carried as a prefix on
/// the failure message so it survives the `String` error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeouts and server-side errors; a later run may succeed.
    Transient,
    /// The remote service answered 429.
    Throttled,
    Fatal,
}

impl FailureKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Transient => TRANSIENT_PREFIX,
            Self::Throttled => THROTTLED_PREFIX,
            Self::Fatal => FATAL_PREFIX,
        }
    }

    pub fn tag(self, message: impl std::fmt::Display) -> String {
        format!("{}{message}", self.prefix())
    }

    /// Recovers the kind from a tagged failure message.
    pub fn of(failure: &str) -> Option<Self> {
        [Self::Transient, Self::Throttled, Self::Fatal]
            .into_iter()
            .find(|kind| failure.starts_with(kind.prefix()))
    }

    fn for_status(code: u16) -> Self {
        match code {
            429 => Self::Throttled,
            408 | 500..=599 => Self::Transient,
            _ => Self::Fatal,
        }
    }

    fn for_io(error: &std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Transient,
            _ => Self::Fatal,
        }
    }

    fn for_ureq(error: &ureq::Error) -> Self {
        match error {
            ureq::Error::Status(code, _) => Self::for_status(*code),
            ureq::Error::Transport(transport) => match transport.kind() {
                ureq::ErrorKind::Io | ureq::ErrorKind::ConnectionFailed => Self::Transient,
                _ => Self::Fatal,
            },
        }
    }
}

/// Minimal GET-only transport. Every failure is a human-readable message.
pub trait HttpFetch {
    fn get_text(&self, url: &str) -> Result<String, String>;
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, String>;

    fn get_json(&self, url: &str) -> Result<Value, String> {
        let body = self.get_text(url)?;
        serde_json::from_str(&body).map_err(|error| {
            FailureKind::Fatal.tag(format_args!("Invalid JSON response: {error}"))
        })
    }
}

impl<F: HttpFetch + ?Sized> HttpFetch for &F {
    fn get_text(&self, url: &str) -> Result<String, String> {
        (**self).get_text(url)
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, String> {
        (**self).get_bytes(url)
    }

    fn get_json(&self, url: &str) -> Result<Value, String> {
        (**self).get_json(url)
    }
}

/// `ureq`-backed transport. Non-2xx statuses surface as errors.
pub struct UreqFetcher {
    http_client: ureq::Agent,
}

impl UreqFetcher {
    pub fn new() -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(15))
            .timeout_write(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build();
        Self { http_client }
    }

    fn open(&self, url: &str) -> Result<ureq::Response, String> {
        self.http_client
            .get(url)
            .call()
            .map_err(|error| {
                FailureKind::for_ureq(&error).tag(format_args!("Request failed: {error}"))
            })
    }
}

impl Default for UreqFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetch for UreqFetcher {
    fn get_text(&self, url: &str) -> Result<String, String> {
        let mut body = String::new();
        self.open(url)?
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|error| {
                FailureKind::for_io(&error).tag(format_args!("Failed to read response: {error}"))
            })?;
        Ok(body)
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, String> {
        let mut bytes = Vec::new();
        self.open(url)?
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|error| {
                FailureKind::for_io(&error).tag(format_args!("Failed to read response: {error}"))
            })?;
        Ok(bytes)
    }
}

/// Builds `{base}{endpoint}?k=v&...` with percent-encoded values.
pub fn request_url(base: &str, endpoint: &str, params: &[(&str, &str)]) -> String {
    let mut url = format!("{}{}", base.trim_end_matches('/'), endpoint);
    if params.is_empty() {
        return url;
    }

    url.push('?');
    for (index, (key, value)) in params.iter().enumerate() {
        if index > 0 {
            url.push('&');
        }
        url.push_str(key);
        url.push('=');
        url.push_str(urlencoding::encode(value).as_ref());
    }
    url
}

/// Scripted transport: answers by longest matching URL prefix and records
/// every requested URL in order.
#[cfg(test)]
pub(crate) struct ScriptedFetcher {
    routes: std::cell::RefCell<Vec<(String, Result<Vec<u8>, String>)>>,
    requests: std::cell::RefCell<Vec<String>>,
}

#[cfg(test)]
impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self {
            routes: std::cell::RefCell::new(Vec::new()),
            requests: std::cell::RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn respond_json(&self, url_prefix: &str, body: Value) {
        self.respond_bytes(url_prefix, body.to_string().into_bytes());
    }

    pub(crate) fn respond_bytes(&self, url_prefix: &str, body: Vec<u8>) {
        self.routes
            .borrow_mut()
            .push((url_prefix.to_string(), Ok(body)));
    }

    pub(crate) fn fail(&self, url_prefix: &str, message: &str) {
        self.routes
            .borrow_mut()
            .push((url_prefix.to_string(), Err(message.to_string())));
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub(crate) fn requests_matching(&self, needle: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|url| url.contains(needle))
            .count()
    }
}

#[cfg(test)]
impl HttpFetch for ScriptedFetcher {
    fn get_text(&self, url: &str) -> Result<String, String> {
        let bytes = self.get_bytes(url)?;
        String::from_utf8(bytes).map_err(|error| error.to_string())
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, String> {
        self.requests.borrow_mut().push(url.to_string());
        let routes = self.routes.borrow();
        routes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Err(format!("fatal:Request failed: {url}: status code 404")))
    }
}
