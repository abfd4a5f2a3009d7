//! The request/connection context an ACL is evaluated against
//!
//! The proxy owns the real checklist; ACL nodes only need the capability
//! queries and attribute accessors declared by [`Checklist`]. Attribute
//! accessors default to `None` so a checklist only implements what it
//! actually carries.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

/// Asynchronous work an ACL asked the checklist to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncStep {
    /// Build the access-log entry
    FetchAle,
    /// Wait for the request to be available
    FetchRequest,
    /// Wait for the reply to be available
    FetchReply,
    /// Obtain client credentials
    Authenticate,
}

impl fmt::Display for AsyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsyncStep::FetchAle => f.write_str("fetch-ale"),
            AsyncStep::FetchRequest => f.write_str("fetch-request"),
            AsyncStep::FetchReply => f.write_str("fetch-reply"),
            AsyncStep::Authenticate => f.write_str("authenticate"),
        }
    }
}

/// Capability interface consumed by ACL evaluation
pub trait Checklist {
    /// Whether an access-log entry is attached
    fn has_ale(&self) -> bool;
    /// Whether the request is available
    fn has_request(&self) -> bool;
    /// Whether the reply is available
    fn has_reply(&self) -> bool;

    /// Ask the owner to perform `step` and evaluate again afterwards
    fn go_async(&mut self, step: AsyncStep);
    /// The step requested by the last evaluation, if still pending
    fn async_in_progress(&self) -> Option<&AsyncStep>;

    fn src_addr(&self) -> Option<IpAddr> {
        None
    }

    fn method(&self) -> Option<&str> {
        None
    }

    fn url(&self) -> Option<&str> {
        None
    }

    fn url_path(&self) -> Option<&str> {
        None
    }

    /// Authenticated user name
    fn user(&self) -> Option<&str> {
        None
    }

    /// Annotation attached to the transaction
    fn note(&self, _key: &str) -> Option<&str> {
        None
    }

    /// Identity under which cached match results are stored
    fn cache_subject(&self) -> Option<&str> {
        self.user()
    }
}

/// Request attributes carried by a [`FilledChecklist`]
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
}

impl RequestInfo {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
        }
    }

    /// Path component of the URL, without query
    pub fn path(&self) -> &str {
        let without_scheme = match self.url.find("://") {
            Some(idx) => &self.url[idx + 3..],
            None => return self.url.split('?').next().unwrap_or(""),
        };
        match without_scheme.find('/') {
            Some(idx) => without_scheme[idx..].split('?').next().unwrap_or("/"),
            None => "/",
        }
    }
}

/// In-memory checklist
#[derive(Debug, Clone, Default)]
pub struct FilledChecklist {
    pub src_addr: Option<IpAddr>,
    pub request: Option<RequestInfo>,
    /// HTTP status of the reply, when one exists
    pub reply_status: Option<u16>,
    pub has_ale: bool,
    pub user: Option<String>,
    pub notes: HashMap<String, String>,
    pending: Option<AsyncStep>,
}

impl FilledChecklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_src(mut self, addr: IpAddr) -> Self {
        self.src_addr = Some(addr);
        self
    }

    pub fn with_request(mut self, method: &str, url: &str) -> Self {
        self.request = Some(RequestInfo::new(method, url));
        self
    }

    pub fn with_reply(mut self, status: u16) -> Self {
        self.reply_status = Some(status);
        self
    }

    pub fn with_ale(mut self) -> Self {
        self.has_ale = true;
        self
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    pub fn with_note(mut self, key: &str, value: &str) -> Self {
        self.notes.insert(key.to_string(), value.to_string());
        self
    }

    /// Forget a pending async step once the owner performed it
    pub fn resume(&mut self) -> Option<AsyncStep> {
        self.pending.take()
    }
}

impl Checklist for FilledChecklist {
    fn has_ale(&self) -> bool {
        self.has_ale
    }

    fn has_request(&self) -> bool {
        self.request.is_some()
    }

    fn has_reply(&self) -> bool {
        self.reply_status.is_some()
    }

    fn go_async(&mut self, step: AsyncStep) {
        self.pending = Some(step);
    }

    fn async_in_progress(&self) -> Option<&AsyncStep> {
        self.pending.as_ref()
    }

    fn src_addr(&self) -> Option<IpAddr> {
        self.src_addr
    }

    fn method(&self) -> Option<&str> {
        self.request.as_ref().map(|r| r.method.as_str())
    }

    fn url(&self) -> Option<&str> {
        self.request.as_ref().map(|r| r.url.as_str())
    }

    fn url_path(&self) -> Option<&str> {
        self.request.as_ref().map(RequestInfo::path)
    }

    fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    fn note(&self, key: &str) -> Option<&str> {
        self.notes.get(key).map(String::as_str)
    }
}
