use std::collections::HashMap;

use serde_json::{Value, json};

use crate::fault::Fault;

type BodyHook = Box<dyn Fn(u16, &str) -> Option<Value> + Send + Sync>;
type LogHook = Box<dyn Fn(u16, &Fault) -> bool + Send + Sync>;

/// Policy configuration for the fault middleware.
///
/// Every hook is optional; the defaults reproduce the stock behavior: a
/// `{"message": ...}` JSON body, an error-level log event for codes 500
/// and above, and no fallback messages. Build one at startup, wrap it in
/// an [`Arc`], and share it across requests. The value holds policy only,
/// never per-request state.
///
/// [`Arc`]: std::sync::Arc
#[derive(Default)]
pub struct FaultConfig {
    body: Option<BodyHook>,
    log: Option<LogHook>,
    messages: HashMap<u16, String>,
}

impl FaultConfig {
    /// Create a configuration with all defaults in place
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the response body builder.
    ///
    /// The hook receives the final status code and the resolved message.
    /// Returning `None` sends the status code with an empty body; any
    /// returned value replaces the default `{"message": ...}` shape
    /// entirely.
    #[must_use]
    pub fn with_response_body(
        mut self,
        hook: impl Fn(u16, &str) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.body = Some(Box::new(hook));
        self
    }

    /// Replace the log policy.
    ///
    /// The hook receives the final status code and the recorded fault,
    /// once per aborted request, and returns whether the middleware should
    /// emit its error event. A hook that does its own logging can return
    /// `false` to keep the built-in event quiet.
    #[must_use]
    pub fn with_log_policy(
        mut self,
        hook: impl Fn(u16, &Fault) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.log = Some(Box::new(hook));
        self
    }

    /// Register a fallback message for a status code, used when a fault
    /// carries neither hint nor cause
    #[must_use]
    pub fn with_message(mut self, code: u16, message: impl Into<String>) -> Self {
        self.messages.insert(code, message.into());
        self
    }

    /// Register fallback messages in bulk
    #[must_use]
    pub fn with_messages<M: Into<String>>(
        mut self,
        entries: impl IntoIterator<Item = (u16, M)>,
    ) -> Self {
        self.messages
            .extend(entries.into_iter().map(|(code, message)| (code, message.into())));
        self
    }

    pub(crate) fn build_body(&self, code: u16, message: &str) -> Option<Value> {
        match &self.body {
            Some(hook) => hook(code, message),
            None if message.is_empty() => None,
            None => Some(json!({ "message": message })),
        }
    }

    pub(crate) fn should_log(&self, code: u16, fault: &Fault) -> bool {
        self.log.as_ref().map_or(code >= 500, |hook| hook(code, fault))
    }

    /// Fallback message for `code`; an empty registered message counts as
    /// no entry
    pub(crate) fn fallback_message(&self, code: u16) -> Option<&str> {
        self.messages
            .get(&code)
            .map(String::as_str)
            .filter(|message| !message.is_empty())
    }
}
