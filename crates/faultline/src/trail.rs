use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::FromRequestParts;
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::fault::Fault;

/// Per-request record of aborts, shared between the fault middleware and
/// the handlers it wraps.
///
/// The middleware creates one trail per request and inserts a clone into
/// the request extensions; handlers extract it and record faults through
/// the abort helpers. Recording never writes to the response. The
/// middleware alone decides the outward status, body, and log event once
/// the handler chain has returned.
///
/// The trail is append-only and only the last entry matters: aborting
/// twice supersedes the first fault rather than accumulating both.
#[derive(Clone, Default)]
pub struct FaultTrail {
    inner: Arc<Mutex<TrailState>>,
}

#[derive(Default)]
struct TrailState {
    aborted: bool,
    faults: Vec<Arc<Fault>>,
}

impl FaultTrail {
    /// Create an empty trail. Normally the middleware does this; tests
    /// build them directly
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the request aborted and record `fault` unmodified
    pub fn abort(&self, fault: impl Into<Fault>) {
        self.push(fault.into());
    }

    /// Mark the request aborted, wrapping `cause` with `code` and `hint`.
    ///
    /// A `cause` that is itself a [`Fault`] is recorded as-is, keeping its
    /// own code and hint; the `code` and `hint` given here are ignored so
    /// that a fault bubbling up through layers is never double-wrapped.
    pub fn abort_with(&self, code: u16, cause: impl Into<anyhow::Error>, hint: impl Into<String>) {
        match cause.into().downcast::<Fault>() {
            Ok(fault) => self.push(fault),
            Err(cause) => self.push(Fault::new(code, cause, hint)),
        }
    }

    /// Mark the request aborted, wrapping `cause` with `code` and no hint
    pub fn abort_with_error(&self, code: u16, cause: impl Into<anyhow::Error>) {
        self.abort_with(code, cause, "");
    }

    /// Mark the request aborted with a code and a user-facing hint only
    pub fn abort_with_hint(&self, code: u16, hint: impl Into<String>) {
        self.push(Fault::with_hint(code, hint));
    }

    /// Whether any abort helper ran for this request
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }

    /// The most recently recorded fault, if any
    #[must_use]
    pub fn last(&self) -> Option<Arc<Fault>> {
        self.lock().faults.last().cloned()
    }

    fn push(&self, fault: Fault) {
        let mut state = self.lock();
        state.aborted = true;
        state.faults.push(Arc::new(fault));
    }

    fn lock(&self) -> MutexGuard<'_, TrailState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Rejection returned when [`FaultTrail`] is extracted on a route that the
/// fault middleware does not wrap
#[derive(Debug, thiserror::Error)]
#[error("fault middleware is not installed for this route")]
pub struct MiddlewareNotInstalled;

impl IntoResponse for MiddlewareNotInstalled {
    fn into_response(self) -> Response {
        tracing::error!("{self}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

impl<S> FromRequestParts<S> for FaultTrail
where
    S: Send + Sync,
{
    type Rejection = MiddlewareNotInstalled;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(MiddlewareNotInstalled)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn starts_clean() {
        let trail = FaultTrail::new();
        assert!(!trail.is_aborted());
        assert!(trail.last().is_none());
    }

    #[test]
    fn abort_marks_and_records() {
        let trail = FaultTrail::new();

        trail.abort(Fault::with_hint(404, "gone"));

        assert!(trail.is_aborted());
        let last = trail.last().expect("fault recorded");
        assert_eq!(last.code(), 404);
        assert_eq!(last.hint(), "gone");
    }

    #[test]
    fn last_recorded_fault_wins() {
        let trail = FaultTrail::new();

        trail.abort_with(500, anyhow!("first"), "error1");
        trail.abort_with(400, anyhow!("second"), "error2");

        let last = trail.last().unwrap();
        assert_eq!(last.code(), 400);
        assert_eq!(last.hint(), "error2");
        assert_eq!(last.to_string(), "second");
    }

    #[test]
    fn fault_cause_is_not_rewrapped() {
        let trail = FaultTrail::new();

        trail.abort_with(500, Fault::with_hint(404, "no such user"), "outer hint");

        let last = trail.last().unwrap();
        assert_eq!(last.code(), 404);
        assert_eq!(last.hint(), "no such user");
        assert!(last.cause().is_none());
    }

    #[test]
    fn abort_with_error_leaves_hint_empty() {
        let trail = FaultTrail::new();

        trail.abort_with_error(502, anyhow!("upstream hung up"));

        let last = trail.last().unwrap();
        assert_eq!(last.code(), 502);
        assert_eq!(last.hint(), "");
        assert_eq!(last.to_string(), "upstream hung up");
    }

    #[test]
    fn abort_accepts_status_codes() {
        let trail = FaultTrail::new();

        trail.abort(StatusCode::IM_A_TEAPOT);

        assert_eq!(trail.last().unwrap().code(), 418);
    }

    #[test]
    fn clone_shares_state() {
        let trail = FaultTrail::new();
        let handle = trail.clone();

        handle.abort(402);

        assert!(trail.is_aborted());
        assert_eq!(trail.last().unwrap().code(), 402);
    }
}
