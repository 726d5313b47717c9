use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode, header};
use serde_json::Value;

use crate::config::FaultConfig;
use crate::trail::FaultTrail;

/// Finalizing middleware that turns the last recorded fault into the
/// outward response.
///
/// Creates a [`FaultTrail`], exposes it to the handler chain through the
/// request extensions, and rewrites the response once the inner service
/// returns. For aborted requests the fault's code wins when it lies within
/// 200 to 599, the hint wins over the cause's message, and the configured
/// hooks decide the log event and the body shape. Requests that never
/// aborted pass through untouched.
///
/// Wire it with the configuration captured once:
///
/// ```rust
/// use std::sync::Arc;
///
/// use axum::Router;
/// use axum::routing::get;
/// use faultline::{FaultConfig, fault_middleware};
///
/// let config = Arc::new(FaultConfig::new().with_message(404, "Not Found"));
/// let app: Router = Router::new()
///     .route("/", get(|| async { "ok" }))
///     .layer(axum::middleware::from_fn(move |req, next| {
///         let config = Arc::clone(&config);
///         async move { fault_middleware(config, req, next).await }
///     }));
/// ```
pub async fn fault_middleware(config: Arc<FaultConfig>, mut request: Request, next: Next) -> Response {
    let trail = FaultTrail::new();
    request.extensions_mut().insert(trail.clone());

    let response = next.run(request).await;

    if !trail.is_aborted() {
        return response;
    }
    let Some(fault) = trail.last() else {
        return response;
    };

    let code = final_status(response.status(), fault.code());

    let mut message = if fault.hint().is_empty() {
        fault.to_string()
    } else {
        fault.hint().to_owned()
    };

    if config.should_log(code.as_u16(), &fault) {
        tracing::error!(code = code.as_u16(), error = %fault, "request aborted");
    }

    if message.is_empty() {
        match config.fallback_message(code.as_u16()) {
            Some(mapped) => message = mapped.to_owned(),
            None => return code.into_response(),
        }
    }

    match config.build_body(code.as_u16(), &message) {
        Some(body) => json_response(code, &body),
        None => code.into_response(),
    }
}

/// The fault's code wins when it is usable as a response status; anything
/// outside 200 to 599 falls back to the status the handler chain produced
fn final_status(existing: StatusCode, requested: u16) -> StatusCode {
    if (200..=599).contains(&requested) {
        StatusCode::from_u16(requested).unwrap_or(existing)
    } else {
        existing
    }
}

/// Serialize `body` under `code`; a serialization failure degrades to the
/// bare status so the middleware never produces an error of its own
fn json_response(code: StatusCode, body: &Value) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (
            code,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            bytes,
        )
            .into_response(),
        Err(_) => code.into_response(),
    }
}
