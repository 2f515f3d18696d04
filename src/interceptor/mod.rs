//! Request/response interceptor for the dynamic namespace
//!
//! Buffers the request body so the handler can still read it, buffers the
//! handler's response and re-emits it unchanged, then hands a [`LogRecord`]
//! to the log store from a detached task. Logging never changes or delays
//! the response; its failures are only reported through `tracing`.

mod capture;

pub use capture::{cookies, decode_body, header_map};

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::functions::HandlerError;
use crate::http;
use crate::logger;
use crate::logs::{LogRecord, LogStore, RequestSnapshot, ResponseSnapshot};

/// Response to deliver plus the pending log write, if any
pub struct Intercepted {
    pub response: Response<Full<Bytes>>,
    /// Detached by the server; awaited by tests
    pub log_task: Option<JoinHandle<()>>,
}

impl Intercepted {
    const fn without_log(response: Response<Full<Bytes>>) -> Self {
        Self {
            response,
            log_task: None,
        }
    }
}

/// Run `next` for a request to `endpoint`, capturing the exchange.
///
/// Handler errors propagate as a 500 response and are not logged.
pub async fn intercept<B, F, Fut>(
    req: Request<B>,
    endpoint: &str,
    log_store: Arc<LogStore>,
    next: F,
) -> Intercepted
where
    B: Body,
    B::Error: Display,
    F: FnOnce(Request<Full<Bytes>>) -> Fut,
    Fut: Future<Output = Result<Response<Full<Bytes>>, HandlerError>>,
{
    // Pre-handler: drain the body and rebuild a re-readable request
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body for '{endpoint}': {e}"));
            return Intercepted::without_log(http::build_json_error(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ));
        }
    };
    let method = parts.method.to_string();
    let request_snapshot = RequestSnapshot {
        headers: header_map(&parts.headers),
        cookies: cookies(&parts.headers),
        data: decode_body(&parts.headers, &body),
    };
    let request = Request::from_parts(parts, Full::new(body));

    let response = match next(request).await {
        Ok(response) => response,
        Err(e) => {
            logger::log_handler_error(endpoint, &e);
            return Intercepted::without_log(http::build_json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            ));
        }
    };

    // Post-handler: drain the response and re-emit it as-is
    let (parts, body) = response.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    };
    let response_snapshot = ResponseSnapshot {
        headers: header_map(&parts.headers),
        status_code: parts.status.as_u16(),
        data: String::from_utf8_lossy(&body).into_owned(),
    };
    let response = Response::from_parts(parts, Full::new(body));

    let record = LogRecord::now(&method, request_snapshot, response_snapshot);
    let endpoint = endpoint.to_string();
    let log_task = tokio::spawn(async move {
        persist(&log_store, &endpoint, record).await;
    });

    Intercepted {
        response,
        log_task: Some(log_task),
    }
}

/// Best-effort append; a missing log file is silently skipped
async fn persist(log_store: &LogStore, endpoint: &str, record: LogRecord) {
    match log_store.append(endpoint, record).await {
        Ok(true) => logger::log_record_appended(endpoint),
        Ok(false) => {}
        Err(e) => logger::log_error(&format!("Failed to append log for '{endpoint}': {e}")),
    }
}
