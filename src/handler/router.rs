//! Request routing dispatch module
//!
//! Order of precedence: CORS preflight, body size check, health probes,
//! docs, admin surface, dynamic namespace. Anything else is 404.
//!
//! Admin and dynamic requests are buffered here under `http.max_body_size`,
//! whether or not the client sent a `Content-Length`.

use crate::api;
use crate::config::AppState;
use crate::handler::{docs, dynamic};
use crate::http;
use crate::interceptor;
use crate::logger::{self, AccessLogEntry};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{REFERER, USER_AGENT};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let started = Instant::now();
    let access_log = state.config.logging.access_log.then(|| {
        let mut entry = AccessLogEntry::new(
            peer_addr.ip().to_string(),
            req.method().to_string(),
            req.uri().path().to_string(),
        );
        entry.query = req.uri().query().map(ToString::to_string);
        entry.http_version = format!("{:?}", req.version())
            .trim_start_matches("HTTP/")
            .to_string();
        entry.referer = header_string(&req, REFERER);
        entry.user_agent = header_string(&req, USER_AGENT);
        entry
    });

    let mut response = route_request(req, &state).await;
    http::apply_cors(&mut response, &state.config.http);

    if let Some(mut entry) = access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

fn header_string<B>(req: &Request<B>, name: hyper::header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Route request based on path and configuration
async fn route_request<B>(req: Request<B>, state: &Arc<AppState>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let config = &state.config;
    let path = req.uri().path().to_string();

    // 1. CORS preflight
    if req.method() == Method::OPTIONS && config.http.enable_cors {
        return http::build_options_response(&config.http);
    }

    // 2. Body size
    if let Some(resp) = check_body_size(&req, config.http.max_body_size) {
        return resp;
    }

    // 3. Health check endpoints
    if config.health.enabled
        && req.method() == Method::GET
        && (path == config.health.liveness_path || path == config.health.readiness_path)
    {
        return http::build_health_response("ok");
    }

    // 4. Docs
    if req.method() == Method::GET && path == config.http.docs_path {
        return docs::serve_docs(state);
    }

    let is_admin = api::is_admin_path(&path);
    if !is_admin && state.namespace.endpoint_for(&path).is_none() {
        return http::build_404_response();
    }
    let req = match buffer_body(req, config.http.max_body_size).await {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    // 5. Admin surface
    if is_admin {
        return api::handle_admin(req, Arc::clone(state)).await;
    }

    // 6. Dynamic namespace, captured by the interceptor
    if let Some(endpoint) = state.namespace.endpoint_for(&path) {
        let registry = Arc::clone(&state.registry);
        let intercepted = interceptor::intercept(
            req,
            endpoint,
            Arc::clone(&state.log_store),
            move |req| dynamic::dispatch(registry, req),
        )
        .await;
        // The log write stays detached from the response
        drop(intercepted.log_task);
        return intercepted.response;
    }

    http::build_404_response()
}

/// Collect the body, at most `max_body_size` bytes; 413 past the limit
async fn buffer_body<B>(
    req: Request<B>,
    max_body_size: u64,
) -> Result<Request<Full<Bytes>>, Response<Full<Bytes>>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let (parts, body) = req.into_parts();
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(Request::from_parts(parts, Full::new(collected.to_bytes()))),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_warning(&format!(
                "Request body for {} exceeds {max_body_size} bytes",
                parts.uri.path()
            ));
            Err(http::build_413_response())
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            Err(http::build_json_error(
                hyper::StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ))
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}
