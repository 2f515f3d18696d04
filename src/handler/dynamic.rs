//! Dynamic endpoint dispatch
//!
//! Resolves `(path, method)` against the frozen route table and runs the
//! bound capability on the blocking pool.

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Request, Response};
use std::sync::Arc;

use crate::functions::{FunctionRegistry, HandlerError, HandlerRequest, HandlerResponse};
use crate::http;
use crate::interceptor::header_map;

/// Invoke the capability bound to the request's path and method.
///
/// Unbound paths yield 404, bound paths with another verb yield 405.
pub async fn dispatch(
    registry: Arc<FunctionRegistry>,
    req: Request<Full<Bytes>>,
) -> Result<Response<Full<Bytes>>, HandlerError> {
    let path = req.uri().path().to_string();
    let Some(binding) = registry.binding(&path, req.method()).cloned() else {
        let allowed = registry.allowed_methods(&path);
        return Ok(if allowed.is_empty() {
            http::build_404_response()
        } else {
            http::build_405_response(&allowed)
        });
    };

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    };
    let request = HandlerRequest {
        method: parts.method.to_string(),
        path,
        query: parts.uri.query().map(ToString::to_string),
        headers: header_map(&parts.headers),
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    let response = tokio::task::spawn_blocking(move || binding.invoke(&request))
        .await
        .map_err(|e| HandlerError::Join(e.to_string()))??;

    Ok(build_handler_response(response))
}

fn build_handler_response(response: HandlerResponse) -> Response<Full<Bytes>> {
    Response::builder()
        .status(response.status)
        .header(CONTENT_TYPE, response.content_type)
        .body(Full::new(Bytes::from(response.body)))
        .unwrap_or_else(|e| {
            crate::logger::log_error(&format!("Failed to build handler response: {e}"));
            http::build_json_error(
                hyper::StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            )
        })
}
