// Admin API response utility functions

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::types::Detail;
use crate::http;
use crate::logger;

/// `{"detail": value}` with status 200
pub fn detail<T: Serialize>(method: &str, path: &str, value: T) -> Response<Full<Bytes>> {
    logger::log_api_request(method, path, 200);
    http::build_json_response(StatusCode::OK, &Detail { detail: value })
}

/// Bare JSON body with status 200
pub fn json<T: Serialize>(method: &str, path: &str, value: &T) -> Response<Full<Bytes>> {
    logger::log_api_request(method, path, 200);
    http::build_json_response(StatusCode::OK, value)
}

/// 400 Bad Request response
pub fn bad_request(method: &str, path: &str, message: &str) -> Response<Full<Bytes>> {
    logger::log_api_request(method, path, 400);
    http::build_json_error(StatusCode::BAD_REQUEST, message)
}

/// 401 Unauthorized response
pub fn unauthorized(method: &str, path: &str) -> Response<Full<Bytes>> {
    logger::log_api_request(method, path, 401);
    http::build_json_error(StatusCode::UNAUTHORIZED, "invalid api key")
}

/// 404 Not Found response
pub fn not_found(method: &str, path: &str) -> Response<Full<Bytes>> {
    logger::log_api_request(method, path, 404);
    http::build_404_response()
}

/// 500 Internal Server Error response; the cause only goes to the error log
pub fn internal_error(method: &str, path: &str, cause: &dyn std::fmt::Display) -> Response<Full<Bytes>> {
    logger::log_api_error(&format!("{method} {path}: {cause}"));
    logger::log_api_request(method, path, 500);
    http::build_json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}
