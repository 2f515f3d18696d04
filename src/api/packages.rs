// Package management endpoints

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response};
use std::fmt::Display;

use super::response::{bad_request, internal_error, json};
use super::types::InstallPackage;
use super::{query_param, read_json};
use crate::config::AppState;

/// POST install: raw installer output
pub async fn install<B>(req: Request<B>, state: &AppState, path: &str) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let body: InstallPackage = match read_json(req).await {
        Ok(body) => body,
        Err(e) => return bad_request("POST", path, &e),
    };

    match state.packages.install(&body.name, &body.version).await {
        Ok(stdout) => json("POST", path, &stdout),
        Err(e) => internal_error("POST", path, &e),
    }
}

/// POST remove?name=: raw remover output
pub async fn remove(query: Option<&str>, state: &AppState, path: &str) -> Response<Full<Bytes>> {
    let Some(name) = query_param(query, "name") else {
        return bad_request("POST", path, "Missing query parameter 'name'");
    };

    match state.packages.remove(&name).await {
        Ok(stdout) => json("POST", path, &stdout),
        Err(e) => internal_error("POST", path, &e),
    }
}

/// GET list: declared dependencies without the reserved ones
pub async fn list(state: &AppState, path: &str) -> Response<Full<Bytes>> {
    match state.packages.list().await {
        Ok(dependencies) => json("GET", path, &dependencies),
        Err(e) => internal_error("GET", path, &e),
    }
}
