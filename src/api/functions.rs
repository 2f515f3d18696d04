// Handler source management endpoints
// Source CRUD plus the matching log file lifecycle

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response};
use std::fmt::Display;

use super::response::{bad_request, detail, internal_error, json};
use super::types::{FunctionName, FunctionSource};
use super::{query_param, read_json};
use crate::config::AppState;
use crate::functions::{is_valid_name, SourceError, SourceStore};
use crate::logger;
use crate::logs::{LogFile, LogStoreError};

const INVALID_NAME: &str = "Invalid function name";

/// POST create: write the source and an empty log file
pub async fn create<B>(req: Request<B>, state: &AppState, path: &str) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let body: FunctionSource = match read_json(req).await {
        Ok(body) => body,
        Err(e) => return bad_request("POST", path, &e),
    };
    if !is_valid_name(&body.name) {
        return bad_request("POST", path, INVALID_NAME);
    }

    let sources = SourceStore::new(&state.config.functions);
    match sources.create(&body.name, &body.code).await {
        Ok(()) => {}
        Err(SourceError::AlreadyExists) => {
            return bad_request("POST", path, &SourceError::AlreadyExists.to_string())
        }
        Err(e) => return internal_error("POST", path, &e),
    }
    if let Err(e) = state.log_store.initialize(&body.name).await {
        // Without its log file the source must not stay behind
        if let Err(cleanup) = sources.delete(&body.name).await {
            logger::log_warning(&format!(
                "Failed to remove source for '{}' after log init failure: {cleanup}",
                body.name
            ));
        }
        return internal_error("POST", path, &e);
    }
    detail("POST", path, "Function has been created")
}

/// POST update: overwrite an existing source
pub async fn update<B>(req: Request<B>, state: &AppState, path: &str) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let body: FunctionSource = match read_json(req).await {
        Ok(body) => body,
        Err(e) => return bad_request("POST", path, &e),
    };
    if !is_valid_name(&body.name) {
        return bad_request("POST", path, INVALID_NAME);
    }

    let sources = SourceStore::new(&state.config.functions);
    match sources.update(&body.name, &body.code).await {
        Ok(()) => detail("POST", path, "Function has been updated"),
        Err(SourceError::NotFound) => {
            bad_request("POST", path, &SourceError::NotFound.to_string())
        }
        Err(e) => internal_error("POST", path, &e),
    }
}

/// POST delete: remove source and log file; absent files are fine
pub async fn delete<B>(req: Request<B>, state: &AppState, path: &str) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let body: FunctionName = match read_json(req).await {
        Ok(body) => body,
        Err(e) => return bad_request("POST", path, &e),
    };
    if !is_valid_name(&body.name) {
        return bad_request("POST", path, INVALID_NAME);
    }

    let sources = SourceStore::new(&state.config.functions);
    if let Err(e) = sources.delete(&body.name).await {
        return internal_error("POST", path, &e);
    }
    if let Err(e) = state.log_store.delete(&body.name).await {
        return internal_error("POST", path, &e);
    }
    detail("POST", path, "Function has been deleted")
}

/// GET list: endpoint names from the source directory
pub async fn list(state: &AppState, path: &str) -> Response<Full<Bytes>> {
    let sources = SourceStore::new(&state.config.functions);
    match sources.list().await {
        Ok(names) => json("GET", path, &names),
        Err(e) => internal_error("GET", path, &e),
    }
}

/// GET get?name=: source text
pub async fn get(query: Option<&str>, state: &AppState, path: &str) -> Response<Full<Bytes>> {
    let name = match required_name(query) {
        Ok(name) => name,
        Err(message) => return bad_request("GET", path, message),
    };

    let sources = SourceStore::new(&state.config.functions);
    match sources.get(&name).await {
        Ok(code) => detail("GET", path, code),
        Err(SourceError::NotFound) => bad_request("GET", path, &SourceError::NotFound.to_string()),
        Err(e) => internal_error("GET", path, &e),
    }
}

/// GET logs?name=: every captured record of an endpoint
pub async fn logs(query: Option<&str>, state: &AppState, path: &str) -> Response<Full<Bytes>> {
    let name = match required_name(query) {
        Ok(name) => name,
        Err(message) => return bad_request("GET", path, message),
    };

    match state.log_store.read_all(&name).await {
        Ok(logs) => json("GET", path, &LogFile { logs }),
        Err(LogStoreError::NotFound(_)) => bad_request("GET", path, "Logs do not exist"),
        Err(e) => internal_error("GET", path, &e),
    }
}

fn required_name(query: Option<&str>) -> Result<String, &'static str> {
    let name = query_param(query, "name").ok_or("Missing query parameter 'name'")?;
    if is_valid_name(&name) {
        Ok(name)
    } else {
        Err(INVALID_NAME)
    }
}
