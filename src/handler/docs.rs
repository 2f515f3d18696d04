//! Service description endpoint

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::config::{AppState, ProjectConfig};
use crate::functions::RouteBinding;
use crate::http;

#[derive(Serialize)]
struct Docs<'a> {
    #[serde(flatten)]
    project: &'a ProjectConfig,
    routes: &'a [RouteBinding],
}

/// Project metadata and every dynamic route binding
pub fn serve_docs(state: &AppState) -> Response<Full<Bytes>> {
    let docs = Docs {
        project: &state.config.project,
        routes: state.registry.bindings(),
    };
    http::build_json_response(StatusCode::OK, &docs)
}
