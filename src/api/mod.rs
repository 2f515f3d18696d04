// API module entry
// Administrative surface: handler sources, their logs, and packages

mod functions;
mod packages;
mod response;
mod types;

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::HeaderMap;
use hyper::{Method, Request, Response};
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::sync::Arc;

use crate::config::AppState;

const FUNCTIONS_PREFIX: &str = "/functions-management";
const PACKAGES_PREFIX: &str = "/packages";
const API_KEY_HEADER: &str = "x-api-key";

/// Whether `path` belongs to the administrative surface
pub fn is_admin_path(path: &str) -> bool {
    [FUNCTIONS_PREFIX, PACKAGES_PREFIX].iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Admin route handler
///
/// The API key is checked before anything else, so a rejected call never
/// touches the filesystem or spawns a command.
pub async fn handle_admin<B>(req: Request<B>, state: Arc<AppState>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(ToString::to_string);
    let method = req.method().clone();

    if !is_authorized(req.headers(), &state.config.admin.secret_key) {
        return response::unauthorized(method.as_str(), &path);
    }

    let query = query.as_deref();
    match (method, path.as_str()) {
        (Method::POST, "/functions-management/create") => {
            functions::create(req, &state, &path).await
        }
        (Method::POST, "/functions-management/update") => {
            functions::update(req, &state, &path).await
        }
        (Method::POST, "/functions-management/delete") => {
            functions::delete(req, &state, &path).await
        }
        (Method::GET, "/functions-management/list") => functions::list(&state, &path).await,
        (Method::GET, "/functions-management/get") => functions::get(query, &state, &path).await,
        (Method::GET, "/functions-management/logs") => {
            functions::logs(query, &state, &path).await
        }
        (Method::POST, "/packages/install") => packages::install(req, &state, &path).await,
        (Method::POST, "/packages/remove") => packages::remove(query, &state, &path).await,
        (Method::GET, "/packages/list") => packages::list(&state, &path).await,
        (method, _) => response::not_found(method.as_str(), &path),
    }
}

fn is_authorized(headers: &HeaderMap, secret_key: &str) -> bool {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| key == secret_key)
}

/// Collect the body and parse it as JSON; the error is the 400 message
async fn read_json<B, T>(req: Request<B>) -> Result<T, String>
where
    B: Body,
    B::Error: Display,
    T: DeserializeOwned,
{
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| format!("Failed to read request body: {e}"))?
        .to_bytes();
    serde_json::from_slice(&body).map_err(|e| format!("Invalid JSON: {e}"))
}

fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::functions::wasm::fixtures;
    use crate::functions::FunctionRegistry;
    use crate::logs::{LogRecord, LogStore, RequestSnapshot, ResponseSnapshot};
    use hyper::StatusCode;
    use serde_json::Value;
    use std::path::Path;

    const KEY: &str = "test-key";

    fn state(root: &Path) -> Arc<AppState> {
        let mut config = Config::load_from("does-not-exist/config").unwrap();
        config.functions.dir = root.join("functions").to_string_lossy().into_owned();
        config.logs.dir = root.join("logs").to_string_lossy().into_owned();
        config.admin.secret_key = KEY.to_string();
        config.packages.manifest = root.join("functions/Cargo.toml").to_string_lossy().into_owned();
        config.packages.install_command =
            ["echo", "installed", "{spec}"].iter().map(ToString::to_string).collect();
        config.packages.remove_command =
            ["echo", "removed", "{name}"].iter().map(ToString::to_string).collect();
        std::fs::create_dir_all(root.join("functions")).unwrap();
        std::fs::create_dir_all(root.join("logs")).unwrap();

        let store = Arc::new(LogStore::new(&config.logs.dir, true));
        Arc::new(AppState::new(config, FunctionRegistry::default(), store))
    }

    fn request(method: Method, uri: &str, key: Option<&str>, body: &str) -> Request<Full<Bytes>> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Full::new(Bytes::from(body.to_string()))).unwrap()
    }

    async fn call(
        state: &Arc<AppState>,
        method: Method,
        uri: &str,
        body: &str,
    ) -> (StatusCode, Value) {
        let resp = handle_admin(request(method, uri, Some(KEY), body), Arc::clone(state)).await;
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn create_body(name: &str) -> String {
        serde_json::json!({ "name": name, "code": fixtures::HELLO }).to_string()
    }

    #[test]
    fn test_is_admin_path() {
        assert!(is_admin_path("/functions-management/list"));
        assert!(is_admin_path("/packages/install"));
        assert!(is_admin_path("/packages"));
        assert!(!is_admin_path("/packagesx"));
        assert!(!is_admin_path("/fn/hello"));
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param(Some("a=1&name=hi%20there"), "name").as_deref(), Some("hi there"));
        assert_eq!(query_param(Some("a=1"), "name"), None);
        assert_eq!(query_param(None, "name"), None);
    }

    #[tokio::test]
    async fn test_every_route_rejects_bad_key_without_side_effects() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());
        let routes = [
            (Method::POST, "/functions-management/create", create_body("x")),
            (Method::POST, "/functions-management/update", create_body("x")),
            (Method::POST, "/functions-management/delete", r#"{"name":"x"}"#.to_string()),
            (Method::GET, "/functions-management/list", String::new()),
            (Method::GET, "/functions-management/get?name=x", String::new()),
            (Method::GET, "/functions-management/logs?name=x", String::new()),
            (Method::POST, "/packages/install", r#"{"name":"serde"}"#.to_string()),
            (Method::POST, "/packages/remove?name=serde", String::new()),
            (Method::GET, "/packages/list", String::new()),
            (Method::GET, "/packages/unknown", String::new()),
        ];

        for key in [None, Some("wrong")] {
            for (method, uri, body) in &routes {
                let resp =
                    handle_admin(request(method.clone(), uri, key, body), Arc::clone(&state)).await;
                assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
                let bytes = resp.into_body().collect().await.unwrap().to_bytes();
                let body: Value = serde_json::from_slice(&bytes).unwrap();
                assert_eq!(body["detail"], "invalid api key");
            }
        }

        assert!(!root.path().join("functions/x.wat").exists());
        assert!(!root.path().join("logs/x.json").exists());
    }

    #[tokio::test]
    async fn test_create_rolls_back_source_when_log_init_fails() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());
        // A plain file where the log directory should be
        std::fs::remove_dir_all(root.path().join("logs")).unwrap();
        std::fs::write(root.path().join("logs"), "not a directory").unwrap();

        let (status, _) =
            call(&state, Method::POST, "/functions-management/create", &create_body("hello")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!root.path().join("functions/hello.wat").exists());

        // Once the log directory is usable the same name can be created
        std::fs::remove_file(root.path().join("logs")).unwrap();
        let (status, body) =
            call(&state, Method::POST, "/functions-management/create", &create_body("hello")).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(root.path().join("functions/hello.wat").exists());
        assert!(root.path().join("logs/hello.json").exists());
    }

    #[tokio::test]
    async fn test_function_lifecycle() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());

        let (status, body) =
            call(&state, Method::POST, "/functions-management/create", &create_body("hello")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["detail"], "Function has been created");
        assert!(root.path().join("logs/hello.json").exists());

        let (status, body) =
            call(&state, Method::POST, "/functions-management/create", &create_body("hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Function already exists");

        let (_, body) = call(&state, Method::GET, "/functions-management/list", "").await;
        assert_eq!(body, serde_json::json!(["hello"]));

        let (status, body) =
            call(&state, Method::GET, "/functions-management/get?name=hello", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["detail"], fixtures::HELLO);

        let update = serde_json::json!({ "name": "hello", "code": fixtures::ECHO }).to_string();
        let (status, _) = call(&state, Method::POST, "/functions-management/update", &update).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&state, Method::GET, "/functions-management/get?name=hello", "").await;
        assert_eq!(body["detail"], fixtures::ECHO);

        let (status, body) =
            call(&state, Method::POST, "/functions-management/delete", r#"{"name":"hello"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["detail"], "Function has been deleted");
        assert!(!root.path().join("logs/hello.json").exists());

        // Deleting again still succeeds
        let (status, _) =
            call(&state, Method::POST, "/functions-management/delete", r#"{"name":"hello"}"#).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            call(&state, Method::GET, "/functions-management/get?name=hello", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Function does not exist");
    }

    #[tokio::test]
    async fn test_update_missing_and_bad_input() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());

        let (status, body) =
            call(&state, Method::POST, "/functions-management/update", &create_body("ghost")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Function does not exist");

        let (status, body) = call(&state, Method::POST, "/functions-management/create", "{").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().starts_with("Invalid JSON"));

        let (status, body) =
            call(&state, Method::POST, "/functions-management/create", &create_body("../etc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Invalid function name");

        let (status, _) = call(&state, Method::GET, "/functions-management/get", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&state, Method::GET, "/functions-management/nope", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logs_endpoint() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());

        let (status, body) =
            call(&state, Method::GET, "/functions-management/logs?name=hello", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Logs do not exist");

        state.log_store.initialize("hello").await.unwrap();
        let record = LogRecord::now(
            "GET",
            RequestSnapshot::default(),
            ResponseSnapshot {
                status_code: 200,
                data: "\"hello\"".to_string(),
                ..ResponseSnapshot::default()
            },
        );
        state.log_store.append("hello", record).await.unwrap();

        let (status, body) =
            call(&state, Method::GET, "/functions-management/logs?name=hello", "").await;
        assert_eq!(status, StatusCode::OK);
        let logs = body["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["method"], "GET");
        assert_eq!(logs[0]["response"]["status_code"], 200);
    }

    #[tokio::test]
    async fn test_package_routes() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());
        std::fs::write(
            root.path().join("functions/Cargo.toml"),
            "[package]\nname = \"handlers\"\n\n[dependencies]\nserde = \"1\"\n",
        )
        .unwrap();

        let (status, body) = call(&state, Method::GET, "/packages/list", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["serde"], "1");

        if cfg!(unix) {
            let (status, body) =
                call(&state, Method::POST, "/packages/install", r#"{"name":"regex","version":"1.10"}"#)
                    .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "installed regex@1.10\n");

            let (status, body) =
                call(&state, Method::POST, "/packages/remove?name=regex", "").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "removed regex\n");
        }

        let (status, _) = call(&state, Method::POST, "/packages/remove", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
