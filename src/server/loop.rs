// Server loop module
// Accepts connections until the listener fails irrecoverably

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Accept loop; must run inside a `LocalSet` since connections use `spawn_local`.
///
/// Accept errors (EMFILE, aborted handshakes) are logged and the loop keeps going.
pub async fn run_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                accept_connection(stream, peer_addr, &state, &active_connections);
            }
            Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::functions::wasm::{default_engine, fixtures};
    use crate::functions::{DynamicNamespace, FunctionRegistry, WasmUnit};
    use crate::logs::LogStore;
    use crate::server::create_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_serves_dynamic_route_over_tcp() {
        let root = tempfile::tempdir().unwrap();
        let mut config = Config::load_from("does-not-exist/config").unwrap();
        config.logs.dir = root.path().join("logs").to_string_lossy().into_owned();
        config.logging.access_log = false;

        let namespace = DynamicNamespace::new(&config.functions.route_prefix);
        let mut registry = FunctionRegistry::default();
        let unit = WasmUnit::load(&default_engine(), "hello", fixtures::HELLO.as_bytes()).unwrap();
        registry.register(&namespace, Arc::new(unit));
        let store = Arc::new(LogStore::new(&config.logs.dir, true));
        let state = Arc::new(AppState::new(config, registry, store));

        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();

        let local = tokio::task::LocalSet::new();
        let reply = local
            .run_until(async move {
                tokio::task::spawn_local(run_server_loop(
                    listener,
                    state,
                    Arc::new(AtomicUsize::new(0)),
                ));

                let mut stream = TcpStream::connect(addr).await.unwrap();
                stream
                    .write_all(b"GET /fn/hello HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                    .await
                    .unwrap();
                let mut reply = String::new();
                stream.read_to_string(&mut reply).await.unwrap();
                reply
            })
            .await;

        assert!(reply.starts_with("HTTP/1.1 200"), "{reply}");
        assert!(reply.ends_with("\"hello\""), "{reply}");
    }
}
