use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

mod api;
mod config;
mod functions;
mod handler;
mod http;
mod interceptor;
mod logger;
mod logs;
mod packages;
mod server;

use functions::{DynamicNamespace, FunctionRegistry};
use logs::LogStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional first argument: config file path without extension
    let cfg = match std::env::args().nth(1) {
        Some(path) => config::Config::load_from(&path)?,
        None => config::Config::load()?,
    };
    logger::init(&cfg)?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    let log_store = Arc::new(LogStore::new(&cfg.logs.dir, cfg.logs.serialize_appends));
    let namespace = DynamicNamespace::new(&cfg.functions.route_prefix);
    let registry = FunctionRegistry::discover(&cfg.functions, &namespace, &log_store).await?;
    if registry.is_empty() {
        logger::log_warning(&format!("No handler routes found in '{}'", cfg.functions.dir));
    }

    let listener = server::create_listener(addr)?;
    logger::log_server_start(&addr, &cfg);

    let state = Arc::new(config::AppState::new(cfg, registry, log_store));
    let active_connections = Arc::new(AtomicUsize::new(0));

    // Connections are spawned with spawn_local
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::run_server_loop(listener, state, active_connections))
        .await;
    Ok(())
}
