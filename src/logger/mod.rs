//! Logger module
//!
//! Diagnostics go through `tracing`; the subscriber is installed by
//! [`init`] with a filter taken from `RUST_LOG` or `logging.level`.
//! Access log lines are formatted here and written by [`writer`] to
//! stdout or a file, independent of the diagnostic filter.

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use crate::functions::{HandlerError, LoadError, Verb};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Initialize logging with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::AlreadyExists, e.to_string()))?;

    writer::init(config.logging.access_log_file.as_deref())
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!(
        "{} {} listening on http://{addr}",
        config.project.name,
        config.project.version
    );
    tracing::info!("Log level: {}", config.logging.level);
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    if let Some(ref path) = config.logging.access_log_file {
        tracing::info!("Access log: {path}");
    }
    tracing::info!(
        "Handlers under {} mounted at {}",
        config.functions.dir,
        config.functions.route_prefix
    );
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!("[Connection] Accepted from: {peer_addr}");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("Failed to serve connection: {err:?}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_api_error(message: &str) {
    tracing::error!("[API] {message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    writer::write_access(&entry.format(format));
}

pub fn log_api_request(method: &str, path: &str, status: u16) {
    tracing::info!("[API] {method} {path} - {status}");
}

pub fn log_unit_load_failed(name: &str, err: &LoadError) {
    tracing::warn!("[Discovery] Skipping '{name}': {err}");
}

pub fn log_unit_without_capabilities(name: &str) {
    tracing::warn!("[Discovery] '{name}' exports no verb capabilities, not routed");
}

pub fn log_route_bound(verb: Verb, path: &str) {
    tracing::info!("[Discovery] {verb} {path}");
}

pub fn log_discovery_complete(routes: usize) {
    tracing::info!("[Discovery] {routes} route(s) bound");
}

pub fn log_handler_error(endpoint: &str, err: &HandlerError) {
    tracing::error!("[Handler] '{endpoint}' failed: {err}");
}

pub fn log_record_appended(endpoint: &str) {
    tracing::debug!("[Logs] Record appended for '{endpoint}'");
}

pub fn log_package_command(argv: &[String]) {
    tracing::info!("[Packages] Running: {}", argv.join(" "));
}
