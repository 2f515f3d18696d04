// Application state module
// Everything a request needs, shared read-only across connections

use std::sync::Arc;

use super::types::Config;
use crate::functions::{DynamicNamespace, FunctionRegistry};
use crate::logs::LogStore;
use crate::packages::PackageManager;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Route table, frozen after discovery
    pub registry: Arc<FunctionRegistry>,
    pub log_store: Arc<LogStore>,
    pub packages: PackageManager,
    pub namespace: DynamicNamespace,
}

impl AppState {
    pub fn new(config: Config, registry: FunctionRegistry, log_store: Arc<LogStore>) -> Self {
        let packages = PackageManager::new(&config.packages);
        let namespace = DynamicNamespace::new(&config.functions.route_prefix);

        Self {
            config,
            registry: Arc::new(registry),
            log_store,
            packages,
            namespace,
        }
    }
}
