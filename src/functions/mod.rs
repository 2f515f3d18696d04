//! Function registry
//!
//! Scans the handler directory once at startup, loads every unit and binds
//! each exported capability to `<prefix>/<name>`. The resulting table is
//! frozen: nothing is added, removed or replaced after discovery.

pub mod sources;
mod unit;
pub mod wasm;

pub use sources::{is_valid_name, SourceError, SourceStore};
pub use unit::{HandlerError, HandlerRequest, HandlerResponse, HandlerUnit, Verb};
pub use wasm::{LoadError, WasmUnit};

use hyper::Method;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::FunctionsConfig;
use crate::logger;
use crate::logs::LogStore;

/// Path namespace holding dynamic endpoints
#[derive(Debug, Clone)]
pub struct DynamicNamespace {
    prefix: String,
}

impl DynamicNamespace {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Route path for an endpoint
    pub fn route_path(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.prefix)
    }

    /// Log key for `path` when it falls under the namespace
    ///
    /// The key is the final path segment after the prefix.
    pub fn endpoint_for<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?.strip_prefix('/')?;
        if rest.is_empty() {
            return None;
        }
        rest.rsplit('/').next().filter(|segment| !segment.is_empty())
    }
}

/// One (path, verb) to capability binding
#[derive(Clone, Serialize)]
pub struct RouteBinding {
    pub endpoint: String,
    pub path: String,
    #[serde(rename = "method")]
    pub verb: Verb,
    #[serde(skip)]
    pub unit: Arc<dyn HandlerUnit>,
}

impl RouteBinding {
    pub fn invoke(&self, request: &HandlerRequest) -> Result<HandlerResponse, HandlerError> {
        self.unit.invoke(self.verb, request)
    }
}

/// Read-only route table
#[derive(Default)]
pub struct FunctionRegistry {
    bindings: Vec<RouteBinding>,
    index: HashMap<(String, Verb), usize>,
}

impl FunctionRegistry {
    /// Scan `config.dir` and build the route table.
    ///
    /// Units that fail to load are logged and contribute no routes. Every
    /// unit that yields at least one binding gets an empty log file unless
    /// one already exists.
    pub async fn discover(
        config: &FunctionsConfig,
        namespace: &DynamicNamespace,
        log_store: &LogStore,
    ) -> std::io::Result<Self> {
        let dir = Path::new(&config.dir);
        tokio::fs::create_dir_all(dir).await?;
        log_store.ensure_dir().await?;

        let engine = wasm::default_engine();
        let mut registry = Self::default();

        for (name, path) in list_units(dir, &config.extension).await? {
            let unit = match load_unit(&engine, &name, &path).await {
                Ok(unit) => unit,
                Err(e) => {
                    logger::log_unit_load_failed(&name, &e);
                    continue;
                }
            };

            if unit.verbs().is_empty() {
                logger::log_unit_without_capabilities(&name);
                continue;
            }

            registry.register(namespace, Arc::new(unit));
            if let Err(e) = log_store.initialize(&name).await {
                logger::log_error(&format!("Failed to initialize log file for '{name}': {e}"));
            }
        }

        logger::log_discovery_complete(registry.bindings.len());
        Ok(registry)
    }

    /// Bind every capability of `unit`
    pub fn register(&mut self, namespace: &DynamicNamespace, unit: Arc<dyn HandlerUnit>) {
        let path = namespace.route_path(unit.name());
        for &verb in unit.verbs() {
            let key = (path.clone(), verb);
            if self.index.contains_key(&key) {
                logger::log_warning(&format!("Duplicate route {verb} {path} ignored"));
                continue;
            }
            logger::log_route_bound(verb, &path);
            self.index.insert(key, self.bindings.len());
            self.bindings.push(RouteBinding {
                endpoint: unit.name().to_string(),
                path: path.clone(),
                verb,
                unit: Arc::clone(&unit),
            });
        }
    }

    pub fn binding(&self, path: &str, method: &Method) -> Option<&RouteBinding> {
        let verb = Verb::from_method(method)?;
        self.index
            .get(&(path.to_string(), verb))
            .map(|&i| &self.bindings[i])
    }

    /// Verbs bound at `path`, in binding order
    pub fn allowed_methods(&self, path: &str) -> Vec<Verb> {
        self.bindings
            .iter()
            .filter(|b| b.path == path)
            .map(|b| b.verb)
            .collect()
    }

    pub fn bindings(&self) -> &[RouteBinding] {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Candidate units in `dir` (non-recursive), sorted by file name.
/// Stems starting with `_` are reserved and skipped.
async fn list_units(dir: &Path, extension: &str) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut units = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.starts_with('_') {
            continue;
        }
        units.push((stem.to_string(), path));
    }
    units.sort();
    Ok(units)
}

async fn load_unit(
    engine: &wasmer::Engine,
    name: &str,
    path: &Path,
) -> Result<WasmUnit, LoadError> {
    let source = tokio::fs::read(path).await?;
    WasmUnit::load(engine, name, &source)
}
