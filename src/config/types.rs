// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub health: HealthConfig,
    pub functions: FunctionsConfig,
    pub logs: LogsConfig,
    pub admin: AdminConfig,
    pub packages: PackagesConfig,
}

/// Project metadata reported by the docs endpoint
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProjectConfig {
    pub name: String,
    pub description: String,
    pub version: String,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub cors_origin: String,
    pub max_body_size: u64,
    pub docs_path: String,
}

/// Health check configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HealthConfig {
    /// Enable health check endpoints
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    /// Liveness probe path (default: /healthz)
    #[serde(default = "default_healthz_path")]
    pub liveness_path: String,
    /// Readiness probe path (default: /readyz)
    #[serde(default = "default_readyz_path")]
    pub readiness_path: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_health_enabled() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_healthz_path() -> String {
    "/healthz".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_readyz_path() -> String {
    "/readyz".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            liveness_path: default_healthz_path(),
            readiness_path: default_readyz_path(),
        }
    }
}

/// Handler unit discovery configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FunctionsConfig {
    /// Directory scanned once at startup
    pub dir: String,
    /// File extension of handler units (without the dot)
    pub extension: String,
    /// Path prefix of the dynamic namespace, e.g. "/fn"; empty for "/<name>"
    pub route_prefix: String,
}

/// Per-endpoint log store configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogsConfig {
    pub dir: String,
    /// Hold a per-endpoint lock across each read-modify-write
    pub serialize_appends: bool,
}

/// Admin surface configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    pub secret_key: String,
}

/// External dependency manager configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PackagesConfig {
    /// Manifest the dependency manager operates on
    pub manifest: String,
    /// argv template; supports {name}, {version}, {spec} and {manifest}
    pub install_command: Vec<String>,
    pub remove_command: Vec<String>,
    /// Dependencies hidden from the package listing
    #[serde(default)]
    pub reserved: Vec<String>,
}
