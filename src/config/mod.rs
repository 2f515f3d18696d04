// Configuration module entry point
// Loads layered configuration and owns the shared application state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    AdminConfig, Config, FunctionsConfig, HealthConfig, HttpConfig, LoggingConfig, LogsConfig,
    PackagesConfig, PerformanceConfig, ProjectConfig, ServerConfig,
};

/// Default config file (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from the default "config.toml"
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// The file is optional; `FNSERVE__SECTION__KEY` environment variables
    /// override file values, and every key has a default.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("FNSERVE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_default("project.name", "Serverless")?
            .set_default(
                "project.description",
                "A serverless server that exposes handler units as HTTP endpoints.",
            )?
            .set_default("project.version", env!("CARGO_PKG_VERSION"))?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "fnserve")?
            .set_default("http.enable_cors", true)?
            .set_default("http.cors_origin", "*")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("http.docs_path", "/docs")?
            .set_default("functions.dir", "functions")?
            .set_default("functions.extension", "wat")?
            .set_default("functions.route_prefix", "/fn")?
            .set_default("logs.dir", "logs")?
            .set_default("logs.serialize_appends", true)?
            .set_default("admin.secret_key", "secret")?
            .set_default("packages.manifest", "functions/Cargo.toml")?
            .set_default(
                "packages.install_command",
                vec!["cargo", "add", "--manifest-path", "{manifest}", "{spec}"],
            )?
            .set_default(
                "packages.remove_command",
                vec!["cargo", "remove", "--manifest-path", "{manifest}", "{name}"],
            )?
            .set_default("packages.reserved", Vec::<String>::new())?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
