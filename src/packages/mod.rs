//! Third-party package management
//!
//! A pass-through to an external dependency manager. The argv templates
//! come from configuration; placeholders `{name}`, `{version}`, `{spec}`
//! and `{manifest}` are substituted per call. The raw stdout of the tool is
//! returned to the caller unchanged.

use std::path::PathBuf;
use tokio::process::Command;

use crate::config::PackagesConfig;
use crate::logger;

/// Version keyword meaning "let the tool pick"
pub const LATEST: &str = "latest";

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("package command is empty")]
    EmptyCommand,
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("failed to read manifest: {0}")]
    Manifest(#[from] std::io::Error),
    #[error("manifest is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

pub struct PackageManager {
    manifest: PathBuf,
    install_command: Vec<String>,
    remove_command: Vec<String>,
    reserved: Vec<String>,
}

impl PackageManager {
    pub fn new(config: &PackagesConfig) -> Self {
        Self {
            manifest: PathBuf::from(&config.manifest),
            install_command: config.install_command.clone(),
            remove_command: config.remove_command.clone(),
            reserved: config.reserved.clone(),
        }
    }

    /// Install `name` at `version` ("latest" leaves the choice to the tool)
    pub async fn install(&self, name: &str, version: &str) -> Result<String, PackageError> {
        let argv = self.render(&self.install_command, name, version);
        self.run(argv).await
    }

    pub async fn remove(&self, name: &str) -> Result<String, PackageError> {
        let argv = self.render(&self.remove_command, name, LATEST);
        self.run(argv).await
    }

    /// Declared dependencies, minus reserved ones. A missing manifest lists nothing.
    pub async fn list(&self) -> Result<toml::Table, PackageError> {
        let content = match tokio::fs::read_to_string(&self.manifest).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(toml::Table::new()),
            Err(e) => return Err(e.into()),
        };
        let manifest: toml::Table = content.parse()?;
        let Some(toml::Value::Table(dependencies)) = manifest.get("dependencies") else {
            return Ok(toml::Table::new());
        };

        Ok(dependencies
            .iter()
            .filter(|(name, _)| !self.reserved.contains(name))
            .map(|(name, spec)| (name.clone(), spec.clone()))
            .collect())
    }

    fn render(&self, template: &[String], name: &str, version: &str) -> Vec<String> {
        let spec = if version == LATEST {
            name.to_string()
        } else {
            format!("{name}@{version}")
        };
        let manifest = self.manifest.to_string_lossy();
        template
            .iter()
            .map(|arg| {
                arg.replace("{manifest}", &manifest)
                    .replace("{spec}", &spec)
                    .replace("{name}", name)
                    .replace("{version}", version)
            })
            .collect()
    }

    async fn run(&self, argv: Vec<String>) -> Result<String, PackageError> {
        let (program, args) = argv.split_first().ok_or(PackageError::EmptyCommand)?;
        logger::log_package_command(&argv);

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| PackageError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            logger::log_warning(&format!(
                "'{}' exited with {}: {}",
                argv.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
