// Admin API request/response types

use serde::{Deserialize, Serialize};

use crate::packages::LATEST;

/// Body of create and update calls
#[derive(Debug, Deserialize)]
pub struct FunctionSource {
    pub name: String,
    pub code: String,
}

/// Body of delete calls
#[derive(Debug, Deserialize)]
pub struct FunctionName {
    pub name: String,
}

/// Body of package install calls
#[derive(Debug, Deserialize)]
pub struct InstallPackage {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_version() -> String {
    LATEST.to_string()
}

/// `{"detail": ...}` envelope used by every admin reply
#[derive(Debug, Serialize)]
pub struct Detail<T: Serialize> {
    pub detail: T,
}
