//! Handler unit source files
//!
//! Plain file CRUD under the handler directory, used by the admin surface.
//! Changes are picked up by discovery on the next start.

use std::io;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::config::FunctionsConfig;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Function already exists")]
    AlreadyExists,
    #[error("Function does not exist")]
    NotFound,
    #[error("handler source I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Source files of handler units, one `<name>.<extension>` per endpoint
#[derive(Debug, Clone)]
pub struct SourceStore {
    dir: PathBuf,
    extension: String,
}

impl SourceStore {
    pub fn new(config: &FunctionsConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.dir),
            extension: config.extension.clone(),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{}", self.extension))
    }

    /// Write a new source file; fails if one already exists
    pub async fn create(&self, name: &str, code: &str) -> Result<(), SourceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_for(name))
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SourceError::AlreadyExists)
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(code.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Overwrite an existing source file
    pub async fn update(&self, name: &str, code: &str) -> Result<(), SourceError> {
        let path = self.path_for(name);
        if !tokio::fs::try_exists(&path).await? {
            return Err(SourceError::NotFound);
        }
        tokio::fs::write(path, code).await?;
        Ok(())
    }

    /// Remove a source file; returns whether one was removed
    pub async fn delete(&self, name: &str) -> Result<bool, SourceError> {
        match tokio::fs::remove_file(self.path_for(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, name: &str) -> Result<String, SourceError> {
        match tokio::fs::read_to_string(self.path_for(name)).await {
            Ok(code) => Ok(code),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SourceError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Endpoint names, sorted; reserved `_` units are not listed
    pub async fn list(&self) -> Result<Vec<String>, SourceError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str())
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('_') {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Endpoint names are path segments and file stems: `[A-Za-z0-9_-]+`,
/// not starting with the reserved `_`
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('_')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> SourceStore {
        SourceStore::new(&FunctionsConfig {
            dir: dir.path().join("functions").to_string_lossy().into_owned(),
            extension: "wat".to_string(),
            route_prefix: "/fn".to_string(),
        })
    }

    #[tokio::test]
    async fn test_create_update_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sources = store(&dir);

        sources.create("hello", "(module)").await.unwrap();
        assert_eq!(sources.get("hello").await.unwrap(), "(module)");

        sources.update("hello", "(module (memory 1))").await.unwrap();
        assert_eq!(sources.get("hello").await.unwrap(), "(module (memory 1))");

        assert!(sources.delete("hello").await.unwrap());
        assert!(matches!(sources.get("hello").await, Err(SourceError::NotFound)));
        assert!(!sources.delete("hello").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_conflict_and_update_missing() {
        let dir = tempfile::tempdir().unwrap();
        let sources = store(&dir);

        sources.create("hello", "a").await.unwrap();
        assert!(matches!(
            sources.create("hello", "b").await,
            Err(SourceError::AlreadyExists)
        ));
        assert_eq!(sources.get("hello").await.unwrap(), "a");
        assert!(matches!(
            sources.update("other", "b").await,
            Err(SourceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_skips_reserved_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let sources = store(&dir);
        assert!(sources.list().await.unwrap().is_empty());

        sources.create("zeta", "").await.unwrap();
        sources.create("alpha", "").await.unwrap();
        std::fs::write(dir.path().join("functions/_init.wat"), "").unwrap();
        std::fs::write(dir.path().join("functions/readme.md"), "").unwrap();

        assert_eq!(sources.list().await.unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("hello"));
        assert!(is_valid_name("hello-world_2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("_init"));
        assert!(!is_valid_name("../etc"));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name("a.b"));
    }
}
