//! Per-endpoint log store
//!
//! Each endpoint owns one JSON file `<dir>/<name>.json` holding
//! `{"logs": [...]}`. Appends are a full read-modify-write of that file.
//!
//! Files are replaced atomically (temp file, then rename), so readers never
//! see a partially written file and a crash mid-write leaves the previous
//! contents intact.
//!
//! With `serialize_appends` enabled every operation on an existing
//! endpoint's file holds that endpoint's lock for its whole span, so
//! overlapping appends never lose records and a delete cannot be undone by
//! an append that was already in flight. With it disabled, overlapping
//! appends are last-writer-wins and records may be lost.

mod record;

pub use record::{LogFile, LogRecord, RequestSnapshot, ResponseSnapshot};

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Log store error
#[derive(Debug, thiserror::Error)]
pub enum LogStoreError {
    #[error("log file for '{0}' does not exist")]
    NotFound(String),
    #[error("log file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("log file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// File-backed log store keyed by endpoint name
pub struct LogStore {
    dir: PathBuf,
    serialize_appends: bool,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    /// Suffix source for temp files
    writes: AtomicU64,
}

impl LogStore {
    pub fn new(dir: impl Into<PathBuf>, serialize_appends: bool) -> Self {
        Self {
            dir: dir.into(),
            serialize_appends,
            locks: Mutex::new(HashMap::new()),
            writes: AtomicU64::new(0),
        }
    }

    /// Path of the log file for `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Create the storage directory if needed
    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Create `{"logs": []}` for `name` unless a file already exists.
    ///
    /// Returns `true` when a new file was written.
    pub async fn initialize(&self, name: &str) -> Result<bool, LogStoreError> {
        let _guard = self.lock(name).await;
        let path = self.path_for(name);
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        self.ensure_dir().await?;
        self.write_log_file(&path, &LogFile::default()).await?;
        Ok(true)
    }

    /// Append one record. A missing target is a silent no-op.
    ///
    /// Returns `true` when the record was written.
    pub async fn append(&self, name: &str, record: LogRecord) -> Result<bool, LogStoreError> {
        let path = self.path_for(name);
        // Unknown keys come from arbitrary request paths; they get no lock entry
        if !tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        let _guard = self.lock(name).await;

        let mut file = match read_log_file(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(LogStoreError::Io(e)),
        }?;

        file.logs.push(record);
        self.write_log_file(&path, &file).await?;
        Ok(true)
    }

    /// All records in persisted order
    pub async fn read_all(&self, name: &str) -> Result<Vec<LogRecord>, LogStoreError> {
        let path = self.path_for(name);
        if !tokio::fs::try_exists(&path).await? {
            return Err(LogStoreError::NotFound(name.to_string()));
        }
        let _guard = self.lock(name).await;
        match read_log_file(&path).await {
            Ok(file) => Ok(file?.logs),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(LogStoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(LogStoreError::Io(e)),
        }
    }

    /// Remove the log file; absence is not an error
    pub async fn delete(&self, name: &str) -> Result<(), LogStoreError> {
        let _guard = self.lock(name).await;
        match tokio::fs::remove_file(self.path_for(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LogStoreError::Io(e)),
        }
    }

    /// Acquire the per-endpoint lock, if serialization is enabled
    async fn lock(&self, name: &str) -> Option<OwnedMutexGuard<()>> {
        if !self.serialize_appends {
            return None;
        }
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(name.to_string()).or_default())
        };
        Some(lock.lock_owned().await)
    }

    /// Write `<name>.json.<n>.tmp` next to the target, then rename it over
    async fn write_log_file(&self, path: &Path, file: &LogFile) -> Result<(), LogStoreError> {
        let json = serde_json::to_vec_pretty(file)?;
        let n = self.writes.fetch_add(1, Ordering::Relaxed);
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{n}.tmp"));
        let tmp = PathBuf::from(tmp);

        if let Err(e) = tokio::fs::write(&tmp, json).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// Outer error is I/O (NotFound distinguishable), inner is decoding
async fn read_log_file(path: &Path) -> io::Result<Result<LogFile, LogStoreError>> {
    let content = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&content).map_err(LogStoreError::from))
}
