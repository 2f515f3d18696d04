//! Access log writer
//!
//! Thread-safe line writer for the access log: stdout by default, or an
//! append-mode file when `logging.access_log_file` is set.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock, PoisonError};

static ACCESS_LOG: OnceLock<AccessLog> = OnceLock::new();

enum AccessLog {
    Stdout,
    File(Mutex<File>),
}

impl AccessLog {
    fn open(path: Option<&str>) -> io::Result<Self> {
        match path {
            Some(path) => Ok(Self::File(Mutex::new(open_log_file(path)?))),
            None => Ok(Self::Stdout),
        }
    }

    fn write_line(&self, line: &str) {
        match self {
            Self::Stdout => println!("{line}"),
            Self::File(file) => {
                let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
                if let Err(e) = writeln!(file, "{line}") {
                    tracing::error!("Failed to write access log: {e}");
                }
            }
        }
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize the access log target
///
/// Returns error if the file cannot be opened or init already ran.
pub fn init(access_log_file: Option<&str>) -> io::Result<()> {
    let target = AccessLog::open(access_log_file)?;
    ACCESS_LOG.set(target).map_err(|_| {
        io::Error::new(io::ErrorKind::AlreadyExists, "Access log already initialized")
    })
}

/// Write one access log line; before `init` it goes to stdout
pub fn write_access(line: &str) {
    match ACCESS_LOG.get() {
        Some(target) => target.write_line(line),
        None => println!("{line}"),
    }
}
