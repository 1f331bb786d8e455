//! File-backed `AuditRecorder`: one JSON object per line, UTF-8,
//! newline-terminated. Rotation (size, backup count, max-age, compress) is
//! left to an external log-rotation collaborator (e.g. `logrotate`) —
//! this writer only appends.
//!
//! Fails open: a recording failure here downgrades to the fallback logger
//! and is swallowed, never propagated to the request path.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use supervisor_common::{AuditLogEntry, AuditRecorder};
use tracing::{error, warn};

/// Appends one JSON line per `record` call to a file, serialized behind a
/// mutex so concurrent writers never interleave partial lines.
pub struct AuditLogger {
    path: PathBuf,
    file: Mutex<std::fs::File>,
    fallback: Option<Arc<dyn AuditRecorder>>,
}

impl AuditLogger {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            fallback: None,
        })
    }

    /// Same as `open`, but recording failures are forwarded to `fallback`
    /// instead of only being logged through `tracing`.
    pub fn with_fallback(path: impl AsRef<Path>, fallback: Arc<dyn AuditRecorder>) -> std::io::Result<Self> {
        let mut logger = Self::open(path)?;
        logger.fallback = Some(fallback);
        Ok(logger)
    }
}

impl AuditRecorder for AuditLogger {
    fn record(&self, entry: AuditLogEntry) {
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(err) => {
                error!(error = %err, "failed to serialize audit log entry, dropping");
                return;
            }
        };

        let write_result = {
            let mut file = self.file.lock();
            writeln!(file, "{line}")
        };

        if let Err(err) = write_result {
            warn!(error = %err, path = %self.path.display(), "audit log write failed, downgrading to fallback");
            if let Some(fallback) = &self.fallback {
                fallback.record(entry);
            }
        }
    }
}
