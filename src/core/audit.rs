//! Append-only audit logging.
//!
//! One JSON object per line, fsynced before the writer returns. Readers
//! open their own handle so tailing never interferes with writes.
//! Secret values must never appear in an entry; callers log names, lease
//! ids, and captured hook output only.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::AuditAction;
use crate::error::Result;

/// A single audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub success: bool,
}

impl AuditEntry {
    /// Start an entry stamped with the current time.
    pub fn new(action: AuditAction, success: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            namespace: None,
            secret_name: None,
            client_id: None,
            lease_id: None,
            details: None,
            success,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn secret(mut self, name: impl Into<String>) -> Self {
        self.secret_name = Some(name.into());
        self
    }

    pub fn client(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    pub fn lease(mut self, id: impl Into<String>) -> Self {
        self.lease_id = Some(id.into());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Filter predicates for [`AuditLogger::query`].
#[derive(Debug, Default, Clone)]
pub struct QueryFilter {
    pub action: Option<AuditAction>,
    pub secret_name: Option<String>,
    pub namespace: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl QueryFilter {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        if let Some(name) = &self.secret_name {
            if entry.secret_name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(namespace) = &self.namespace {
            if entry.namespace.as_deref() != Some(namespace.as_str()) {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if entry.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if entry.timestamp > end {
                return false;
            }
        }
        true
    }
}

/// Thread-safe append-only audit logger.
pub struct AuditLogger {
    file: Mutex<File>,
    path: PathBuf,
}

impl AuditLogger {
    /// Open (or create) the log at `path` in append mode with 0600.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(crate::core::fsio::SECURE_FILE_MODE);
        }
        let file = options.open(path)?;

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Append one entry and fsync before returning.
    pub fn log(&self, entry: &AuditEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)
            .map_err(|e| crate::error::Error::Other(format!("audit encode: {e}")))?;
        line.push(b'\n');

        let mut file = self.file.lock().expect("audit writer lock poisoned");
        file.write_all(&line)?;
        file.sync_all()?;
        Ok(())
    }

    /// Last `n` entries in write order. Malformed lines are skipped.
    pub fn tail(&self, n: usize) -> Result<Vec<AuditEntry>> {
        let mut entries = self.read_all()?;
        if entries.len() > n {
            entries.drain(..entries.len() - n);
        }
        Ok(entries)
    }

    /// All entries matching `filter`, in write order.
    pub fn query(&self, filter: &QueryFilter) -> Result<Vec<AuditEntry>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect())
    }

    fn read_all(&self) -> Result<Vec<AuditEntry>> {
        // Fresh handle: readers never touch the append-mode writer.
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(_) => continue,
            }
        }
        Ok(entries)
    }
}
