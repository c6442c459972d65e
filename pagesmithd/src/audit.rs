//! Append-only JSONL audit logs.
//!
//! One log for received tasks, one for received confirmations. Entries
//! are one JSON object per line with an RFC 3339 timestamp; the logs are
//! an audit trail only and are never read back by the daemon. Appends
//! from concurrent requests are serialized through an async mutex so
//! lines never interleave.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// Serialized appender for one JSONL audit file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

#[derive(Serialize)]
struct AuditEntry<'a, T: Serialize> {
    received_at: String,
    #[serde(flatten)]
    body: &'a T,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append one record as a single line. A failed append is logged and
    /// swallowed: the audit trail degrades, the request does not.
    pub async fn append<T: Serialize>(&self, body: &T) {
        if let Err(e) = self.try_append(body).await {
            warn!("audit append to {:?} failed: {}", self.path, e);
        }
    }

    async fn try_append<T: Serialize>(&self, body: &T) -> Result<()> {
        let entry = AuditEntry {
            received_at: Utc::now().to_rfc3339(),
            body,
        };
        let line = serde_json::to_string(&entry)?;

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }
}
