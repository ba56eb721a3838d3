use crate::{AuditError, AuditResult, LogSeverity, PaymentLogEntry, PAYMENT_LOG_VERSION};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[async_trait]
pub trait PaymentLogSink: Send + Sync {
    async fn write(&self, entry: &PaymentLogEntry) -> AuditResult<()>;
}

/// Drops everything. Used when no log path is configured.
pub struct NoopLogSink;

#[async_trait]
impl PaymentLogSink for NoopLogSink {
    async fn write(&self, _entry: &PaymentLogEntry) -> AuditResult<()> {
        Ok(())
    }
}

/// Keeps entries in memory so tests can assert on them.
#[derive(Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<PaymentLogEntry>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<PaymentLogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl PaymentLogSink for MemoryLogSink {
    async fn write(&self, entry: &PaymentLogEntry) -> AuditResult<()> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }
}

/// Appends one JSON document per line. Writers are serialized so lines never interleave.
pub struct JsonLinesFileSink {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonLinesFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), guard: Mutex::new(()) }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl PaymentLogSink for JsonLinesFileSink {
    async fn write(&self, entry: &PaymentLogEntry) -> AuditResult<()> {
        let mut line = serde_json::to_vec(entry).map_err(|e| AuditError::Serialization(e.to_string()))?;
        line.push(b'\n');
        let _held = self.guard.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AuditError::Io(e.to_string()))?;
        file.write_all(&line).await.map_err(|e| AuditError::Io(e.to_string()))?;
        file.flush().await.map_err(|e| AuditError::Io(e.to_string()))
    }
}

#[derive(Clone)]
pub struct PaymentLogger {
    sink: Arc<dyn PaymentLogSink>,
    source_service: String,
}

impl PaymentLogger {
    pub fn new(sink: Arc<dyn PaymentLogSink>, source_service: &str) -> Self {
        Self { sink, source_service: source_service.to_string() }
    }

    pub fn noop(source_service: &str) -> Self {
        Self::new(Arc::new(NoopLogSink), source_service)
    }

    pub async fn record(
        &self,
        category: impl Into<String>,
        message: impl Into<String>,
        severity: LogSeverity,
        context: serde_json::Value,
    ) -> AuditResult<PaymentLogEntry> {
        let entry = PaymentLogEntry {
            entry_id: Uuid::new_v4(),
            entry_version: PAYMENT_LOG_VERSION,
            category: category.into(),
            message: message.into(),
            severity,
            source_service: self.source_service.clone(),
            recorded_at: Utc::now(),
            context,
        };
        self.sink.write(&entry).await?;
        Ok(entry)
    }

    /// Like [`record`](Self::record) but a failed write only produces a warning.
    pub async fn record_or_warn(
        &self,
        category: &str,
        message: &str,
        severity: LogSeverity,
        context: serde_json::Value,
    ) {
        if let Err(err) = self.record(category, message, severity, context).await {
            tracing::warn!(error = %err, category, "payment log write failed");
        }
    }
}
