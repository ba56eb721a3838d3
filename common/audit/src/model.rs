use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const PAYMENT_LOG_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    #[default]
    Info,
    Warning,
    Error,
}

/// One durable record in the payment log.
///
/// `category` groups records for later review (for example `webhook` or
/// `payment_request`); `context` carries the inputs that led to the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLogEntry {
    pub entry_id: Uuid,
    pub entry_version: i32,
    pub category: String,
    pub message: String,
    pub severity: LogSeverity,
    pub source_service: String,
    pub recorded_at: DateTime<Utc>,
    pub context: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("log write failed: {0}")]
    Io(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
