pub mod model;
pub mod sink;

pub use model::{AuditError, AuditResult, LogSeverity, PaymentLogEntry, PAYMENT_LOG_VERSION};
pub use sink::{JsonLinesFileSink, MemoryLogSink, NoopLogSink, PaymentLogSink, PaymentLogger};
