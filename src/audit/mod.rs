//! Tamper-evident audit trail, security events and anomaly detection.

mod error;
mod logger;
mod schema;
mod types;

pub use error::AuditError;
pub use logger::{chain_hash, AuditLog, GENESIS_HASH};
pub use schema::{SCHEMA, SCHEMA_VERSION};
pub use types::{
    AccessPattern, AccessResult, AuditComplianceReport, AuditEvent, AuditEventBuilder,
    AuditRecord, ChainVerification, EventType, SecurityEvent, SecurityEventType, Severity,
    TrailFilter,
};
