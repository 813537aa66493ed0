//! Database schema for the audit trail.

/// Current schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the audit database.
pub const SCHEMA: &str = r"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Hash-chained access records; `document` is the hashed JSON of the event
CREATE TABLE IF NOT EXISTS audit_records (
    sequence_number INTEGER PRIMARY KEY NOT NULL,
    audit_id TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    action TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    result TEXT NOT NULL,
    event_type TEXT NOT NULL,
    ip_address TEXT,
    timestamp TEXT NOT NULL,
    logged_at TEXT NOT NULL,
    document TEXT NOT NULL,
    previous_hash TEXT NOT NULL,
    hash TEXT NOT NULL
);

-- Single row holding the last sequence number and hash, survives purges
CREATE TABLE IF NOT EXISTS chain_head (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    sequence_number INTEGER NOT NULL,
    hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS security_events (
    security_event_id TEXT PRIMARY KEY NOT NULL,
    event_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    user_id TEXT,
    description TEXT NOT NULL,
    ip_address TEXT,
    timestamp TEXT NOT NULL,
    document TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS compliance_events (
    compliance_event_id TEXT PRIMARY KEY NOT NULL,
    audit_id TEXT NOT NULL,
    compliance_type TEXT NOT NULL,
    event_category TEXT NOT NULL,
    user_id TEXT NOT NULL,
    phi_accessed INTEGER NOT NULL,
    minimum_necessary INTEGER NOT NULL,
    authorized_purpose TEXT NOT NULL,
    duration_ms INTEGER,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS access_patterns (
    pattern_id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    pattern_type TEXT NOT NULL,
    frequency INTEGER NOT NULL,
    time_window TEXT NOT NULL,
    baseline_frequency REAL NOT NULL,
    deviation_score REAL NOT NULL,
    suspicious INTEGER NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_audit_user_timestamp ON audit_records(user_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_records(timestamp);
CREATE INDEX IF NOT EXISTS idx_audit_logged_at ON audit_records(logged_at);
CREATE INDEX IF NOT EXISTS idx_audit_event_type ON audit_records(event_type);
CREATE INDEX IF NOT EXISTS idx_security_timestamp ON security_events(timestamp);
";

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_schema_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        for table in [
            "audit_records",
            "chain_head",
            "security_events",
            "compliance_events",
            "access_patterns",
            "schema_version",
        ] {
            assert!(table_exists(&conn, table), "Table {table} should exist");
        }
    }

    #[test]
    fn test_chain_head_single_row() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute(
            "INSERT INTO chain_head (id, sequence_number, hash) VALUES (1, 0, 'x')",
            [],
        )
        .unwrap();
        let second = conn.execute(
            "INSERT INTO chain_head (id, sequence_number, hash) VALUES (2, 0, 'x')",
            [],
        );
        assert!(second.is_err());
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(table_exists(&conn, "audit_records"));
    }
}
