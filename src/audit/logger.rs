//! Hash-chained audit log with async `SQLite` operations.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use super::error::AuditError;
use super::schema::{SCHEMA, SCHEMA_VERSION};
use super::types::{
    AccessPattern, AccessResult, AuditComplianceReport, AuditEvent, AuditRecord,
    ChainVerification, EventType, SecurityEvent, SecurityEventType, Severity, TrailFilter,
};
use crate::config::AuditConfig;
use crate::store::format_timestamp;

/// Previous hash of the first record in a fresh chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Upper bound on records read for anomaly detection.
const ANOMALY_SCAN_LIMIT: u32 = 1000;

/// Hash of one chain link: SHA-256 over the previous hash, the sequence
/// number and the event document.
#[must_use]
pub fn chain_hash(previous_hash: &str, sequence_number: u64, document: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(sequence_number.to_be_bytes());
    hasher.update(document.as_bytes());
    hex::encode(hasher.finalize())
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, AuditError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AuditError::Corrupt(format!("timestamp {value:?}: {e}")))
}

type RecordRow = (u64, String, String, String, String);

fn read_record_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_record(row: RecordRow) -> Result<AuditRecord, AuditError> {
    let (sequence_number, previous_hash, hash, logged_at, document) = row;
    Ok(AuditRecord {
        sequence_number,
        previous_hash,
        hash,
        logged_at: parse_time(&logged_at)?,
        event: serde_json::from_str(&document)?,
    })
}

/// Audit log for recording access events and security events.
///
/// Uses `SQLite` for persistent storage with async operations via `spawn_blocking`.
/// High and critical security events are broadcast to subscribers.
#[derive(Debug, Clone)]
pub struct AuditLog {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
    config: AuditConfig,
    alerts: broadcast::Sender<SecurityEvent>,
}

impl AuditLog {
    /// Open an audit log at the specified path.
    ///
    /// Creates parent directories if they don't exist and initializes the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| {
                    AuditError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let path_clone = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, AuditError> {
            let conn =
                Connection::open(&path_clone).map_err(|source| AuditError::DatabaseOpen {
                    path: path_clone,
                    source,
                })?;
            init_schema(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)??;

        Ok(Self::from_connection(conn, Some(path)))
    }

    /// Open an in-memory audit log for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or the schema cannot be applied.
    pub async fn open_in_memory() -> Result<Self, AuditError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, AuditError> {
            let conn = Connection::open_in_memory()?;
            init_schema(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)??;

        Ok(Self::from_connection(conn, None))
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Self {
        let config = AuditConfig::default();
        let (alerts, _) = broadcast::channel(config.alert_channel_capacity.max(1));
        Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
            config,
            alerts,
        }
    }

    /// Replace the anomaly thresholds and alert channel capacity.
    ///
    /// Existing subscribers keep listening to the old channel.
    #[must_use]
    pub fn with_config(mut self, config: AuditConfig) -> Self {
        let (alerts, _) = broadcast::channel(config.alert_channel_capacity.max(1));
        self.alerts = alerts;
        self.config = config;
        self
    }

    /// Returns the path to the database, if opened from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Receive high and critical security events as they are logged.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SecurityEvent> {
        self.alerts.subscribe()
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, AuditError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, AuditError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Log an access event and react to it.
    ///
    /// Denied access raises an `unauthorized_api_access` event and, past the
    /// failure threshold, a `brute_force_attempt`. PHI access writes a
    /// compliance row and bulk operations raise `bulk_data_operation`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record or a follow-up event cannot be stored.
    pub async fn log_access(&self, event: &AuditEvent) -> Result<Uuid, AuditError> {
        let record = self.append(event).await?;
        tracing::debug!(
            audit_id = %event.audit_id,
            sequence = record.sequence_number,
            user_id = %event.user_id,
            action = %event.action,
            result = event.result.as_str(),
            "Recorded audit event"
        );

        if event.result == AccessResult::Denied {
            self.handle_denied(event).await?;
        } else if event.event_type == EventType::PhiAccess {
            self.record_phi_access(event).await?;
        } else if event.event_type == EventType::BulkOperation {
            let description = format!(
                "Bulk operation {} performed by {}",
                event.action, event.user_id
            );
            self.log_security_event(
                SecurityEvent::new(SecurityEventType::BulkDataOperation, Severity::Medium, description)
                    .user(&event.user_id)
                    .ip_address(event.ip_address.clone()),
            )
            .await?;
        }

        Ok(event.audit_id)
    }

    /// Append an event to the hash chain.
    async fn append(&self, event: &AuditEvent) -> Result<AuditRecord, AuditError> {
        let document = serde_json::to_string(event)?;
        let event = event.clone();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            let head: Option<(u64, String)> = tx
                .query_row(
                    "SELECT sequence_number, hash FROM chain_head WHERE id = 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let (last, previous_hash) = head.unwrap_or_else(|| (0, GENESIS_HASH.to_string()));
            let sequence_number = last + 1;
            let hash = chain_hash(&previous_hash, sequence_number, &document);
            let logged_at = Utc::now();

            tx.execute(
                "INSERT INTO audit_records (sequence_number, audit_id, user_id, action,
                     resource_type, result, event_type, ip_address, timestamp, logged_at,
                     document, previous_hash, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    sequence_number,
                    event.audit_id.to_string(),
                    event.user_id,
                    event.action,
                    event.resource_type,
                    event.result.as_str(),
                    event.event_type.as_str(),
                    event.ip_address,
                    format_timestamp(event.timestamp),
                    format_timestamp(logged_at),
                    document,
                    previous_hash,
                    hash,
                ],
            )?;
            tx.execute(
                "INSERT INTO chain_head (id, sequence_number, hash) VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                     sequence_number = excluded.sequence_number, hash = excluded.hash",
                params![sequence_number, hash],
            )?;
            tx.commit()?;

            Ok(AuditRecord {
                sequence_number,
                previous_hash,
                hash,
                logged_at,
                event,
            })
        })
        .await
    }

    async fn handle_denied(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let description = format!(
            "Access denied for user {} on {}",
            event.user_id, event.resource_type
        );
        self.log_security_event(
            SecurityEvent::new(SecurityEventType::UnauthorizedApiAccess, Severity::Medium, description)
                .user(&event.user_id)
                .ip_address(event.ip_address.clone()),
        )
        .await?;

        let failures = self
            .count_denied_since(&event.user_id, event.timestamp - Duration::hours(1))
            .await?;
        if failures >= u64::from(self.config.failed_logins_threshold) {
            let description = format!(
                "User {} had {failures} failed attempts in 1 hour",
                event.user_id
            );
            self.log_security_event(
                SecurityEvent::new(SecurityEventType::BruteForceAttempt, Severity::High, description)
                    .user(&event.user_id)
                    .ip_address(event.ip_address.clone()),
            )
            .await?;
        }
        Ok(())
    }

    async fn count_denied_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<u64, AuditError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM audit_records
                 WHERE user_id = ?1 AND result = ?2 AND timestamp >= ?3",
                params![user_id, AccessResult::Denied.as_str(), format_timestamp(since)],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    async fn record_phi_access(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let minimum_necessary = event
            .context
            .get("minimum_necessary")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        let purpose = event
            .context
            .get("purpose")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unspecified")
            .to_string();
        let event = event.clone();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO compliance_events (compliance_event_id, audit_id, compliance_type,
                     event_category, user_id, phi_accessed, minimum_necessary,
                     authorized_purpose, duration_ms, timestamp)
                 VALUES (?1, ?2, 'HIPAA', 'PHI_ACCESS', ?3, 1, ?4, ?5, ?6, ?7)",
                params![
                    Uuid::new_v4().to_string(),
                    event.audit_id.to_string(),
                    event.user_id,
                    minimum_necessary,
                    purpose,
                    event.duration_ms,
                    format_timestamp(event.timestamp),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Store a security event, broadcasting it if high or critical.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be stored.
    pub async fn log_security_event(&self, event: SecurityEvent) -> Result<Uuid, AuditError> {
        let document = serde_json::to_string(&event)?;
        let stored = event.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO security_events (security_event_id, event_type, severity, user_id,
                     description, ip_address, timestamp, document)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    stored.security_event_id.to_string(),
                    stored.event_type.as_str(),
                    stored.severity.as_str(),
                    stored.user_id,
                    stored.description,
                    stored.ip_address,
                    format_timestamp(stored.timestamp),
                    document,
                ],
            )?;
            Ok(())
        })
        .await?;

        if event.severity.is_alert() {
            tracing::warn!(
                event_type = event.event_type.as_str(),
                severity = event.severity.as_str(),
                user_id = event.user_id.as_deref().unwrap_or("-"),
                "Security alert: {}",
                event.description
            );
            // No subscribers is fine.
            let _ = self.alerts.send(event.clone());
        }
        Ok(event.security_event_id)
    }

    /// Most recent security events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document is corrupt.
    pub async fn recent_security_events(&self, limit: u32) -> Result<Vec<SecurityEvent>, AuditError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT document FROM security_events ORDER BY timestamp DESC LIMIT ?1",
            )?;
            let documents = stmt
                .query_map(params![limit], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            documents
                .iter()
                .map(|d| serde_json::from_str(d).map_err(AuditError::from))
                .collect()
        })
        .await
    }

    /// Audit records matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a record is corrupt.
    pub async fn trail(&self, filter: &TrailFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(user_id) = &filter.user_id {
            values.push(user_id.clone());
            clauses.push(format!("user_id = ?{}", values.len()));
        }
        if let Some(event_type) = filter.event_type {
            values.push(event_type.as_str().to_string());
            clauses.push(format!("event_type = ?{}", values.len()));
        }
        if let Some(start) = filter.start {
            values.push(format_timestamp(start));
            clauses.push(format!("timestamp >= ?{}", values.len()));
        }
        if let Some(end) = filter.end {
            values.push(format_timestamp(end));
            clauses.push(format!("timestamp <= ?{}", values.len()));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT sequence_number, previous_hash, hash, logged_at, document
             FROM audit_records {where_clause}
             ORDER BY sequence_number DESC LIMIT {}",
            filter.limit
        );

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), read_record_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(decode_record).collect()
        })
        .await
    }

    /// Look for unusual access by a user over the last `hours`.
    ///
    /// Suspicious patterns are stored and raise an `unusual_ip_access`
    /// security event.
    ///
    /// # Errors
    ///
    /// Returns an error if the trail cannot be read or a pattern cannot be stored.
    pub async fn detect_anomalies(&self, user_id: &str, hours: i64) -> Result<Vec<AccessPattern>, AuditError> {
        let now = Utc::now();
        let filter = TrailFilter::for_user(user_id)
            .between(now - Duration::hours(hours), now)
            .limit(ANOMALY_SCAN_LIMIT);
        let records = self.trail(&filter).await?;
        let patterns = analyze_patterns(user_id, hours, &records, &self.config, now);

        for pattern in patterns.iter().filter(|p| p.suspicious) {
            self.store_pattern(pattern).await?;
            let description = format!(
                "Suspicious access pattern detected: {} (score: {:.2})",
                pattern.pattern_type, pattern.deviation_score
            );
            self.log_security_event(
                SecurityEvent::new(SecurityEventType::UnusualIpAccess, Severity::Medium, description)
                    .user(user_id),
            )
            .await?;
        }
        Ok(patterns)
    }

    async fn store_pattern(&self, pattern: &AccessPattern) -> Result<(), AuditError> {
        let pattern = pattern.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO access_patterns (pattern_id, user_id, pattern_type, frequency,
                     time_window, baseline_frequency, deviation_score, suspicious, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    Uuid::new_v4().to_string(),
                    pattern.user_id,
                    pattern.pattern_type,
                    pattern.frequency,
                    pattern.time_window,
                    pattern.baseline_frequency,
                    pattern.deviation_score,
                    pattern.suspicious,
                    format_timestamp(pattern.timestamp),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Re-compute every hash and check each record links to its predecessor.
    ///
    /// After a purge the oldest remaining record anchors the chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be read.
    pub async fn verify_chain(&self) -> Result<ChainVerification, AuditError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT sequence_number, previous_hash, hash, document
                 FROM audit_records ORDER BY sequence_number ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut records_checked = 0;
            let mut last: Option<(u64, String)> = None;

            while let Some(row) = rows.next()? {
                let sequence_number: u64 = row.get(0)?;
                let previous_hash: String = row.get(1)?;
                let hash: String = row.get(2)?;
                let document: String = row.get(3)?;
                records_checked += 1;

                let linked = match &last {
                    Some((last_seq, last_hash)) => {
                        sequence_number == last_seq + 1 && previous_hash == *last_hash
                    }
                    None => sequence_number > 1 || previous_hash == GENESIS_HASH,
                };
                if !linked || chain_hash(&previous_hash, sequence_number, &document) != hash {
                    return Ok(ChainVerification {
                        records_checked,
                        first_broken: Some(sequence_number),
                    });
                }
                last = Some((sequence_number, hash));
            }

            // A truncated tail leaves the head pointing past the last record.
            let head: Option<(u64, String)> = conn
                .query_row(
                    "SELECT sequence_number, hash FROM chain_head WHERE id = 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let first_broken = match (head, last) {
                (Some((head_seq, head_hash)), Some((last_seq, last_hash)))
                    if head_seq != last_seq || head_hash != last_hash =>
                {
                    Some(last_seq + 1)
                }
                _ => None,
            };
            Ok(ChainVerification {
                records_checked,
                first_broken,
            })
        })
        .await
    }

    /// Summarize audit activity between `start` and `end`.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be read.
    pub async fn compliance_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AuditComplianceReport, AuditError> {
        let (start_s, end_s) = (format_timestamp(start), format_timestamp(end));
        let (documents, security) = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT document FROM audit_records
                     WHERE timestamp >= ?1 AND timestamp <= ?2 ORDER BY sequence_number ASC",
                )?;
                let documents = stmt
                    .query_map(params![start_s, end_s], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut stmt = conn.prepare(
                    "SELECT severity, COUNT(*) FROM security_events
                     WHERE timestamp >= ?1 AND timestamp <= ?2 GROUP BY severity",
                )?;
                let security = stmt
                    .query_map(params![start_s, end_s], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
                    })?
                    .collect::<Result<BTreeMap<_, _>, _>>()?;
                Ok((documents, security))
            })
            .await?;

        let events = documents
            .iter()
            .map(|d| serde_json::from_str::<AuditEvent>(d))
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_event_type = BTreeMap::new();
        let mut by_result = BTreeMap::new();
        let mut by_action = BTreeMap::new();
        let mut users = BTreeSet::new();
        let mut phi_access_events = 0;
        let mut unauthorized_attempts = 0;
        for event in &events {
            *by_event_type.entry(event.event_type.as_str().to_string()).or_insert(0) += 1;
            *by_result.entry(event.result.as_str().to_string()).or_insert(0) += 1;
            *by_action.entry(event.action.clone()).or_insert(0) += 1;
            users.insert(event.user_id.as_str());
            if event.is_phi() {
                phi_access_events += 1;
            }
            if event.result == AccessResult::Denied {
                unauthorized_attempts += 1;
            }
        }

        Ok(AuditComplianceReport {
            report_id: Uuid::new_v4(),
            compliance_type: "HIPAA".to_string(),
            start,
            end,
            total_access_events: events.len() as u64,
            phi_access_events,
            unauthorized_attempts,
            unique_users: users.len() as u64,
            by_event_type,
            by_result,
            by_action,
            security_events_by_severity: security,
            generated_at: Utc::now(),
        })
    }

    /// Delete records written before `cutoff`. Returns the number of audit
    /// records deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, AuditError> {
        self.with_conn(move |conn| {
            let cutoff = format_timestamp(cutoff);
            let tx = conn.unchecked_transaction()?;
            let deleted = tx.execute(
                "DELETE FROM audit_records WHERE logged_at < ?1",
                params![cutoff],
            )?;
            for table in ["security_events", "compliance_events", "access_patterns"] {
                tx.execute(
                    &format!("DELETE FROM {table} WHERE timestamp < ?1"),
                    params![cutoff],
                )?;
            }
            tx.commit()?;
            Ok(deleted)
        })
        .await
    }
}

/// Apply the anomaly thresholds to a user's recent records.
#[allow(clippy::cast_precision_loss)]
fn analyze_patterns(
    user_id: &str,
    hours: i64,
    records: &[AuditRecord],
    config: &AuditConfig,
    now: DateTime<Utc>,
) -> Vec<AccessPattern> {
    let time_window = format!("{hours}h");
    let pattern = |pattern_type: &str, frequency: u64, baseline: f64, deviation: f64, suspicious: bool| {
        AccessPattern {
            user_id: user_id.to_string(),
            pattern_type: pattern_type.to_string(),
            frequency,
            time_window: time_window.clone(),
            baseline_frequency: baseline,
            deviation_score: deviation,
            timestamp: now,
            suspicious,
        }
    };
    let mut patterns = Vec::new();

    let failed_logins = records
        .iter()
        .filter(|r| r.event.action == "login" && r.event.result == AccessResult::Denied)
        .count() as u64;
    if failed_logins > u64::from(config.failed_logins_threshold) {
        let n = failed_logins as f64;
        patterns.push(pattern("excessive_failed_logins", failed_logins, 2.0, (n - 2.0) / 2.0, true));
    }

    let ips: BTreeSet<&str> = records
        .iter()
        .filter_map(|r| r.event.ip_address.as_deref())
        .collect();
    let distinct = ips.len() as u64;
    if distinct > u64::from(config.distinct_ip_threshold) {
        patterns.push(pattern(
            "multiple_ip_addresses",
            distinct,
            1.0,
            distinct as f64 - 1.0,
            distinct > u64::from(config.distinct_ip_suspicious),
        ));
    }

    let total = records.len() as u64;
    let baseline = u64::from(config.baseline_requests);
    if total > baseline * 3 {
        let b = baseline as f64;
        patterns.push(pattern(
            "high_volume_access",
            total,
            b,
            (total as f64 - b) / b,
            total > baseline * 5,
        ));
    }
    patterns
}

fn init_schema(conn: &Connection) -> Result<(), AuditError> {
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![SCHEMA_VERSION],
    )?;
    Ok(())
}
