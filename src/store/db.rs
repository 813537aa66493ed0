//! `SQLite` store for users, credentials and scan reports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::error::StoreError;
use super::schema::{SCHEMA, SCHEMA_VERSION};
use super::types::{
    format_timestamp, parse_optional_timestamp, parse_timestamp, parse_uuid, CredentialStatus,
    ScanPage, StoredCredential,
};
use crate::auth::{Profile, User};
use crate::compliance::{
    ComplianceReport, DashboardData, ScanStatus, ScanSummary, SeverityCounts, ViolationSummary,
};

/// Scans shown on the dashboard.
const DASHBOARD_RECENT_SCANS: u32 = 3;
/// Scans averaged for the overall score.
const DASHBOARD_SCORE_WINDOW: u32 = 5;

const USER_COLUMNS: &str = "user_id, email, password_hash, first_name, last_name, company, \
     plan_tier, status, email_verified, created_at, updated_at";

const CREDENTIAL_COLUMNS: &str = "user_id, project_id, credential_id, service_account_email, \
     key_type, envelope, key_id, status, created_at, updated_at, last_used, revoked_at";

const SUMMARY_COLUMNS: &str =
    "scan_id, project_id, scan_timestamp, total_violations, compliance_score, status";

/// Persistent store backed by `SQLite`.
///
/// Blocking database work runs on the blocking pool via `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

/// Raw user row, decoded outside the rusqlite closure.
type UserRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    bool,
    String,
    String,
);

fn read_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn decode_user(row: UserRow) -> Result<User, StoreError> {
    let (
        user_id,
        email,
        password_hash,
        first_name,
        last_name,
        company,
        plan_tier,
        status,
        email_verified,
        created_at,
        updated_at,
    ) = row;
    Ok(User {
        user_id: parse_uuid(&user_id)?,
        email,
        password_hash,
        profile: Profile::new(&first_name, &last_name, company),
        plan_tier,
        status,
        email_verified,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

type CredentialRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn read_credential_row(row: &Row<'_>) -> rusqlite::Result<CredentialRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
    ))
}

fn decode_credential(row: CredentialRow) -> Result<StoredCredential, StoreError> {
    let (
        user_id,
        project_id,
        credential_id,
        service_account_email,
        key_type,
        envelope,
        key_id,
        status,
        created_at,
        updated_at,
        last_used,
        revoked_at,
    ) = row;
    Ok(StoredCredential {
        user_id,
        project_id,
        credential_id: parse_uuid(&credential_id)?,
        service_account_email,
        key_type,
        envelope: serde_json::from_str(&envelope)?,
        key_id,
        status: CredentialStatus::parse(&status),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_optional_timestamp(updated_at)?,
        last_used: parse_optional_timestamp(last_used)?,
        revoked_at: parse_optional_timestamp(revoked_at)?,
    })
}

type SummaryRow = (String, String, String, u32, f64, String);

fn read_summary_row(row: &Row<'_>) -> rusqlite::Result<SummaryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_summary(row: SummaryRow) -> Result<ScanSummary, StoreError> {
    let (scan_id, project_id, scan_timestamp, total_violations, compliance_score, status) = row;
    Ok(ScanSummary {
        scan_id: parse_uuid(&scan_id)?,
        project_id,
        scan_timestamp: parse_timestamp(&scan_timestamp)?,
        total_violations,
        compliance_score,
        status: ScanStatus::parse(&status),
    })
}

fn to_sql_limit(value: u32) -> i64 {
    i64::from(value)
}

fn recent_summaries(
    conn: &Connection,
    user_id: &str,
    limit: u32,
) -> Result<Vec<ScanSummary>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM scans WHERE user_id = ?1
         ORDER BY scan_timestamp DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(params![user_id, to_sql_limit(limit)], read_summary_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(decode_summary).collect()
}

impl Store {
    /// Open a store at the specified path.
    ///
    /// Creates parent directories if they don't exist and initializes the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StoreError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let path_clone = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn = Connection::open(&path_clone).map_err(|source| StoreError::DatabaseOpen {
                path: path_clone,
                source,
            })?;
            init_schema(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)??;

        tracing::debug!(path = %path.display(), "Opened store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Open an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or the schema cannot be applied.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, StoreError> {
            let conn = Connection::open_in_memory()?;
            init_schema(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Returns the path to the database, if opened from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)?
    }

    /// Check the database answers queries.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    // Users

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the email is already registered.
    pub async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let user = user.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    user.user_id.to_string(),
                    user.email,
                    user.password_hash,
                    user.profile.first_name,
                    user.profile.last_name,
                    user.profile.company,
                    user.plan_tier,
                    user.status,
                    user.email_verified,
                    format_timestamp(user.created_at),
                    format_timestamp(user.updated_at),
                ],
            )
            .map_err(|e| StoreError::from_insert(e, &format!("user {}", user.email)))?;
            Ok(())
        })
        .await
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
                params![user_id],
                read_user_row,
            )
            .optional()?
            .map(decode_user)
            .transpose()
        })
        .await
    }

    /// Get a user by (lower-case) email.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                read_user_row,
            )
            .optional()?
            .map(decode_user)
            .transpose()
        })
        .await
    }

    // Credentials

    /// Insert or replace the credential for a user and project.
    ///
    /// Replacing keeps `created_at`, sets `updated_at` and reactivates the
    /// record. Returns `true` when an existing record was replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn upsert_credential(&self, credential: &StoredCredential) -> Result<bool, StoreError> {
        let credential = credential.clone();
        let envelope = serde_json::to_string(&credential.envelope)?;
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            let exists = tx
                .query_row(
                    "SELECT 1 FROM gcp_credentials WHERE user_id = ?1 AND project_id = ?2",
                    params![credential.user_id, credential.project_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();

            if exists {
                tx.execute(
                    "UPDATE gcp_credentials
                     SET credential_id = ?3, service_account_email = ?4, key_type = ?5,
                         envelope = ?6, key_id = ?7, status = ?8, updated_at = ?9,
                         revoked_at = NULL
                     WHERE user_id = ?1 AND project_id = ?2",
                    params![
                        credential.user_id,
                        credential.project_id,
                        credential.credential_id.to_string(),
                        credential.service_account_email,
                        credential.key_type,
                        envelope,
                        credential.key_id,
                        CredentialStatus::Active.as_str(),
                        format_timestamp(credential.updated_at.unwrap_or_else(Utc::now)),
                    ],
                )?;
            } else {
                tx.execute(
                    &format!(
                        "INSERT INTO gcp_credentials ({CREDENTIAL_COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, NULL, NULL)"
                    ),
                    params![
                        credential.user_id,
                        credential.project_id,
                        credential.credential_id.to_string(),
                        credential.service_account_email,
                        credential.key_type,
                        envelope,
                        credential.key_id,
                        credential.status.as_str(),
                        format_timestamp(credential.created_at),
                    ],
                )?;
            }
            tx.commit()?;
            Ok(exists)
        })
        .await
    }

    /// Get the credential for a user and project, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub async fn get_credential(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> Result<Option<StoredCredential>, StoreError> {
        let (user_id, project_id) = (user_id.to_string(), project_id.to_string());
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {CREDENTIAL_COLUMNS} FROM gcp_credentials
                     WHERE user_id = ?1 AND project_id = ?2"
                ),
                params![user_id, project_id],
                read_credential_row,
            )
            .optional()?
            .map(decode_credential)
            .transpose()
        })
        .await
    }

    /// List a user's credentials, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub async fn list_credentials(&self, user_id: &str) -> Result<Vec<StoredCredential>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CREDENTIAL_COLUMNS} FROM gcp_credentials
                 WHERE user_id = ?1 ORDER BY created_at ASC, project_id ASC"
            ))?;
            let rows = stmt
                .query_map(params![user_id], read_credential_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(decode_credential).collect()
        })
        .await
    }

    /// Record that a credential was used.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn touch_credential(
        &self,
        user_id: &str,
        project_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let (user_id, project_id) = (user_id.to_string(), project_id.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE gcp_credentials SET last_used = ?3 WHERE user_id = ?1 AND project_id = ?2",
                params![user_id, project_id, format_timestamp(at)],
            )?;
            Ok(())
        })
        .await
    }

    /// Mark a credential revoked. Returns `false` if no record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn revoke_credential(
        &self,
        user_id: &str,
        project_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let (user_id, project_id) = (user_id.to_string(), project_id.to_string());
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE gcp_credentials SET status = ?3, revoked_at = ?4, updated_at = ?4
                 WHERE user_id = ?1 AND project_id = ?2",
                params![
                    user_id,
                    project_id,
                    CredentialStatus::Revoked.as_str(),
                    format_timestamp(at)
                ],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    /// Number of active credentials a user holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_active_credentials(&self, user_id: &str) -> Result<u64, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM gcp_credentials WHERE user_id = ?1 AND status = ?2",
                params![user_id, CredentialStatus::Active.as_str()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    // Scans

    /// Store a scan report.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the insert fails.
    pub async fn insert_scan(&self, report: &ComplianceReport) -> Result<(), StoreError> {
        let document = serde_json::to_string(report)?;
        let report = ReportRow::from_report(report);
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO scans (scan_id, user_id, project_id, scan_timestamp, status,
                     total_violations, critical_violations, high_violations, medium_violations,
                     low_violations, compliance_score, report)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    report.scan_id,
                    report.user_id,
                    report.project_id,
                    report.scan_timestamp,
                    report.status,
                    report.counts.total(),
                    report.counts.critical,
                    report.counts.high,
                    report.counts.medium,
                    report.counts.low,
                    report.compliance_score,
                    document,
                ],
            )
            .map_err(|e| StoreError::from_insert(e, &format!("scan {}", report.scan_id)))?;
            Ok(())
        })
        .await
    }

    /// Full report for a scan owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the document is corrupt.
    pub async fn get_report(
        &self,
        user_id: &str,
        scan_id: Uuid,
    ) -> Result<Option<ComplianceReport>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let document: Option<String> = conn
                .query_row(
                    "SELECT report FROM scans WHERE scan_id = ?1 AND user_id = ?2",
                    params![scan_id.to_string(), user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(document.map(|d| serde_json::from_str(&d)).transpose()?)
        })
        .await
    }

    /// Page of scan summaries, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub async fn list_scans(&self, user_id: &str, limit: u32, offset: u32) -> Result<ScanPage, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let total: u64 = conn.query_row(
                "SELECT COUNT(*) FROM scans WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUMMARY_COLUMNS} FROM scans WHERE user_id = ?1
                 ORDER BY scan_timestamp DESC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map(
                    params![user_id, to_sql_limit(limit), to_sql_limit(offset)],
                    read_summary_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            let scans = rows
                .into_iter()
                .map(decode_summary)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ScanPage { scans, total })
        })
        .await
    }

    /// Most recent scan summaries.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub async fn recent_scans(&self, user_id: &str, limit: u32) -> Result<Vec<ScanSummary>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| recent_summaries(conn, &user_id, limit))
            .await
    }

    /// Aggregate dashboard view for a user.
    ///
    /// The overall score averages the five most recent scans and the
    /// violation summary covers the three most recent.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a row is corrupt.
    pub async fn dashboard(&self, user_id: &str) -> Result<DashboardData, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let total_scans: u64 = conn.query_row(
                "SELECT COUNT(*) FROM scans WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            let total_projects: u64 = conn.query_row(
                "SELECT COUNT(*) FROM gcp_credentials WHERE user_id = ?1 AND status = ?2",
                params![user_id, CredentialStatus::Active.as_str()],
                |row| row.get(0),
            )?;

            let window = recent_summaries(conn, &user_id, DASHBOARD_SCORE_WINDOW)?;
            let overall_compliance_score = average_score(&window);

            let mut stmt = conn.prepare(
                "SELECT critical_violations, high_violations, medium_violations, low_violations
                 FROM scans WHERE user_id = ?1 ORDER BY scan_timestamp DESC LIMIT ?2",
            )?;
            let counts = stmt
                .query_map(
                    params![user_id, to_sql_limit(DASHBOARD_RECENT_SCANS)],
                    |row| {
                        Ok(SeverityCounts {
                            critical: row.get(0)?,
                            high: row.get(1)?,
                            medium: row.get(2)?,
                            low: row.get(3)?,
                        })
                    },
                )?
                .collect::<Result<Vec<_>, _>>()?;
            let summary = counts.iter().fold(SeverityCounts::default(), |acc, c| SeverityCounts {
                critical: acc.critical + c.critical,
                high: acc.high + c.high,
                medium: acc.medium + c.medium,
                low: acc.low + c.low,
            });

            let recent_scans: Vec<ScanSummary> = window
                .iter()
                .take(DASHBOARD_RECENT_SCANS as usize)
                .cloned()
                .collect();
            Ok(DashboardData {
                user_id,
                total_scans,
                total_projects,
                overall_compliance_score,
                last_scan_date: recent_scans.first().map(|s| s.scan_timestamp),
                recent_scans,
                violation_summary: ViolationSummary::from(summary),
            })
        })
        .await
    }

    /// Delete scans older than `cutoff`. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn purge_scans_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM scans WHERE scan_timestamp < ?1",
                params![format_timestamp(cutoff)],
            )?;
            Ok(deleted)
        })
        .await
    }
}

/// Mean score rounded to one decimal; zero when there are no scans.
fn average_score(scans: &[ScanSummary]) -> f64 {
    if scans.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = scans.iter().map(|s| s.compliance_score).sum::<f64>() / scans.len() as f64;
    (mean * 10.0).round() / 10.0
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![SCHEMA_VERSION],
    )?;
    Ok(())
}

/// Column values of a report row, owned for the blocking closure.
struct ReportRow {
    scan_id: String,
    user_id: String,
    project_id: String,
    scan_timestamp: String,
    status: &'static str,
    counts: SeverityCounts,
    compliance_score: f64,
}

impl ReportRow {
    fn from_report(report: &ComplianceReport) -> Self {
        Self {
            scan_id: report.scan_id.to_string(),
            user_id: report.user_id.clone(),
            project_id: report.project_id.clone(),
            scan_timestamp: format_timestamp(report.scan_timestamp),
            status: report.status.as_str(),
            counts: report.counts(),
            compliance_score: report.compliance_score,
        }
    }
}
