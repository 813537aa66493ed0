//! Retention policy for scan reports and audit records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AccessResult, AuditError, AuditEvent, AuditLog, EventType};
use crate::config::RetentionConfig;
use crate::store::{Store, StoreError};

/// User id recorded on maintenance events.
pub const SYSTEM_USER: &str = "system";

/// Errors from a retention run.
#[derive(thiserror::Error, Debug)]
pub enum RetentionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// How long each kind of record is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub scan_reports: Duration,
    pub audit_log: Duration,
}

/// What a retention run deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSummary {
    pub scans_deleted: usize,
    pub audit_records_deleted: usize,
}

impl RetentionPolicy {
    #[must_use]
    pub fn from_config(config: &RetentionConfig) -> Self {
        Self {
            scan_reports: Duration::days(config.scan_report_days.max(0)),
            audit_log: Duration::days(config.audit_log_days.max(0)),
        }
    }

    /// Purge records older than the policy allows, as of `now`.
    ///
    /// The run itself is recorded as a system audit event after the purge.
    ///
    /// # Errors
    ///
    /// Returns an error if either database delete fails.
    pub async fn run(
        &self,
        store: &Store,
        audit: &AuditLog,
        now: DateTime<Utc>,
    ) -> Result<RetentionSummary, RetentionError> {
        let scan_cutoff = now - self.scan_reports;
        let audit_cutoff = now - self.audit_log;

        let scans_deleted = store.purge_scans_before(scan_cutoff).await?;
        let audit_records_deleted = audit.purge_before(audit_cutoff).await?;
        let summary = RetentionSummary {
            scans_deleted,
            audit_records_deleted,
        };

        tracing::info!(
            scans_deleted,
            audit_records_deleted,
            scan_cutoff = %scan_cutoff,
            audit_cutoff = %audit_cutoff,
            "Retention run finished"
        );

        let event = AuditEvent::builder(SYSTEM_USER, "retention_run", "data_retention", AccessResult::Success)
            .event_type(EventType::DataDeletion)
            .timestamp(now)
            .context("scans_deleted", summary.scans_deleted)
            .context("audit_records_deleted", summary.audit_records_deleted)
            .build();
        audit.log_access(&event).await?;

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::audit::TrailFilter;
    use crate::auth::{Profile, User};
    use crate::compliance::ScoringModel;
    use crate::scanner::Scanner;

    #[test]
    fn test_policy_from_config() {
        let policy = RetentionPolicy::from_config(&RetentionConfig::default());
        assert_eq!(policy.scan_reports, Duration::days(2190));
        assert_eq!(policy.audit_log, Duration::days(3650));

        let negative = RetentionPolicy::from_config(&RetentionConfig {
            scan_report_days: -5,
            audit_log_days: 10,
        });
        assert_eq!(negative.scan_reports, Duration::zero());
    }

    #[tokio::test]
    async fn test_run_purges_old_scans_and_records() {
        let store = Store::open_in_memory().await.unwrap();
        let audit = AuditLog::open_in_memory().await.unwrap();
        let user = User::new(
            "ada@example.com".to_string(),
            "hash".to_string(),
            Profile::new("Ada", "Lovelace", None),
        );
        store.insert_user(&user).await.unwrap();
        let user_id = user.user_id.to_string();

        let scanner = Scanner::new(ScoringModel::Realistic);
        let mut old = scanner.failed_report(&user_id, "acme", "old");
        old.scan_timestamp = Utc::now() - Duration::days(3000);
        store.insert_scan(&old).await.unwrap();
        let recent = scanner.failed_report(&user_id, "acme", "recent");
        store.insert_scan(&recent).await.unwrap();

        audit
            .log_access(&AuditEvent::builder(&user_id, "scan", "gcp_project", AccessResult::Success).build())
            .await
            .unwrap();

        // Audit rows are stamped when written, so look far enough ahead
        // that the one above is past its retention period.
        let now = Utc::now() + Duration::days(3651);
        let policy = RetentionPolicy::from_config(&RetentionConfig::default());
        let summary = policy.run(&store, &audit, now).await.unwrap();

        assert_eq!(summary.scans_deleted, 2);
        assert_eq!(summary.audit_records_deleted, 1);

        let records = audit.trail(&TrailFilter::for_user(SYSTEM_USER)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event.action, "retention_run");
        assert_eq!(records[0].event.context["scans_deleted"], 2);
        assert!(store.get_report(&user_id, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_keeps_recent_data() {
        let store = Store::open_in_memory().await.unwrap();
        let audit = AuditLog::open_in_memory().await.unwrap();
        let policy = RetentionPolicy::from_config(&RetentionConfig::default());

        let summary = policy.run(&store, &audit, Utc::now()).await.unwrap();
        assert_eq!(summary, RetentionSummary::default());
        assert!(audit.verify_chain().await.unwrap().is_intact());
    }
}
