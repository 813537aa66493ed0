//! Account and maintenance commands run against the service database.

use chrono::{DateTime, Duration, Utc};

use super::error::CommandError;
use crate::audit::{AuditComplianceReport, AuditLog, ChainVerification};
use crate::auth::{Accounts, PublicUser, RegisterRequest, TokenIssuer};
use crate::config::GuardConfig;
use crate::retention::{RetentionPolicy, RetentionSummary};
use crate::store::Store;

/// Create an account without going through the HTTP API.
///
/// # Errors
///
/// Returns an error if the email is taken or invalid, or the password is
/// too short.
pub async fn add_user(
    store: &Store,
    config: &GuardConfig,
    request: RegisterRequest,
) -> Result<PublicUser, CommandError> {
    let accounts = Accounts::new(store.clone(), TokenIssuer::from_config(&config.auth));
    let response = accounts.register(request).await?;
    Ok(response.user)
}

/// Re-compute the audit chain, failing if any link is broken.
///
/// # Errors
///
/// Returns `CommandError::ChainBroken` for a tampered chain.
pub async fn verify_audit(audit: &AuditLog) -> Result<ChainVerification, CommandError> {
    let result = audit.verify_chain().await?;
    match result.first_broken {
        Some(sequence) => {
            tracing::error!(sequence, "Audit chain verification failed");
            Err(CommandError::ChainBroken(sequence))
        }
        None => Ok(result),
    }
}

/// Audit activity summary for the last `days` days.
///
/// # Errors
///
/// Returns an error if the audit database cannot be read.
pub async fn audit_report(
    audit: &AuditLog,
    days: i64,
    now: DateTime<Utc>,
) -> Result<AuditComplianceReport, CommandError> {
    let start = now - Duration::days(days.max(1));
    Ok(audit.compliance_report(start, now).await?)
}

/// Apply the configured retention policy.
///
/// # Errors
///
/// Returns an error if a purge fails.
pub async fn run_retention(
    store: &Store,
    audit: &AuditLog,
    config: &GuardConfig,
    now: DateTime<Utc>,
) -> Result<RetentionSummary, CommandError> {
    let policy = RetentionPolicy::from_config(&config.retention);
    Ok(policy.run(store, audit, now).await?)
}
