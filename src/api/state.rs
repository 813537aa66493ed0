//! Shared handler state and the live event channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::error::StartupError;
use crate::assets::{asset_source_from_config, AssetSource};
use crate::audit::{AuditEvent, AuditLog};
use crate::auth::{Accounts, TokenIssuer};
use crate::config::GuardConfig;
use crate::credentials::CredentialService;
use crate::crypto::{key_provider_from_config, EnvelopeCipher, KeyProvider};
use crate::scanner::{ScanService, Scanner};
use crate::store::Store;

/// Default capacity for the event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event pushed to a user's SSE stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEvent {
    /// `scan_completed` or a security event type.
    pub event_type: String,
    /// Owner of the event; only that user's stream receives it.
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl ApiEvent {
    #[must_use]
    pub fn new(event_type: impl Into<String>, user_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            user_id: user_id.into(),
            timestamp: Utc::now(),
            data,
        }
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GuardConfig>,
    pub store: Store,
    pub accounts: Accounts,
    pub credentials: CredentialService,
    pub scans: ScanService,
    pub audit: AuditLog,
    pub events: broadcast::Sender<ApiEvent>,
    /// Cancelled to stop the server.
    pub cancel: CancellationToken,
}

impl AppState {
    /// Wire the services together from already-opened parts.
    #[must_use]
    pub fn new(
        config: GuardConfig,
        store: Store,
        audit: AuditLog,
        keys: Arc<dyn KeyProvider>,
        source: Arc<dyn AssetSource>,
    ) -> Self {
        let tokens = TokenIssuer::from_config(&config.auth);
        let accounts = Accounts::new(store.clone(), tokens);
        let credentials = CredentialService::new(store.clone(), EnvelopeCipher::new(keys));
        let scans = ScanService::new(
            Scanner::new(config.scanner.scoring),
            source,
            credentials.clone(),
            store.clone(),
        );
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);

        Self {
            config: Arc::new(config),
            store,
            accounts,
            credentials,
            scans,
            audit,
            events,
            cancel: CancellationToken::new(),
        }
    }

    /// Open the database and key material named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, no master key is
    /// configured, or the asset source cannot be built.
    pub async fn open(config: GuardConfig) -> Result<Self, StartupError> {
        let path = config.storage.database_path.clone();
        let store = Store::open(&path).await?;
        let audit = AuditLog::open(&path).await?.with_config(config.audit.clone());
        let keys = key_provider_from_config(&config.encryption)?;
        // Fail at startup rather than on the first credential upload.
        keys.master_key()?;
        let source = asset_source_from_config(&config.scanner)?;
        Ok(Self::new(config, store, audit, keys, source))
    }

    /// Record an audit event; failures are logged and never fail the request.
    pub async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.audit.log_access(&event).await {
            tracing::warn!(error = %e, action = %event.action, "Failed to record audit event");
        }
    }

    /// Push an event to SSE subscribers. Sending with no subscribers is fine.
    pub fn publish(&self, event: ApiEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::assets::FileAssetSource;
    use crate::crypto::StaticKeyProvider;

    async fn state() -> AppState {
        let dir = std::env::temp_dir();
        AppState::new(
            GuardConfig::default(),
            Store::open_in_memory().await.unwrap(),
            AuditLog::open_in_memory().await.unwrap(),
            Arc::new(StaticKeyProvider::random()),
            Arc::new(FileAssetSource::new(dir)),
        )
    }

    #[test]
    fn test_api_event_creation() {
        let event = ApiEvent::new("scan_completed", "user-1", json!({"scan_id": "abc"}));
        assert_eq!(event.event_type, "scan_completed");
        assert_eq!(event.user_id, "user-1");
        assert!(event.timestamp <= Utc::now());
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let state = state().await;
        let mut rx = state.events.subscribe();
        state.publish(ApiEvent::new("scan_completed", "user-1", json!({})));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.user_id, "user-1");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let state = state().await;
        state.publish(ApiEvent::new("scan_completed", "user-1", json!({})));
        assert!(!state.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_open_requires_master_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GuardConfig::default();
        config.storage.database_path = dir.path().join("guard.db");
        config.encryption.key_env = None;
        config.encryption.key_file = None;
        assert!(matches!(
            AppState::open(config).await,
            Err(StartupError::Crypto(_))
        ));
    }
}
