//! Encrypted storage of service account keys per user and project.

use chrono::Utc;
use uuid::Uuid;

use super::error::CredentialError;
use super::types::{validate_service_account, ProjectInfo, ProjectStatus, ServiceAccountKey, StoredKeyInfo};
use crate::assets::is_valid_project_id;
use crate::crypto::{EncryptedField, EncryptionContext, EnvelopeCipher};
use crate::store::{CredentialStatus, Store, StoredCredential};

/// Name bound into the encryption context of every stored key.
const KEY_FIELD: &str = "service_account_json";

/// Stores, loads and revokes GCP service account keys.
#[derive(Debug, Clone)]
pub struct CredentialService {
    store: Store,
    cipher: EnvelopeCipher,
}

fn check_project_id(project_id: &str) -> Result<(), CredentialError> {
    if is_valid_project_id(project_id) {
        Ok(())
    } else {
        Err(CredentialError::InvalidProjectId(project_id.to_string()))
    }
}

impl CredentialService {
    #[must_use]
    pub fn new(store: Store, cipher: EnvelopeCipher) -> Self {
        Self { store, cipher }
    }

    /// Validate, encrypt and save a key file for a project.
    ///
    /// Replaces any earlier key for the same project and reactivates it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad key files, or a crypto/store error.
    pub async fn store(
        &self,
        user_id: &str,
        project_id: &str,
        service_account_json: &str,
    ) -> Result<StoredKeyInfo, CredentialError> {
        check_project_id(project_id)?;
        let key = validate_service_account(service_account_json, project_id)?;
        let context = EncryptionContext::for_credentials(user_id, project_id);
        let sealed = self
            .cipher
            .encrypt_field(KEY_FIELD, service_account_json, &context)?;

        let now = Utc::now();
        let credential = StoredCredential {
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            credential_id: Uuid::new_v4(),
            service_account_email: key.client_email.clone(),
            key_type: key.key_type.clone(),
            envelope: sealed.envelope,
            key_id: self.cipher.key_id(),
            status: CredentialStatus::Active,
            created_at: now,
            updated_at: Some(now),
            last_used: None,
            revoked_at: None,
        };
        let replaced = self.store.upsert_credential(&credential).await?;

        tracing::info!(
            user_id = %user_id,
            project_id = %project_id,
            replaced,
            "Stored GCP credentials"
        );
        Ok(StoredKeyInfo {
            project_id: credential.project_id,
            credential_id: credential.credential_id.to_string(),
            service_account_email: credential.service_account_email,
            replaced,
        })
    }

    /// Decrypt the active key for a project and mark it used.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no key is stored, `Inactive` if it was revoked,
    /// or a crypto error if the envelope cannot be opened.
    pub async fn get(&self, user_id: &str, project_id: &str) -> Result<ServiceAccountKey, CredentialError> {
        check_project_id(project_id)?;
        let credential = self
            .store
            .get_credential(user_id, project_id)
            .await?
            .ok_or(CredentialError::NotFound)?;
        if credential.status != CredentialStatus::Active {
            return Err(CredentialError::Inactive);
        }

        let context = EncryptionContext::for_credentials(user_id, project_id);
        let field = EncryptedField {
            field_name: KEY_FIELD.to_string(),
            envelope: credential.envelope,
        };
        let json = self.cipher.decrypt_field(&field, &context)?;
        let key: ServiceAccountKey =
            serde_json::from_str(&json).map_err(CredentialError::InvalidJson)?;

        self.store
            .touch_credential(user_id, project_id, Utc::now())
            .await?;
        tracing::debug!(user_id = %user_id, project_id = %project_id, "Loaded GCP credentials");
        Ok(key)
    }

    /// All projects the user has attached keys to, including revoked ones.
    ///
    /// # Errors
    ///
    /// Returns a store error if listing fails.
    pub async fn list(&self, user_id: &str) -> Result<Vec<ProjectInfo>, CredentialError> {
        let credentials = self.store.list_credentials(user_id).await?;
        Ok(credentials.iter().map(ProjectInfo::from).collect())
    }

    /// Revoke the key for a project.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProjectId` for malformed ids, or `NotFound` if no
    /// key is stored.
    pub async fn revoke(&self, user_id: &str, project_id: &str) -> Result<(), CredentialError> {
        check_project_id(project_id)?;
        if !self
            .store
            .revoke_credential(user_id, project_id, Utc::now())
            .await?
        {
            return Err(CredentialError::NotFound);
        }
        tracing::info!(user_id = %user_id, project_id = %project_id, "Revoked GCP credentials");
        Ok(())
    }

    /// Connection status of a project's key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProjectId` for malformed ids, or `NotFound` if no
    /// key is stored.
    pub async fn status(&self, user_id: &str, project_id: &str) -> Result<ProjectStatus, CredentialError> {
        check_project_id(project_id)?;
        let credential = self
            .store
            .get_credential(user_id, project_id)
            .await?
            .ok_or(CredentialError::NotFound)?;
        Ok(ProjectInfo::from(&credential).into())
    }
}
