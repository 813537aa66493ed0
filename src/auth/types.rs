//! User account types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PLAN_TIER: &str = "free";
pub const ACTIVE_STATUS: &str = "active";

/// Display details of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub name: String,
    pub company: Option<String>,
}

impl Profile {
    #[must_use]
    pub fn new(first_name: &str, last_name: &str, company: Option<String>) -> Self {
        let first_name = first_name.trim().to_string();
        let last_name = last_name.trim().to_string();
        Self {
            name: format!("{first_name} {last_name}").trim().to_string(),
            first_name,
            last_name,
            company: company.filter(|c| !c.trim().is_empty()),
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    /// Always lower-case.
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub profile: Profile,
    pub plan_tier: String,
    pub status: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New active free-tier user.
    #[must_use]
    pub fn new(email: String, password_hash: String, profile: Profile) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            email,
            password_hash,
            profile,
            plan_tier: DEFAULT_PLAN_TIER.to_string(),
            status: ACTIVE_STATUS.to_string(),
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_STATUS
    }

    /// Client-facing view without secrets.
    #[must_use]
    pub fn public(&self) -> PublicUser {
        PublicUser {
            user_id: self.user_id,
            email: self.email.clone(),
            profile: self.profile.clone(),
            plan_tier: self.plan_tier.clone(),
        }
    }
}

/// User as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub user_id: Uuid,
    pub email: String,
    pub profile: Profile,
    pub plan_tier: String,
}

/// Registration payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub company: Option<String>,
}

/// Login payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login or registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: PublicUser,
}

impl AuthResponse {
    #[must_use]
    pub fn bearer(access_token: String, user: &User) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            user: user.public(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_name() {
        let profile = Profile::new(" Ada ", "Lovelace", Some("  ".to_string()));
        assert_eq!(profile.name, "Ada Lovelace");
        assert_eq!(profile.first_name, "Ada");
        assert!(profile.company.is_none());
    }

    #[test]
    fn test_new_user_defaults() {
        let user = User::new(
            "ada@example.com".to_string(),
            "hash".to_string(),
            Profile::new("Ada", "Lovelace", Some("Analytical".to_string())),
        );
        assert_eq!(user.plan_tier, "free");
        assert!(user.is_active());
        assert!(!user.email_verified);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new(
            "ada@example.com".to_string(),
            "secret-hash".to_string(),
            Profile::new("Ada", "Lovelace", None),
        );
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));

        let response = AuthResponse::bearer("tok".to_string(), &user);
        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.user.email, "ada@example.com");
    }
}
