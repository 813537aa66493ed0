//! Account registration, login and token verification.

use super::error::AuthError;
use super::password::{
    hash_password, normalize_email, validate_password, verify_password, DUMMY_PASSWORD_HASH,
};
use super::token::TokenIssuer;
use super::types::{AuthResponse, LoginRequest, Profile, RegisterRequest, User};
use crate::store::{Store, StoreError};

/// Account operations over the user store.
#[derive(Debug, Clone)]
pub struct Accounts {
    store: Store,
    tokens: TokenIssuer,
}

impl Accounts {
    #[must_use]
    pub fn new(store: Store, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Create an account and issue its first token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEmail`, `WeakPassword` or `EmailTaken` for bad input.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email)?;
        validate_password(&request.password)?;

        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_blocking(request.password).await?;
        let profile = Profile::new(&request.first_name, &request.last_name, request.company);
        let user = User::new(email, password_hash, profile);

        match self.store.insert_user(&user).await {
            Ok(()) => {}
            // Lost a race with a concurrent registration.
            Err(StoreError::Conflict(_)) => return Err(AuthError::EmailTaken),
            Err(e) => return Err(e.into()),
        }
        tracing::info!(user_id = %user.user_id, "Registered user");

        let token = self.tokens.issue(&user.user_id.to_string(), &user.email)?;
        Ok(AuthResponse::bearer(token, &user))
    }

    /// Check credentials and issue a token.
    ///
    /// Unknown emails still pay for one hash verification.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for any login failure.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let Ok(email) = normalize_email(&request.email) else {
            return Err(AuthError::InvalidCredentials);
        };
        let user = self.store.get_user_by_email(&email).await?;

        let hash = user
            .as_ref()
            .map_or_else(|| DUMMY_PASSWORD_HASH.to_string(), |u| u.password_hash.clone());
        let verified = verify_blocking(request.password, hash).await?;

        match user {
            Some(user) if verified && user.is_active() => {
                let token = self.tokens.issue(&user.user_id.to_string(), &user.email)?;
                tracing::info!(user_id = %user.user_id, "User logged in");
                Ok(AuthResponse::bearer(token, &user))
            }
            _ => {
                tracing::debug!("Login rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Resolve a bearer token to an active user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is invalid or the user
    /// no longer exists.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.tokens.verify(token)?;
        match self.store.get_user(&claims.sub).await? {
            Some(user) if user.is_active() => Ok(user),
            _ => Err(AuthError::InvalidToken),
        }
    }
}

async fn hash_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn accounts() -> Accounts {
        let store = Store::open_in_memory().await.unwrap();
        Accounts::new(store, TokenIssuer::new("test-secret", 24))
    }

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password: "correct horse".to_string(),
            company: None,
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let accounts = accounts().await;
        let registered = accounts.register(registration("Ada@Example.com ")).await.unwrap();
        assert_eq!(registered.user.email, "ada@example.com");
        assert_eq!(registered.token_type, "bearer");

        let login = accounts
            .login(LoginRequest {
                email: "ADA@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();
        let user = accounts.authenticate(&login.access_token).await.unwrap();
        assert_eq!(user.user_id, registered.user.user_id);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let accounts = accounts().await;
        accounts.register(registration("ada@example.com")).await.unwrap();
        let err = accounts.register(registration("ADA@example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let accounts = accounts().await;
        let err = accounts.register(registration("not-an-email")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail(_)));

        let mut weak = registration("ada@example.com");
        weak.password = "short".to_string();
        let err = accounts.register(weak).await.unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword(8)));
    }

    #[tokio::test]
    async fn test_login_failures_look_the_same() {
        let accounts = accounts().await;
        accounts.register(registration("ada@example.com")).await.unwrap();

        let wrong_password = accounts
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "wrong password".to_string(),
            })
            .await
            .unwrap_err();
        let unknown = accounts
            .login(LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown.to_string());
        assert_eq!(unknown.to_string(), "Invalid email or password");
    }

    #[tokio::test]
    async fn test_authenticate_rejects_garbage() {
        let accounts = accounts().await;
        assert!(matches!(
            accounts.authenticate("not.a.token").await,
            Err(AuthError::InvalidToken)
        ));
    }
}
