//! Authentication error types.

use crate::store::StoreError;

/// Errors from registration, login and token handling.
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("User with this email already exists")]
    EmailTaken,

    /// Same message for unknown email and wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid authentication credentials")]
    InvalidToken,

    #[error("Failed to hash password: {0}")]
    Hash(String),

    #[error("Failed to issue token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid email or password"
        );
        assert_eq!(
            AuthError::WeakPassword(8).to_string(),
            "Password must be at least 8 characters"
        );
    }
}
