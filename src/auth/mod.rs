//! User accounts: Argon2id passwords and HS256 access tokens.

mod error;
mod password;
mod service;
mod token;
mod types;

pub use error::AuthError;
pub use password::{
    hash_password, normalize_email, validate_password, verify_password, DUMMY_PASSWORD_HASH,
    MIN_PASSWORD_LEN,
};
pub use service::Accounts;
pub use token::{Claims, TokenIssuer};
pub use types::{
    AuthResponse, LoginRequest, Profile, PublicUser, RegisterRequest, User, ACTIVE_STATUS,
    DEFAULT_PLAN_TIER,
};
