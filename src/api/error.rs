//! API error types and their HTTP mapping.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::assets::AssetError;
use crate::audit::AuditError;
use crate::auth::AuthError;
use crate::credentials::CredentialError;
use crate::crypto::CryptoError;
use crate::scanner::ScanError;
use crate::store::StoreError;

/// Errors returned by HTTP handlers.
///
/// Every variant renders as `{"detail": "..."}`.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// Rendered with `WWW-Authenticate: Bearer`.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// Details are logged, never returned.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Failed to bind the listener.
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors while opening the services behind the API.
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Asset(#[from] AssetError),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) | Self::Bind { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::BadRequest(msg) | Self::Unauthorized(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Internal(_) | Self::Bind { .. } => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(json!({ "detail": self.detail() }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) | AuthError::EmailTaken => {
                Self::BadRequest(err.to_string())
            }
            AuthError::InvalidCredentials | AuthError::InvalidToken => {
                Self::Unauthorized(err.to_string())
            }
            AuthError::Hash(_) | AuthError::Token(_) | AuthError::Store(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidJson(_)
            | CredentialError::MissingFields(_)
            | CredentialError::NotServiceAccount
            | CredentialError::ProjectMismatch { .. }
            | CredentialError::InvalidProjectId(_)
            | CredentialError::Inactive => Self::BadRequest(err.to_string()),
            CredentialError::NotFound => Self::NotFound(err.to_string()),
            CredentialError::Crypto(_) | CredentialError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::UnknownPolicy(_) | ScanError::EmptyCustomScan => {
                Self::BadRequest(err.to_string())
            }
            ScanError::Credential(e) => e.into(),
            ScanError::OpaOutput(_) | ScanError::Json(_) | ScanError::Asset(_) | ScanError::Store(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<AuditError> for ApiError {
    fn from(err: AuditError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_sets_challenge() {
        let response = ApiError::from(AuthError::InvalidCredentials).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(body_json(response).await["detail"], "Invalid email or password");
    }

    #[tokio::test]
    async fn test_internal_hides_details() {
        let response = ApiError::from(StoreError::TaskCancelled).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["detail"], "Internal server error");
    }

    #[test]
    fn test_credential_mapping() {
        assert_eq!(
            ApiError::from(CredentialError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(CredentialError::NotServiceAccount).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ScanError::Credential(CredentialError::NotFound)).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_bind_display() {
        let err = ApiError::Bind {
            address: "127.0.0.1:8000".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        assert!(err.to_string().contains("Failed to bind to 127.0.0.1:8000"));
    }
}
