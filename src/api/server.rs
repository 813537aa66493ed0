//! API HTTP server with axum router and graceful shutdown.

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::handlers::{
    audit_anomalies, audit_trail, dashboard, events_sse, get_report, health, list_projects,
    list_reports, login, project_status, register, revoke_credentials, root, scan,
    store_credentials, upload_credentials, verify,
};
use super::state::AppState;

/// Build the CORS layer for the configured origins.
///
/// An empty list is permissive. Origins that are not valid header values
/// are skipped with a warning.
#[must_use]
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// HTTP server for the compliance API.
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Get the configured address as a string.
    #[must_use]
    pub fn address(&self) -> String {
        self.state.config.server.address()
    }

    /// Handle used to stop the server.
    #[must_use]
    pub fn cancel_token(&self) -> tokio_util::sync::CancellationToken {
        self.state.cancel.clone()
    }

    /// Build the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        router(self.state.clone())
    }

    /// Run the server, binding to the configured address.
    ///
    /// The server will run until the cancellation token is triggered,
    /// at which point it will perform a graceful shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self) -> Result<(), ApiError> {
        let address = self.address();
        let cancel = self.state.cancel.clone();
        let app = self.build_router();

        tracing::info!(address = %address, environment = %self.state.config.environment, "Starting API server");

        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ApiError::Bind {
                address: address.clone(),
                source,
            })?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("API server shutting down gracefully");
            })
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}

/// The full API router over the given state.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/verify", get(verify))
        .route("/api/v1/scan", post(scan))
        .route("/api/v1/reports", get(list_reports))
        .route("/api/v1/reports/:scan_id", get(get_report))
        .route("/api/v1/dashboard", get(dashboard))
        .route("/api/v1/gcp/credentials", post(store_credentials))
        .route("/api/v1/gcp/credentials/upload", post(upload_credentials))
        .route("/api/v1/gcp/projects", get(list_projects))
        .route(
            "/api/v1/gcp/projects/:project_id/credentials",
            delete(revoke_credentials),
        )
        .route("/api/v1/gcp/projects/:project_id/status", get(project_status))
        .route("/api/v1/audit/trail", get(audit_trail))
        .route("/api/v1/audit/anomalies", get(audit_anomalies))
        .route("/api/v1/events", get(events_sse))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::assets::FileAssetSource;
    use crate::audit::AuditLog;
    use crate::config::GuardConfig;
    use crate::crypto::StaticKeyProvider;
    use crate::store::Store;

    async fn server(config: GuardConfig) -> ApiServer {
        ApiServer::new(AppState::new(
            config,
            Store::open_in_memory().await.unwrap(),
            AuditLog::open_in_memory().await.unwrap(),
            Arc::new(StaticKeyProvider::random()),
            Arc::new(FileAssetSource::new(std::env::temp_dir())),
        ))
    }

    #[tokio::test]
    async fn test_server_address() {
        let server = server(GuardConfig::default()).await;
        assert_eq!(server.address(), "127.0.0.1:8000");
    }

    #[tokio::test]
    async fn test_server_custom_address() {
        let mut config = GuardConfig::default();
        config.server.host = "0.0.0.0".to_string();
        config.server.port = 9090;
        let server = server(config).await;
        assert_eq!(server.address(), "0.0.0.0:9090");
    }

    #[tokio::test]
    async fn test_build_router() {
        let server = server(GuardConfig::default()).await;
        // Just verify the router builds without panicking
        let _router = server.build_router();
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let mut config = GuardConfig::default();
        config.server.port = 0;
        let server = server(config).await;
        let cancel = server.cancel_token();
        cancel.cancel();
        server.run().await.unwrap();
    }

    #[test]
    fn test_cors_layer_variants() {
        let _permissive = cors_layer(&[]);
        let _listed = cors_layer(&["http://localhost:5173".to_string(), "bad\norigin".to_string()]);
    }
}
