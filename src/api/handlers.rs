//! HTTP handlers for the CompliantGuard API.

use std::convert::Infallible;

use axum::extract::{Multipart, Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use super::error::ApiError;
use super::extract::{AuthUser, ClientInfo};
use super::state::{ApiEvent, AppState};
use super::types::{
    AnomaliesResponse, AnomalyQuery, CredentialRequest, CredentialResponse, HealthResponse,
    HealthServices, MessageResponse, ProjectsResponse, ReportsQuery, ReportsResponse,
    RootResponse, TrailQuery, TrailResponse, UploadQuery, VerifyResponse,
};
use crate::assets::is_valid_project_id;
use crate::audit::{AccessResult, AuditEvent, AuditEventBuilder, EventType, TrailFilter};
use crate::auth::{normalize_email, AuthError, AuthResponse, LoginRequest, RegisterRequest};
use crate::compliance::{ComplianceReport, DashboardData, ScanRequest, ScanStatus};
use crate::credentials::{CredentialError, ProjectStatus};
use crate::scanner::{ScanOutcome, ScanResponse};

fn audit(
    user_id: impl Into<String>,
    action: &str,
    resource_type: &str,
    result: AccessResult,
    client: &ClientInfo,
) -> AuditEventBuilder {
    AuditEvent::builder(user_id, action, resource_type, result)
        .ip_address(client.ip_address.clone())
        .user_agent(client.user_agent.clone())
}

fn check_project_id(project_id: &str) -> Result<(), ApiError> {
    if is_valid_project_id(project_id) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Invalid project id: {project_id}")))
    }
}

/// GET / - Service banner.
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "CompliantGuard API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
    })
}

/// GET /health - Liveness with a database probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, database) = match state.store.ping().await {
        Ok(()) => ("healthy", "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            ("degraded", "disconnected")
        }
    };
    Json(HealthResponse {
        status: status.to_string(),
        timestamp: Utc::now(),
        environment: state.config.environment.clone(),
        services: HealthServices {
            database: database.to_string(),
        },
    })
}

/// POST /api/v1/auth/register - Create an account and sign in.
pub async fn register(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = state.accounts.register(request).await?;
    state
        .record(
            audit(response.user.user_id.to_string(), "register", "user", AccessResult::Success, &client)
                .event_type(EventType::UserLogin)
                .build(),
        )
        .await;
    Ok(Json(response))
}

/// POST /api/v1/auth/login - Exchange email and password for a token.
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let attempted = normalize_email(&request.email).unwrap_or_else(|_| request.email.clone());

    match state.accounts.login(request).await {
        Ok(response) => {
            state
                .record(
                    audit(response.user.user_id.to_string(), "login", "user", AccessResult::Success, &client)
                        .event_type(EventType::UserLogin)
                        .build(),
                )
                .await;
            Ok(Json(response))
        }
        Err(e @ AuthError::InvalidCredentials) => {
            let subject = login_subject(&state, &attempted).await;
            state
                .record(
                    audit(subject, "login", "user", AccessResult::Denied, &client)
                        .event_type(EventType::UserLogin)
                        .error_message(e.to_string())
                        .build(),
                )
                .await;
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Audit subject for a failed login.
///
/// Denials against a registered email belong to that account, so its
/// anomaly checks and alert stream see them. Unknown emails are kept as
/// typed.
async fn login_subject(state: &AppState, email: &str) -> String {
    match state.store.get_user_by_email(email).await {
        Ok(Some(user)) => user.user_id.to_string(),
        Ok(None) => email.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to resolve login email for audit");
            email.to_string()
        }
    }
}

/// GET /api/v1/auth/verify - Return the caller behind the token.
pub async fn verify(AuthUser(user): AuthUser) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        user: user.public(),
    })
}

/// POST /api/v1/scan - Scan a project with stored credentials.
pub async fn scan(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, ApiError> {
    check_project_id(&request.project_id)?;
    let user_id = user.id();
    let started = std::time::Instant::now();
    let outcome = state.scans.run(&user_id, &request).await?;
    let response = ScanResponse::from(&outcome);

    let result = match (&outcome, response.status) {
        (ScanOutcome::NoCredentials { .. }, _) => AccessResult::NotFound,
        (ScanOutcome::Report(_), ScanStatus::Completed) => AccessResult::Success,
        (ScanOutcome::Report(_), ScanStatus::Failed) => AccessResult::Error,
    };
    state
        .record(
            audit(&user_id, "scan", "gcp_project", result, &client)
                .resource_id(&request.project_id)
                .duration_ms(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX))
                .context("scan_id", response.scan_id.to_string())
                .build(),
        )
        .await;

    if let ScanOutcome::Report(_) = outcome {
        let data = serde_json::to_value(&response).unwrap_or_default();
        state.publish(ApiEvent::new("scan_completed", &user_id, data));
    }
    Ok(Json(response))
}

/// GET /api/v1/reports - Page through the caller's scans, newest first.
pub async fn list_reports(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Query(query): Query<ReportsQuery>,
) -> Result<Json<ReportsResponse>, ApiError> {
    let limit = query.effective_limit();
    let user_id = user.id();
    let page = state.store.list_scans(&user_id, limit, query.offset).await?;
    state
        .record(
            audit(&user_id, "list_reports", "scan_report", AccessResult::Success, &client)
                .event_type(EventType::DataAccess)
                .context("returned", page.scans.len())
                .context("offset", query.offset)
                .build(),
        )
        .await;
    Ok(Json(ReportsResponse {
        reports: page.scans,
        total: page.total,
        limit,
        offset: query.offset,
    }))
}

/// GET /api/v1/reports/:scan_id - Full report with violations.
pub async fn get_report(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Path(scan_id): Path<String>,
) -> Result<Json<ComplianceReport>, ApiError> {
    let not_found = || ApiError::NotFound("Report not found".to_string());
    let user_id = user.id();
    let Ok(id) = Uuid::parse_str(&scan_id) else {
        return Err(not_found());
    };

    let report = state.store.get_report(&user_id, id).await?;
    let result = if report.is_some() {
        AccessResult::Success
    } else {
        AccessResult::NotFound
    };
    state
        .record(
            audit(&user_id, "view_report", "scan_report", result, &client)
                .event_type(EventType::DataAccess)
                .resource_id(&scan_id)
                .build(),
        )
        .await;

    report.map(Json).ok_or_else(not_found)
}

/// GET /api/v1/dashboard - Score, recent scans and severity summary.
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<DashboardData>, ApiError> {
    Ok(Json(state.store.dashboard(&user.id()).await?))
}

async fn store_key(
    state: &AppState,
    user_id: &str,
    project_id: &str,
    key_json: &str,
    client: &ClientInfo,
) -> Result<CredentialResponse, ApiError> {
    check_project_id(project_id)?;
    match state.credentials.store(user_id, project_id, key_json).await {
        Ok(info) => {
            state
                .record(
                    audit(user_id, "store_credentials", "gcp_credentials", AccessResult::Success, client)
                        .event_type(EventType::PermissionChange)
                        .resource_id(project_id)
                        .context("replaced", info.replaced)
                        .build(),
                )
                .await;
            Ok(CredentialResponse {
                message: "GCP credentials stored successfully".to_string(),
                project_id: info.project_id,
                credential_id: info.credential_id,
                service_account_email: info.service_account_email,
            })
        }
        Err(e) => {
            state
                .record(
                    audit(user_id, "store_credentials", "gcp_credentials", AccessResult::Error, client)
                        .event_type(EventType::PermissionChange)
                        .resource_id(project_id)
                        .error_message(e.to_string())
                        .build(),
                )
                .await;
            Err(e.into())
        }
    }
}

/// POST /api/v1/gcp/credentials - Store a service account key sent as JSON.
pub async fn store_credentials(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Json(request): Json<CredentialRequest>,
) -> Result<Json<CredentialResponse>, ApiError> {
    let response = store_key(&state, &user.id(), &request.project_id, &request.key_text(), &client).await?;
    Ok(Json(response))
}

/// POST /api/v1/gcp/credentials/upload - Store a service account key file.
pub async fn upload_credentials(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<CredentialResponse>, ApiError> {
    let bad_multipart = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(e.body_text());

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("file") {
            continue;
        }
        let is_json = field
            .file_name()
            .is_some_and(|name| name.to_ascii_lowercase().ends_with(".json"));
        if !is_json {
            return Err(ApiError::BadRequest("Only JSON files are allowed".to_string()));
        }
        let bytes = field.bytes().await.map_err(bad_multipart)?;
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|_| ApiError::BadRequest("Invalid JSON file format".to_string()))?;
        let response = store_key(&state, &user.id(), &query.project_id, &text, &client).await?;
        return Ok(Json(response));
    }
    Err(ApiError::BadRequest("No file uploaded".to_string()))
}

/// GET /api/v1/gcp/projects - Projects with stored credentials.
pub async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProjectsResponse>, ApiError> {
    let projects = state.credentials.list(&user.id()).await?;
    Ok(Json(ProjectsResponse { projects }))
}

/// DELETE /api/v1/gcp/projects/:project_id/credentials - Revoke credentials.
pub async fn revoke_credentials(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Path(project_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = user.id();
    let outcome = state.credentials.revoke(&user_id, &project_id).await;
    let result = match &outcome {
        Ok(()) => AccessResult::Success,
        Err(CredentialError::NotFound) => AccessResult::NotFound,
        Err(_) => AccessResult::Error,
    };
    state
        .record(
            audit(&user_id, "revoke_credentials", "gcp_credentials", result, &client)
                .event_type(EventType::PermissionChange)
                .resource_id(&project_id)
                .build(),
        )
        .await;

    outcome?;
    Ok(Json(MessageResponse::new(format!(
        "GCP credentials revoked for project {project_id}"
    ))))
}

/// GET /api/v1/gcp/projects/:project_id/status - Credential status.
pub async fn project_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectStatus>, ApiError> {
    match state.credentials.status(&user.id(), &project_id).await {
        Ok(status) => Ok(Json(status)),
        Err(CredentialError::NotFound) => Err(ApiError::NotFound("GCP project not found".to_string())),
        Err(e) => Err(e.into()),
    }
}

/// GET /api/v1/audit/trail - The caller's own audit records, newest first.
pub async fn audit_trail(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<TrailQuery>,
) -> Result<Json<TrailResponse>, ApiError> {
    let filter = TrailFilter::for_user(user.id()).limit(query.effective_limit());
    let records = state.audit.trail(&filter).await?;
    Ok(Json(TrailResponse { records }))
}

/// GET /api/v1/audit/anomalies - Unusual access patterns for the caller.
pub async fn audit_anomalies(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AnomalyQuery>,
) -> Result<Json<AnomaliesResponse>, ApiError> {
    let hours = query.effective_hours();
    let patterns = state.audit.detect_anomalies(&user.id(), hours).await?;
    Ok(Json(AnomaliesResponse { hours, patterns }))
}

/// GET /api/v1/events - SSE stream of the caller's scan completions and
/// security alerts.
pub async fn events_sse(
    State(state): State<AppState>,
    user: AuthUser,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let user_id = user.id();

    let scans = BroadcastStream::new(state.events.subscribe())
        .filter_map(|result| async move { result.ok() }); // Skip lagged messages
    let alerts = BroadcastStream::new(state.audit.subscribe()).filter_map(|result| async move {
        let alert = result.ok()?;
        let owner = alert.user_id.clone()?;
        let data = serde_json::to_value(&alert).ok()?;
        Some(ApiEvent::new(alert.event_type.as_str(), owner, data))
    });

    let stream = stream::select(scans, alerts).filter_map(move |event| {
        let visible = event.user_id == user_id;
        async move {
            if !visible {
                return None;
            }
            let data = serde_json::to_string(&json!({
                "event_type": event.event_type,
                "timestamp": event.timestamp,
                "data": event.data,
            }))
            .ok()?;
            Some(Ok(Event::default().event(&event.event_type).data(data)))
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
