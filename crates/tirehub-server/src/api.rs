use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tirehub_store::{ArchiveHistory, BackupHistory};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::backup::{BackupCreated, BackupService, RestoreCompleted};
use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub backup: BackupService,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/admin/backup", post(admin_backup))
        .route("/admin/restore", post(admin_restore))
        .route("/admin/restore/:file", post(admin_restore_file))
        .route("/admin/backups", get(admin_backup_history))
        .route("/admin/backups/files", get(admin_backup_files))
        .route("/admin/archives", get(admin_archive_history))
        .route("/database/:file", get(backup_download))
        .layer(DefaultBodyLimit::max(state.config.max_restore_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 500;

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

impl HistoryQuery {
    fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT)
    }
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ServerError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    // Constant-time comparison to prevent timing attacks on admin token.
    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

/// Optional acting user for audit rows, from `X-User-Id`.
fn acting_user(headers: &HeaderMap) -> Result<Option<Uuid>, ServerError> {
    let Some(value) = headers.get("x-user-id") else {
        return Ok(None);
    };
    let text = value
        .to_str()
        .map_err(|_| ServerError::BadRequest("X-User-Id is not valid text".into()))?;
    Uuid::parse_str(text.trim())
        .map(Some)
        .map_err(|e| ServerError::BadRequest(format!("Invalid X-User-Id: {e}")))
}

/// Run store and filesystem work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ServerError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ServerError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("Blocking task failed: {e}")))?
}

async fn admin_backup(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<BackupCreated>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let user = acting_user(&headers)?;

    let service = state.backup.clone();
    let created = blocking(move || service.create_backup(user)).await?;

    info!(file = %created.file, "Admin created backup");
    Ok(Json(created))
}

async fn admin_restore(
    headers: HeaderMap,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RestoreCompleted>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let user = acting_user(&headers)?;

    let service = state.backup.clone();
    let restored = blocking(move || service.restore_json(&body, user)).await?;

    info!(rows = restored.rows, "Admin restored backup");
    Ok(Json(restored))
}

async fn admin_restore_file(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Json<RestoreCompleted>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let user = acting_user(&headers)?;

    let service = state.backup.clone();
    let source = file.clone();
    let restored = blocking(move || service.restore_file(&source, user)).await?;

    info!(file = %file, rows = restored.rows, "Admin restored backup file");
    Ok(Json(restored))
}

async fn admin_backup_history(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<BackupHistory>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let service = state.backup.clone();
    let limit = query.limit();
    Ok(Json(blocking(move || service.backup_history(limit)).await?))
}

async fn admin_backup_files(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let service = state.backup.clone();
    Ok(Json(blocking(move || service.list_backups()).await?))
}

async fn admin_archive_history(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ArchiveHistory>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let service = state.backup.clone();
    let limit = query.limit();
    Ok(Json(blocking(move || service.archive_history(limit)).await?))
}

/// Download a backup file. Backups contain every user record, so this sits
/// behind the admin token like the rest of the admin surface.
async fn backup_download(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let service = state.backup.clone();
    let name = file.clone();
    let data = blocking(move || service.backup_file(&name)).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file}\""),
            ),
        ],
        data,
    ))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
