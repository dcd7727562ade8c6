use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use google_client::{DriveClient, DriveConfig, IdentityClient};
use serde::Deserialize;
use server_api::{
    advance_task, attach_document, case_page, change_assignee, dashboard_counts, get_case, health,
    history_view, list_cases, list_users, login_demo, login_with_google, register_case,
    request_cancel, ApiContext, DocumentUpload,
};
use shared::{
    domain::{CaseId, OnboardingCase, TaskId, User, UserId},
    error::{ApiError, ErrorCode},
    protocol::{
        ActorRequest, AdvanceOutcome, AssigneeRequest, CancelCaseRequest, CaseListQuery, CasePage,
        CreateCaseRequest, DashboardCounts, GoogleLoginRequest, HistoryView, LoginResponse,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

mod config;

use crate::config::{load_settings, prepare_database_url};

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;
const DEFAULT_UPLOAD_NAME: &str = "upload";

#[derive(Clone)]
struct AppState {
    api: ApiContext,
    max_upload_bytes: usize,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    task_id: Option<TaskId>,
}

#[derive(Debug, Deserialize)]
struct ActorQuery {
    actor_id: UserId,
}

type Rejection = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let userinfo_url = Url::parse(&settings.userinfo_url).context("invalid userinfo_url")?;
    let upload_url = Url::parse(&settings.drive_upload_url).context("invalid drive_upload_url")?;
    let api = ApiContext {
        store: Arc::new(storage),
        identity: IdentityClient::new(userinfo_url),
        drive: DriveClient::new(DriveConfig {
            upload_url,
            folder_id: settings.drive_folder_id.clone(),
            demo_token: settings.demo_token.clone(),
            demo_latency: settings.demo_latency(),
        }),
    };

    let state = AppState {
        api,
        max_upload_bytes: settings.max_upload_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/google", post(http_login_google))
        .route("/auth/demo", post(http_login_demo))
        .route("/users", get(http_list_users))
        .route("/dashboard", get(http_dashboard))
        .route("/cases", get(http_list_cases).post(http_create_case))
        .route("/cases/:case_id", get(http_get_case))
        .route("/cases/:case_id/history", get(http_case_history))
        .route("/cases/:case_id/cancel", post(http_cancel_case))
        .route(
            "/cases/:case_id/tasks/:task_id/advance",
            post(http_advance_task),
        )
        .route(
            "/cases/:case_id/tasks/:task_id/assignee",
            put(http_change_assignee),
        )
        .route(
            "/cases/:case_id/tasks/:task_id/attachment",
            post(http_attach_document),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

fn reject(err: ApiError) -> Rejection {
    let status = match err.code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Upstream => StatusCode::BAD_GATEWAY,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, Rejection> {
    health(&state.api).await.map_err(reject)?;
    Ok("ok")
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn http_login_google(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<GoogleLoginRequest>,
) -> Result<Json<LoginResponse>, Rejection> {
    if req.access_token.trim().is_empty() {
        return Err(reject(ApiError::validation("access_token is required")));
    }
    let agent = req.user_agent.or_else(|| user_agent(&headers));
    let response = login_with_google(&state.api, &req.access_token, agent.as_deref()).await;
    Ok(Json(response))
}

async fn http_login_demo(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<LoginResponse> {
    let agent = user_agent(&headers);
    Json(login_demo(&state.api, agent.as_deref()).await)
}

async fn http_list_users(State(state): State<Arc<AppState>>) -> Json<Vec<User>> {
    Json(list_users(&state.api).await)
}

async fn http_dashboard(State(state): State<Arc<AppState>>) -> Json<DashboardCounts> {
    let cases = list_cases(&state.api).await;
    Json(dashboard_counts(&cases))
}

async fn http_list_cases(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CaseListQuery>,
) -> Json<CasePage> {
    let cases = list_cases(&state.api).await;
    Json(case_page(&cases, &query))
}

async fn http_create_case(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCaseRequest>,
) -> Result<(StatusCode, Json<OnboardingCase>), Rejection> {
    let case = register_case(&state.api, req.form, req.actor_id)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(case)))
}

async fn http_get_case(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<CaseId>,
) -> Result<Json<OnboardingCase>, Rejection> {
    let case = get_case(&state.api, case_id).await.map_err(reject)?;
    Ok(Json(case))
}

async fn http_case_history(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<CaseId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryView>, Rejection> {
    let case = get_case(&state.api, case_id).await.map_err(reject)?;
    let view = history_view(&case, query.task_id).map_err(reject)?;
    Ok(Json(view))
}

async fn http_advance_task(
    State(state): State<Arc<AppState>>,
    Path((case_id, task_id)): Path<(CaseId, TaskId)>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<AdvanceOutcome>, Rejection> {
    let outcome = advance_task(&state.api, case_id, task_id, req.actor_id)
        .await
        .map_err(reject)?;
    Ok(Json(outcome))
}

async fn http_change_assignee(
    State(state): State<Arc<AppState>>,
    Path((case_id, task_id)): Path<(CaseId, TaskId)>,
    Json(req): Json<AssigneeRequest>,
) -> Result<Json<OnboardingCase>, Rejection> {
    let case = change_assignee(&state.api, case_id, task_id, req.assignee_id, req.actor_id)
        .await
        .map_err(reject)?;
    Ok(Json(case))
}

async fn http_cancel_case(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<CaseId>,
    Json(req): Json<CancelCaseRequest>,
) -> Result<Json<OnboardingCase>, Rejection> {
    let case = request_cancel(&state.api, case_id, &req.reason, req.actor_id)
        .await
        .map_err(reject)?;
    Ok(Json(case))
}

async fn http_attach_document(
    State(state): State<Arc<AppState>>,
    Path((case_id, task_id)): Path<(CaseId, TaskId)>,
    Query(actor): Query<ActorQuery>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<OnboardingCase>, Rejection> {
    let credential = bearer_credential(&headers).ok_or_else(|| {
        reject(ApiError::validation("an Authorization: Bearer credential is required"))
    })?;
    let upload = read_upload(multipart, state.max_upload_bytes).await?;

    let case = attach_document(
        &state.api,
        case_id,
        task_id,
        credential,
        upload,
        actor.actor_id,
    )
    .await
    .map_err(reject)?;
    Ok(Json(case))
}

fn bearer_credential(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|credential| !credential.is_empty())
}

/// Pulls the `file` field out of the form and applies the size rules.
async fn read_upload(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<DocumentUpload, Rejection> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "malformed multipart body");
        reject(ApiError::validation(format!("malformed multipart body: {e}")))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_UPLOAD_NAME)
            .to_string();
        let mime_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| reject(ApiError::validation(format!("failed to read file: {e}"))))?;

        if bytes.is_empty() {
            return Err(reject(ApiError::validation("attachment body cannot be empty")));
        }
        if bytes.len() > max_bytes {
            return Err((
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(ApiError::validation(format!("attachment exceeds {max_bytes} bytes"))),
            ));
        }
        return Ok(DocumentUpload {
            file_name,
            mime_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(reject(ApiError::validation("multipart field 'file' is required")))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
