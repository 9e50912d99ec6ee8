// 🌐 HTTP API - thin axum layer over the library operations
// Authentication is left to whatever fronts this service.

use crate::config::DrawConfig;
use crate::db::{self, Entry};
use crate::draw::{draw, reset_selection, DrawRng};
use crate::error::DrawError;
use crate::export::export_csv;
use crate::registration::{check_in, clear_entries, register_entry, update_criteria, Registration};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub draw: DrawConfig,
    pub clear_password: Option<String>,
}

impl AppState {
    pub fn new(conn: Connection, draw: DrawConfig, clear_password: Option<String>) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            draw,
            clear_password,
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Draw(DrawError::Configuration("database lock poisoned".to_string())))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Debug)]
enum ApiError {
    Draw(DrawError),
    Forbidden(&'static str),
}

impl From<DrawError> for ApiError {
    fn from(value: DrawError) -> Self {
        ApiError::Draw(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Forbidden(reason) => (StatusCode::FORBIDDEN, reason.to_string()),
            ApiError::Draw(err) => {
                let status = match &err {
                    DrawError::NotFound { .. } => StatusCode::NOT_FOUND,
                    DrawError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                    DrawError::Configuration(_)
                    | DrawError::Persistence(_)
                    | DrawError::Csv(_)
                    | DrawError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(error = %err, "request failed");
                }
                (status, err.to_string())
            }
        };

        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

/// Public view of a winner
#[derive(Serialize, Deserialize, Debug)]
struct WinnerResponse {
    name: String,
    handle: String,
}

impl From<Entry> for WinnerResponse {
    fn from(entry: Entry) -> Self {
        Self {
            name: entry.display_name(),
            handle: entry.handle,
        }
    }
}

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(alias = "instagram_handle")]
    handle: String,
    #[serde(default, alias = "fname")]
    first_name: Option<String>,
    #[serde(default, alias = "lname")]
    last_name: Option<String>,
}

#[derive(Deserialize)]
struct CheckInRequest {
    handle: String,
    #[serde(default = "default_true")]
    in_attendance: bool,
}

#[derive(Deserialize)]
struct CriteriaRequest {
    handle: String,
    criteria: [bool; 4],
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Default)]
struct DrawRequest {
    max_winners: Option<usize>,
    seed: Option<String>,
}

#[derive(Serialize)]
struct DrawResponse {
    seed: String,
    policy: String,
    pool_size: usize,
    winners: Vec<WinnerResponse>,
}

#[derive(Deserialize)]
struct ClearRequest {
    password: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/entries - Register one entrant
async fn create_entry(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let conn = state.conn()?;
    let registration = register_entry(
        &conn,
        &req.handle,
        req.first_name.as_deref(),
        req.last_name.as_deref(),
    )?;

    let status = match registration {
        Registration::Created { .. } => StatusCode::CREATED,
        Registration::AlreadyRegistered { .. } => StatusCode::OK,
    };
    info!(handle = registration.handle(), status = status.as_u16(), "registration request");
    Ok((status, Json(ApiResponse::ok(registration))).into_response())
}

/// GET /api/entries - All entries, newest first
async fn get_entries(State(state): State<AppState>) -> Result<Response, ApiError> {
    let conn = state.conn()?;
    let entries = db::list_entries(&conn)?;
    Ok(Json(ApiResponse::ok(entries)).into_response())
}

/// POST /api/checkin - Mark an entrant present (or not)
async fn check_in_entry(
    State(state): State<AppState>,
    Json(req): Json<CheckInRequest>,
) -> Result<Response, ApiError> {
    let conn = state.conn()?;
    if check_in(&conn, &req.handle, req.in_attendance)? {
        Ok(Json(ApiResponse::ok(req.in_attendance)).into_response())
    } else {
        Err(ApiError::Draw(DrawError::InvalidArgument(format!(
            "unknown handle '{}'",
            req.handle
        ))))
    }
}

/// POST /api/criteria - Correct an entrant's c1..c4 without re-importing
async fn set_entry_criteria(
    State(state): State<AppState>,
    Json(req): Json<CriteriaRequest>,
) -> Result<Response, ApiError> {
    let conn = state.conn()?;
    if update_criteria(&conn, &req.handle, req.criteria)? {
        Ok(Json(ApiResponse::ok(req.criteria)).into_response())
    } else {
        Err(ApiError::Draw(DrawError::InvalidArgument(format!(
            "unknown handle '{}'",
            req.handle
        ))))
    }
}

/// GET /api/winners - Currently selected entries
async fn get_winners(State(state): State<AppState>) -> Result<Response, ApiError> {
    let conn = state.conn()?;
    let winners: Vec<WinnerResponse> = db::list_winners(&conn)?.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(winners)).into_response())
}

/// POST /api/draw - Run a draw with the deployment's policy
async fn run_draw(
    State(state): State<AppState>,
    body: Option<Json<DrawRequest>>,
) -> Result<Response, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let max_winners = req.max_winners.unwrap_or(state.draw.max_winners);
    let mut rng = match req.seed.as_deref() {
        Some(seed) => DrawRng::from_seed(seed),
        None => DrawRng::from_entropy(),
    };

    let mut conn = state.conn()?;
    let outcome = draw(&mut conn, state.draw.policy, max_winners, &mut rng)?;

    let response = DrawResponse {
        seed: outcome.seed,
        policy: outcome.policy.to_string(),
        pool_size: outcome.pool_size,
        winners: outcome.winners.into_iter().map(Into::into).collect(),
    };
    Ok(Json(ApiResponse::ok(response)).into_response())
}

/// POST /api/reset - Clear all selections
async fn run_reset(State(state): State<AppState>) -> Result<Response, ApiError> {
    let mut conn = state.conn()?;
    let cleared = reset_selection(&mut conn)?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "cleared": cleared }))).into_response())
}

/// POST /api/clear - Delete every entry (password protected)
async fn clear_all(
    State(state): State<AppState>,
    Json(req): Json<ClearRequest>,
) -> Result<Response, ApiError> {
    match state.clear_password.as_deref() {
        None => return Err(ApiError::Forbidden("clearing entries is disabled")),
        Some(expected) if expected != req.password => {
            return Err(ApiError::Forbidden("invalid clear password"))
        }
        Some(_) => {}
    }

    let mut conn = state.conn()?;
    let deleted = clear_entries(&mut conn)?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "deleted": deleted }))).into_response())
}

/// GET /api/export - Entries as CSV for audit
async fn export_entries(State(state): State<AppState>) -> Result<Response, ApiError> {
    let conn = state.conn()?;
    let mut body = Vec::new();
    export_csv(&conn, &mut body)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=entries.csv"),
        ],
        body,
    )
        .into_response())
}

/// Build the `/api` routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/entries", get(get_entries).post(create_entry))
        .route("/checkin", post(check_in_entry))
        .route("/criteria", post(set_entry_criteria))
        .route("/winners", get(get_winners))
        .route("/draw", post(run_draw))
        .route("/reset", post(run_reset))
        .route("/clear", post(clear_all))
        .route("/export", get(export_entries))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::eligibility::EligibilityPolicy;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn state(policy: EligibilityPolicy, clear_password: Option<&str>) -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        AppState::new(
            conn,
            DrawConfig {
                policy,
                max_winners: 4,
            },
            clear_password.map(str::to_string),
        )
    }

    async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let state = state(EligibilityPolicy::Open, None);
        let (status, body) = call(&state, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn register_then_duplicate() {
        let state = state(EligibilityPolicy::Open, None);
        let (status, body) = call(&state, "POST", "/entries", Some(serde_json::json!({"instagram_handle": "@Neo"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "created");

        let (status, body) = call(&state, "POST", "/entries", Some(serde_json::json!({"handle": "neo"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "already_registered");
    }

    #[tokio::test]
    async fn register_empty_handle_is_bad_request() {
        let state = state(EligibilityPolicy::Open, None);
        let (status, body) = call(&state, "POST", "/entries", Some(serde_json::json!({"handle": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn draw_and_reset_flow() {
        let state = state(EligibilityPolicy::Attendance, None);
        call(&state, "POST", "/entries", Some(serde_json::json!({"handle": "here", "fname": "Ada", "lname": "L"}))).await;
        call(&state, "POST", "/entries", Some(serde_json::json!({"handle": "away"}))).await;
        let (status, _) = call(&state, "POST", "/checkin", Some(serde_json::json!({"handle": "here"}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&state, "POST", "/draw", Some(serde_json::json!({"seed": "api"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["seed"], "api");
        assert_eq!(body["data"]["pool_size"], 1);
        assert_eq!(body["data"]["winners"][0]["handle"], "here");
        assert_eq!(body["data"]["winners"][0]["name"], "Ada L");

        let (_, body) = call(&state, "GET", "/winners", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (_, body) = call(&state, "POST", "/reset", None).await;
        assert_eq!(body["data"]["cleared"], 1);

        let (_, body) = call(&state, "GET", "/winners", None).await;
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn criteria_update_changes_eligibility() {
        let state = state(EligibilityPolicy::Criteria, None);
        call(&state, "POST", "/entries", Some(serde_json::json!({"handle": "late"}))).await;

        let (_, body) = call(&state, "POST", "/draw", Some(serde_json::json!({"seed": "before"}))).await;
        assert_eq!(body["data"]["pool_size"], 0);

        let (status, _) = call(
            &state,
            "POST",
            "/criteria",
            Some(serde_json::json!({"handle": "@Late", "criteria": [true, true, true, true]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&state, "POST", "/draw", Some(serde_json::json!({"seed": "after"}))).await;
        assert_eq!(body["data"]["winners"][0]["handle"], "late");

        let (status, _) = call(
            &state,
            "POST",
            "/criteria",
            Some(serde_json::json!({"handle": "nobody", "criteria": [true, true, true, true]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn draw_rejects_zero_winners() {
        let state = state(EligibilityPolicy::Open, None);
        let (status, _) = call(&state, "POST", "/draw", Some(serde_json::json!({"max_winners": 0}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn clear_requires_password() {
        let disabled = state(EligibilityPolicy::Open, None);
        let (status, _) = call(&disabled, "POST", "/clear", Some(serde_json::json!({"password": "x"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let state = state(EligibilityPolicy::Open, Some("s3cret"));
        call(&state, "POST", "/entries", Some(serde_json::json!({"handle": "gone"}))).await;

        let (status, _) = call(&state, "POST", "/clear", Some(serde_json::json!({"password": "wrong"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(&state, "POST", "/clear", Some(serde_json::json!({"password": "s3cret"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], 1);
    }

    #[tokio::test]
    async fn export_is_csv() {
        let state = state(EligibilityPolicy::Open, None);
        call(&state, "POST", "/entries", Some(serde_json::json!({"handle": "csvuser"}))).await;

        let request = Request::builder().uri("/export").body(Body::empty()).unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.lines().nth(1).unwrap().contains("csvuser"));
    }
}
