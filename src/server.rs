//!
//! wardbook HTTP server
//! --------------------
//! Axum-based HTTP API over the credential store, session gate and record
//! store.
//!
//! Responsibilities:
//! - Session management with a simple cookie + CSRF token model.
//! - Login/logout/register endpoints backed by the `credentials` module.
//! - Role-gated list and create endpoints over the record store; every gated
//!   route passes through `Session::permit` before touching records.
//! - First-run admin seeding and startup inventory logs.
//!
//! One server-side `Session` value exists per client connection (keyed by the
//! session cookie); handlers never consult any global login state.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{extract::State, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use anyhow::Context;
use getrandom::getrandom;

use crate::credentials::CredentialStore;
use crate::db::SharedDb;
use crate::error::{AppError, AuthError, AuthorizationError};
use crate::identity::{Operation, Role, Session};
use crate::records::{RecordStore, ReportSummary};

const SESSION_COOKIE: &str = "wardbook_session";

/// Resolved server configuration (flags/env already applied by the binary).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub db_file: String,
    pub admin_password: String,
}

/// Shared server state injected into all handlers.
///
/// Holds the store handles plus the session and CSRF maps. `sessions` maps a
/// session id to its `Session` gate; `csrf_tokens` maps the same id to the
/// token expected in `x-csrf-token` on mutating requests.
#[derive(Clone)]
pub struct AppState {
    pub creds: CredentialStore,
    pub records: RecordStore,
    pub sessions: Arc<RwLock<HashMap<String, Session>>>,
    pub csrf_tokens: Arc<RwLock<HashMap<String, String>>>,
}

/// Build the shared state over an open database, seeding the default admin
/// when no Admin credential exists yet.
pub fn build_state(db: SharedDb, admin_password: &str) -> anyhow::Result<AppState> {
    let creds = CredentialStore::new(db.clone()).context("creating credential store")?;
    creds
        .ensure_default_admin(admin_password)
        .context("seeding default admin")?;
    Ok(AppState {
        creds,
        records: RecordStore::new(db),
        sessions: Arc::new(RwLock::new(HashMap::new())),
        csrf_tokens: Arc::new(RwLock::new(HashMap::new())),
    })
}

/// Mount all routes over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "wardbook ok" }))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/csrf", get(get_csrf))
        .route("/register", post(register))
        .route("/credentials/reset", post(reset_credential))
        .route("/patients", get(list_patients).post(create_patient))
        .route("/doctors", get(list_doctors).post(create_doctor))
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route("/reports", get(reports))
        .with_state(state)
}

/// Start the wardbook HTTP server with the given configuration.
pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "wardbook starting. http_port={}, db_file={}",
        config.http_port, config.db_file
    );

    let db = SharedDb::open(&config.db_file)
        .with_context(|| format!("opening database file: {}", config.db_file))?;
    let state = build_state(db.clone(), &config.admin_password)?;

    match db.table_counts() {
        Ok((users, patients, doctors, appointments)) => info!(
            target: "startup",
            "inventory: users={}, patients={}, doctors={}, appointments={}",
            users, patients, doctors, appointments
        ),
        Err(e) => warn!("startup inventory unavailable: {}", e),
    }

    let app = build_router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    password: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct ResetPayload {
    username: String,
    old_password: String,
    new_password: String,
}

#[derive(Debug, Deserialize)]
struct PatientPayload {
    name: String,
    age: i64,
    gender: String,
    #[serde(default)]
    contact: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DoctorPayload {
    name: String,
    specialty: String,
    #[serde(default)]
    contact: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppointmentPayload {
    patient_id: i64,
    doctor_id: i64,
    appointment_date: String,
    #[serde(default = "default_status")]
    status: String,
    #[serde(default)]
    diagnosis: Option<String>,
}

fn default_status() -> String {
    "scheduled".to_string()
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn gen_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    let _ = getrandom(&mut buf);
    let mut out = String::with_capacity(bytes * 2);
    use std::fmt::Write as _;
    for b in &buf {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn set_session_cookie(sid: &str) -> HeaderValue {
    // HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Strict; Path=/", SESSION_COOKIE, sid)).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Strict; Path=/",
        SESSION_COOKIE
    ))
    .unwrap()
}

async fn session_for_headers(state: &AppState, headers: &HeaderMap) -> Option<Session> {
    let sid = parse_cookie(headers, SESSION_COOKIE)?;
    let map = state.sessions.read().await;
    map.get(&sid).cloned()
}

async fn validate_csrf(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(sid) = parse_cookie(headers, SESSION_COOKIE) else { return false };
    let Some(provided) = headers.get("x-csrf-token").and_then(|v| v.to_str().ok()).map(|s| s.to_string()) else {
        return false;
    };
    let cmap = state.csrf_tokens.read().await;
    match cmap.get(&sid) {
        Some(expected) => expected == &provided,
        None => false,
    }
}

fn err_response(e: AppError) -> Response {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"status":"error","code": e.code_str(), "error": e.message()}))).into_response()
}

fn csrf_rejected() -> Response {
    (StatusCode::FORBIDDEN, Json(json!({"status":"forbidden","error":"invalid csrf"}))).into_response()
}

/// Resolve the caller's session and run the policy check for `op`.
async fn gate(state: &AppState, headers: &HeaderMap, op: Operation) -> Result<Session, AppError> {
    let Some(session) = session_for_headers(state, headers).await else {
        return Err(AuthorizationError::NotAuthenticated.into());
    };
    session.permit(op)?;
    Ok(session)
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> Response {
    let mut session = Session::new();
    match session.login(&state.creds, &payload.username, &payload.password) {
        Ok(()) => {
            let sid = gen_hex(16);
            let csrf = gen_hex(32);
            {
                let mut map = state.sessions.write().await;
                map.insert(sid.clone(), session);
            }
            {
                let mut cmap = state.csrf_tokens.write().await;
                cmap.insert(sid.clone(), csrf);
            }
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&sid));
            (StatusCode::OK, headers, Json(json!({"status":"ok"}))).into_response()
        }
        Err(AuthError::Store(e)) => {
            error!("login unavailable: {}", e);
            err_response(AuthError::Store(e).into())
        }
        Err(e) => {
            // Generic denial: the body never says which check failed.
            info!(user = %payload.username, "login rejected");
            err_response(e.into())
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(sid) = parse_cookie(&headers, SESSION_COOKIE) {
        let mut map = state.sessions.write().await;
        if let Some(mut session) = map.remove(&sid) {
            session.logout();
        }
        let mut cmap = state.csrf_tokens.write().await;
        cmap.remove(&sid);
    }
    // Idempotent: a logout without a live session is still ok.
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok"}))).into_response()
}

async fn get_csrf(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if session_for_headers(&state, &headers).await.is_none() {
        return err_response(AuthorizationError::NotAuthenticated.into());
    }
    let Some(sid) = parse_cookie(&headers, SESSION_COOKIE) else {
        return err_response(AuthorizationError::NotAuthenticated.into());
    };
    let cmap = state.csrf_tokens.read().await;
    match cmap.get(&sid) {
        Some(token) => (StatusCode::OK, Json(json!({"status":"ok","csrf": token}))).into_response(),
        None => err_response(AppError::internal("csrf_missing", "csrf not available")),
    }
}

async fn register(State(state): State<AppState>, headers: HeaderMap, Json(payload): Json<RegisterPayload>) -> Response {
    let username = payload.username.trim();
    if username.is_empty() || username.len() > 64 {
        return err_response(AppError::user("bad_username", "username must be 1-64 characters"));
    }
    if payload.password.len() < 8 {
        return err_response(AppError::user("weak_password", "password must be at least 8 characters"));
    }
    let Ok(role) = payload.role.parse::<Role>() else {
        return err_response(AppError::user("unknown_role", "unrecognized role"));
    };
    // Self-registration is open for non-admin roles; creating an Admin
    // account is itself a gated operation.
    if role == Role::Admin {
        if let Err(e) = gate(&state, &headers, Operation::ManageUsers).await {
            return err_response(e);
        }
        if !validate_csrf(&state, &headers).await {
            return csrf_rejected();
        }
    }
    match state.creds.register(username, &payload.password, role) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok"}))).into_response(),
        Err(e) => err_response(e.into()),
    }
}

async fn reset_credential(State(state): State<AppState>, Json(payload): Json<ResetPayload>) -> Response {
    if payload.new_password.len() < 8 {
        return err_response(AppError::user("weak_password", "password must be at least 8 characters"));
    }
    // Self-authenticating: the old secret must verify, no session needed.
    match state.creds.reset_credential(&payload.username, &payload.old_password, &payload.new_password) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok"}))).into_response(),
        Err(AuthError::Store(e)) => {
            error!("credential reset unavailable: {}", e);
            err_response(AuthError::Store(e).into())
        }
        Err(e) => {
            info!(user = %payload.username, "credential reset rejected");
            err_response(e.into())
        }
    }
}

/// Render a gated list view, degrading to an empty row set when the record
/// store fails. The session survives a store failure; only the view is empty.
macro_rules! gated_list {
    ($state:expr, $headers:expr, $op:expr, $list:expr) => {{
        if let Err(e) = gate(&$state, &$headers, $op).await {
            return err_response(e);
        }
        match $list {
            Ok(rows) => (StatusCode::OK, Json(json!({"status":"ok","rows": rows}))).into_response(),
            Err(e) => {
                error!("list view degraded: {}", e);
                (
                    StatusCode::OK,
                    Json(json!({"status":"ok","rows": [], "warning": "record store unavailable"})),
                )
                    .into_response()
            }
        }
    }};
}

async fn list_patients(State(state): State<AppState>, headers: HeaderMap) -> Response {
    gated_list!(state, headers, Operation::ViewPatients, state.records.list_patients())
}

async fn list_doctors(State(state): State<AppState>, headers: HeaderMap) -> Response {
    gated_list!(state, headers, Operation::ViewDoctors, state.records.list_doctors())
}

async fn list_appointments(State(state): State<AppState>, headers: HeaderMap) -> Response {
    gated_list!(state, headers, Operation::ViewAppointments, state.records.list_appointments_joined())
}

async fn reports(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = gate(&state, &headers, Operation::ViewReports).await {
        return err_response(e);
    }
    match state.records.report_summary() {
        Ok(summary) => (StatusCode::OK, Json(json!({"status":"ok","summary": summary}))).into_response(),
        Err(e) => {
            error!("reports view degraded: {}", e);
            let empty = ReportSummary { total_patients: 0, total_doctors: 0, total_appointments: 0 };
            (
                StatusCode::OK,
                Json(json!({"status":"ok","summary": empty, "warning": "record store unavailable"})),
            )
                .into_response()
        }
    }
}

async fn create_patient(State(state): State<AppState>, headers: HeaderMap, Json(payload): Json<PatientPayload>) -> Response {
    if let Err(e) = gate(&state, &headers, Operation::AddPatient).await {
        return err_response(e);
    }
    if !validate_csrf(&state, &headers).await {
        return csrf_rejected();
    }
    if payload.name.trim().is_empty() {
        return err_response(AppError::user("bad_name", "patient name must not be empty"));
    }
    match state.records.create_patient(payload.name.trim(), payload.age, &payload.gender, payload.contact.as_deref()) {
        Ok(id) => (StatusCode::OK, Json(json!({"status":"ok","id": id}))).into_response(),
        Err(e) => {
            error!("create patient failed: {}", e);
            err_response(e.into())
        }
    }
}

async fn create_doctor(State(state): State<AppState>, headers: HeaderMap, Json(payload): Json<DoctorPayload>) -> Response {
    if let Err(e) = gate(&state, &headers, Operation::AddDoctor).await {
        return err_response(e);
    }
    if !validate_csrf(&state, &headers).await {
        return csrf_rejected();
    }
    if payload.name.trim().is_empty() {
        return err_response(AppError::user("bad_name", "doctor name must not be empty"));
    }
    match state.records.create_doctor(payload.name.trim(), &payload.specialty, payload.contact.as_deref()) {
        Ok(id) => (StatusCode::OK, Json(json!({"status":"ok","id": id}))).into_response(),
        Err(e) => {
            error!("create doctor failed: {}", e);
            err_response(e.into())
        }
    }
}

async fn create_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AppointmentPayload>,
) -> Response {
    if let Err(e) = gate(&state, &headers, Operation::AddAppointment).await {
        return err_response(e);
    }
    if !validate_csrf(&state, &headers).await {
        return csrf_rejected();
    }
    match state.records.create_appointment(
        payload.patient_id,
        payload.doctor_id,
        &payload.appointment_date,
        &payload.status,
        payload.diagnosis.as_deref(),
    ) {
        Ok(id) => (StatusCode::OK, Json(json!({"status":"ok","id": id}))).into_response(),
        Err(e) => err_response(e.into()),
    }
}
