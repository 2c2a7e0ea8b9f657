//! Unified application error model and mapping helpers.
//! Domain errors (credential store, session gate, record store) are typed enums;
//! `AppError` is the serde-tagged envelope the HTTP frontend sends to clients.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Failures from the embedded relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection failure: {0}")]
    ConnectionFailure(String),
    #[error("database query failure: {0}")]
    QueryFailure(String),
}

/// Failures raised by `CredentialStore::register`.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("a user with that name already exists")]
    DuplicateUsername,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures raised by `CredentialStore::verify` and session login.
///
/// `UnknownUser` and `InvalidSecret` render the same generic message so the
/// frontend cannot reveal which of the two checks failed. Code that needs to
/// distinguish them (tests, audit logging) matches on the variant.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    UnknownUser,
    #[error("invalid credentials")]
    InvalidSecret,
    #[error("authentication unavailable")]
    Store(#[from] StoreError),
}

/// Failures raised by the session gate's authorization checks.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("not logged in")]
    NotAuthenticated,
    #[error("permission denied")]
    InsufficientRole,
}

/// Failures raised by the record store's create operations.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("no patient with id {0}")]
    UnknownPatient(i64),
    #[error("no doctor with id {0}")]
    UnknownDoctor(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::Io { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::DuplicateUsername => AppError::conflict("duplicate_username", "a user with that name already exists"),
            RegistrationError::Store(e) => e.into(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            // Both credential failures collapse into one generic body.
            AuthError::UnknownUser | AuthError::InvalidSecret => AppError::auth("invalid_credentials", "invalid credentials"),
            AuthError::Store(e) => e.into(),
        }
    }
}

impl From<AuthorizationError> for AppError {
    fn from(err: AuthorizationError) -> Self {
        match err {
            AuthorizationError::NotAuthenticated => AppError::auth("not_authenticated", "not logged in"),
            AuthorizationError::InsufficientRole => AppError::forbidden("insufficient_role", "permission denied"),
        }
    }
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::UnknownPatient(id) => AppError::user("unknown_patient".to_string(), format!("no patient with id {}", id)),
            RecordError::UnknownDoctor(id) => AppError::user("unknown_doctor".to_string(), format!("no doctor with id {}", id)),
            RecordError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        // Store detail goes to the log at the call site, never to the client.
        let _ = err;
        AppError::io("store_unavailable", "record store unavailable")
    }
}
