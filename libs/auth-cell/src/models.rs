use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::auth::UserType;
use shared_models::error::AppError;
use shared_models::profile::{Profile, RegistrationData};

// ==============================================================================
// SESSION MODELS
// ==============================================================================

/// Who is acting in one browser tab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub user_type: UserType,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    AuthenticatingLogin,
    AuthenticatingSignup,
    Authenticated(Session),
}

/// A live credential held by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Credential change broadcast by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialEvent {
    SignedIn(Credential),
    SignedOut,
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub registration: RegistrationData,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub tab_id: String,
    pub session: Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub tab_id: String,
    pub authenticated: bool,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Registration rejected: {0}")]
    RegistrationRejected(String),

    #[error("User profile not found for {0}")]
    ProfileNotFound(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidInput(msg) => AppError::ValidationError(msg),
            AuthError::InvalidCredentials => AppError::Auth(err.to_string()),
            AuthError::RegistrationRejected(msg) => AppError::BadRequest(msg),
            AuthError::ProfileNotFound(_) => {
                AppError::NotFound("User profile not found. Please contact support.".to_string())
            }
            AuthError::NotAuthenticated => AppError::Auth(err.to_string()),
            AuthError::Provider(msg) => AppError::ExternalService(msg),
            AuthError::Store(msg) => AppError::Database(msg),
        }
    }
}
