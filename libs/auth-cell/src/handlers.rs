use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::HeaderMap,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_models::profile::Profile;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt;

use crate::models::{
    AuthError, AuthResponse, Credential, LoginRequest, SessionResponse, SignupRequest,
};
use crate::router::AuthState;
use crate::services::identity::{IdentityProvider, SupabaseIdentityProvider};
use crate::services::session::SessionManager;
use crate::services::users::UserDirectory;

pub const TAB_ID_HEADER: &str = "X-Tab-Id";

fn tab_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TAB_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn require_tab_id(headers: &HeaderMap) -> Result<String, AppError> {
    tab_id(headers)
        .ok_or_else(|| AppError::BadRequest(format!("Missing {} header", TAB_ID_HEADER)))
}

async fn manager_for(
    state: &AuthState,
    tab_id: &str,
    identity: Arc<dyn IdentityProvider>,
) -> SessionManager {
    let storage = state.tabs.tab(tab_id).await;
    SessionManager::new(identity, Arc::clone(&state.store), storage)
}

// ==============================================================================
// TOKEN HANDLERS
// ==============================================================================

pub async fn validate_token(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = bearer_token(&headers)?;
    let user = jwt::validate_token(token, &state.config.supabase_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn verify_token(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = bearer_token(&headers)?;
    let valid = jwt::validate_token(token, &state.config.supabase_jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

// ==============================================================================
// SESSION HANDLERS
// ==============================================================================

pub async fn login(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let tab_id = tab_id(&headers).unwrap_or_else(|| Uuid::new_v4().to_string());
    let identity = Arc::new(SupabaseIdentityProvider::new(&state.config));
    let mut manager = manager_for(&state, &tab_id, identity.clone()).await;

    let session = manager.login(request.email.trim(), &request.password).await?;
    let profile = manager.profile().await.ok();
    let access_token = identity.current_user().await.and_then(|c| c.access_token);

    Ok(Json(AuthResponse {
        tab_id,
        session,
        access_token,
        profile,
    }))
}

pub async fn signup(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    Json(request): Json<SignupRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let tab_id = tab_id(&headers).unwrap_or_else(|| Uuid::new_v4().to_string());
    let identity = Arc::new(SupabaseIdentityProvider::new(&state.config));
    let mut manager = manager_for(&state, &tab_id, identity.clone()).await;

    let (session, profile) = manager
        .signup(request.email.trim(), &request.password, &request.registration)
        .await?;
    let access_token = identity.current_user().await.and_then(|c| c.access_token);

    Ok(Json(AuthResponse {
        tab_id,
        session,
        access_token,
        profile: Some(profile),
    }))
}

pub async fn logout(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let tab_id = require_tab_id(&headers)?;
    let identity = Arc::new(SupabaseIdentityProvider::new(&state.config));
    let mut manager = manager_for(&state, &tab_id, identity).await;

    manager.logout().await;

    Ok(Json(json!({ "success": true, "tab_id": tab_id })))
}

/// Revalidates this tab's session against the caller's live token.
pub async fn current_session(
    State(state): State<Arc<AuthState>>,
    Extension(user): Extension<User>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, AppError> {
    let tab_id = require_tab_id(&headers)?;
    let credential = Credential {
        user_id: user.id.clone(),
        email: user.email.clone().unwrap_or_default(),
        access_token: bearer_token(&headers).ok().map(str::to_string),
    };
    let identity = Arc::new(SupabaseIdentityProvider::with_credential(&state.config, credential));
    let mut manager = manager_for(&state, &tab_id, identity).await;

    let session = manager.restore().await;
    let profile = match session {
        Some(_) => Some(manager.profile().await?),
        None => None,
    };

    Ok(Json(SessionResponse {
        tab_id,
        authenticated: session.is_some(),
        session,
        profile,
    }))
}

pub async fn get_profile(
    State(state): State<Arc<AuthState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Profile>, AppError> {
    debug!("Getting profile for user: {}", user.id);

    let directory = UserDirectory::new(Arc::clone(&state.store));
    let base = directory
        .base_user(&user.id)
        .await?
        .ok_or_else(|| AuthError::ProfileNotFound(user.id.clone()))?;

    let profile = directory
        .profile(&user.id, base.user_type)
        .await?
        .ok_or_else(|| AuthError::ProfileNotFound(user.id.clone()))?;

    Ok(Json(profile))
}
