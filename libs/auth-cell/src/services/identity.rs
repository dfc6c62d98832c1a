use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Method, StatusCode};
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::UserType;

use crate::models::{AuthError, Credential, CredentialEvent};

const EVENT_CAPACITY: usize = 16;

/// External identity provider holding the live credential.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Credential, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        user_type: UserType,
    ) -> Result<Credential, AuthError>;

    /// Removes a credential, used to undo a half-finished signup.
    async fn delete_credential(&self, user_id: &str) -> Result<(), AuthError>;

    async fn current_user(&self) -> Option<Credential>;

    fn subscribe(&self) -> broadcast::Receiver<CredentialEvent>;
}

// ==============================================================================
// SUPABASE AUTH
// ==============================================================================

pub struct SupabaseIdentityProvider {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
    current: RwLock<Option<Credential>>,
    events: broadcast::Sender<CredentialEvent>,
}

impl SupabaseIdentityProvider {
    pub fn new(config: &AppConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            service_role_key: config.store_api_key().to_string(),
            current: RwLock::new(None),
            events,
        }
    }

    /// Provider already holding the credential presented by the caller.
    pub fn with_credential(config: &AppConfig, credential: Credential) -> Self {
        let provider = Self::new(config);
        Self {
            current: RwLock::new(Some(credential)),
            ..provider
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        api_key: &str,
        body: Option<Value>,
    ) -> Result<Value, (Option<StatusCode>, String)> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .header("apikey", api_key)
            .header(CONTENT_TYPE, "application/json");

        if api_key != self.anon_key {
            request = request.bearer_auth(api_key);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| (None, e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err((Some(status), upstream_message(&text)));
        }

        let text = response.text().await.map_err(|e| (Some(status), e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| (Some(status), e.to_string()))
    }

    async fn remember(&self, credential: &Credential) {
        *self.current.write().await = Some(credential.clone());
        let _ = self.events.send(CredentialEvent::SignedIn(credential.clone()));
    }
}

/// Human-readable message from a Supabase Auth error body.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

fn credential_from(body: &Value, fallback_email: &str) -> Result<Credential, AuthError> {
    let user = body.get("user").unwrap_or(body);
    let user_id = user
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::Provider("Identity provider returned no user id".to_string()))?;

    Ok(Credential {
        user_id: user_id.to_string(),
        email: user
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or(fallback_email)
            .to_string(),
        access_token: body
            .get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Credential, AuthError> {
        let body = json!({ "email": email, "password": password });

        let response = self
            .call(Method::POST, "/auth/v1/token?grant_type=password", &self.anon_key, Some(body))
            .await
            .map_err(|(status, message)| match status {
                Some(StatusCode::BAD_REQUEST) | Some(StatusCode::UNAUTHORIZED) => {
                    debug!("Sign-in rejected: {}", message);
                    AuthError::InvalidCredentials
                }
                _ => AuthError::Provider(message),
            })?;

        let credential = credential_from(&response, email)?;
        self.remember(&credential).await;
        Ok(credential)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        user_type: UserType,
    ) -> Result<Credential, AuthError> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "user_type": user_type }
        });

        let response = self
            .call(Method::POST, "/auth/v1/signup", &self.anon_key, Some(body))
            .await
            .map_err(|(status, message)| match status {
                Some(status) if status.is_client_error() => AuthError::RegistrationRejected(message),
                _ => AuthError::Provider(message),
            })?;

        let credential = credential_from(&response, email)?;
        info!("Created credential for {}", credential.user_id);
        self.remember(&credential).await;
        Ok(credential)
    }

    async fn delete_credential(&self, user_id: &str) -> Result<(), AuthError> {
        let path = format!("/auth/v1/admin/users/{}", user_id);

        self.call(Method::DELETE, &path, &self.service_role_key, None)
            .await
            .map_err(|(_, message)| AuthError::Provider(message))?;

        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|c| c.user_id == user_id) {
            *current = None;
            let _ = self.events.send(CredentialEvent::SignedOut);
        }
        warn!("Deleted credential {}", user_id);
        Ok(())
    }

    async fn current_user(&self) -> Option<Credential> {
        self.current.read().await.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<CredentialEvent> {
        self.events.subscribe()
    }
}

// ==============================================================================
// IN-MEMORY PROVIDER
// ==============================================================================

struct Account {
    user_id: String,
    password: String,
}

/// Identity provider kept in process memory, for local runs and tests.
pub struct MemoryIdentityProvider {
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<Credential>>,
    events: broadcast::Sender<CredentialEvent>,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            accounts: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            events,
        }
    }
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account without signing in; returns its user id.
    pub async fn register(&self, email: &str, password: &str) -> String {
        let user_id = Uuid::new_v4().to_string();
        self.accounts.write().await.insert(
            email.to_string(),
            Account {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );
        user_id
    }

    pub async fn has_account(&self, email: &str) -> bool {
        self.accounts.read().await.contains_key(email)
    }

    /// Drops the live credential, as when it expires upstream.
    pub async fn expire(&self) {
        *self.current.write().await = None;
        let _ = self.events.send(CredentialEvent::SignedOut);
    }

    async fn remember(&self, credential: &Credential) {
        *self.current.write().await = Some(credential.clone());
        let _ = self.events.send(CredentialEvent::SignedIn(credential.clone()));
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Credential, AuthError> {
        let user_id = {
            let accounts = self.accounts.read().await;
            match accounts.get(email) {
                Some(account) if account.password == password => account.user_id.clone(),
                _ => return Err(AuthError::InvalidCredentials),
            }
        };

        let credential = Credential {
            user_id,
            email: email.to_string(),
            access_token: None,
        };
        self.remember(&credential).await;
        Ok(credential)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _user_type: UserType,
    ) -> Result<Credential, AuthError> {
        if self.has_account(email).await {
            return Err(AuthError::RegistrationRejected("User already registered".to_string()));
        }

        let user_id = self.register(email, password).await;
        let credential = Credential {
            user_id,
            email: email.to_string(),
            access_token: None,
        };
        self.remember(&credential).await;
        Ok(credential)
    }

    async fn delete_credential(&self, user_id: &str) -> Result<(), AuthError> {
        self.accounts
            .write()
            .await
            .retain(|_, account| account.user_id != user_id);

        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|c| c.user_id == user_id) {
            *current = None;
            let _ = self.events.send(CredentialEvent::SignedOut);
        }
        Ok(())
    }

    async fn current_user(&self) -> Option<Credential> {
        self.current.read().await.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<CredentialEvent> {
        self.events.subscribe()
    }
}
