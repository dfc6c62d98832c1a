use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use shared_database::DocumentStore;
use shared_models::profile::{Profile, RegistrationData};

use crate::models::{AuthError, CredentialEvent, Session, SessionState};
use crate::services::identity::IdentityProvider;
use crate::services::users::UserDirectory;
use crate::services::validation::{validate_email, validate_password, validate_registration};

/// Storage scoped to a single browser tab.
#[async_trait]
pub trait TabStorage: Send + Sync {
    async fn load(&self) -> Option<Session>;
    async fn save(&self, session: &Session);
    async fn clear(&self);
}

#[derive(Default)]
pub struct MemoryTabStorage {
    session: Mutex<Option<Session>>,
}

impl MemoryTabStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TabStorage for MemoryTabStorage {
    async fn load(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    async fn save(&self, session: &Session) {
        *self.session.lock().await = Some(session.clone());
    }

    async fn clear(&self) {
        *self.session.lock().await = None;
    }
}

/// Server-side tab storages keyed by the client's tab id.
#[derive(Default)]
pub struct TabSessions {
    tabs: RwLock<HashMap<String, Arc<MemoryTabStorage>>>,
}

impl TabSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn tab(&self, tab_id: &str) -> Arc<MemoryTabStorage> {
        if let Some(storage) = self.tabs.read().await.get(tab_id) {
            return Arc::clone(storage);
        }

        let mut tabs = self.tabs.write().await;
        Arc::clone(tabs.entry(tab_id.to_string()).or_default())
    }
}

/// Login state of one tab, cross-checked against the identity provider.
pub struct SessionManager {
    identity: Arc<dyn IdentityProvider>,
    directory: UserDirectory,
    storage: Arc<dyn TabStorage>,
    state: SessionState,
}

impl SessionManager {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn TabStorage>,
    ) -> Self {
        Self {
            identity,
            directory: UserDirectory::new(store),
            storage,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<Session, AuthError> {
        validate_email(email)?;
        validate_password(password)?;

        self.state = SessionState::AuthenticatingLogin;

        let result = self.sign_in(email, password).await;
        match result {
            Ok(session) => {
                self.establish(session.clone()).await;
                info!("User {} logged in", session.user_id);
                Ok(session)
            }
            Err(err) => {
                self.state = SessionState::Unauthenticated;
                Err(err)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let credential = self.identity.sign_in(email, password).await?;

        let Some(base) = self.directory.base_user(&credential.user_id).await? else {
            error!(
                "Credential {} has no user record; account data is inconsistent",
                credential.user_id
            );
            return Err(AuthError::ProfileNotFound(credential.user_id));
        };

        Ok(Session {
            user_id: base.id,
            user_type: base.user_type,
            email: base.email,
        })
    }

    pub async fn signup(
        &mut self,
        email: &str,
        password: &str,
        registration: &RegistrationData,
    ) -> Result<(Session, Profile), AuthError> {
        validate_email(email)?;
        validate_password(password)?;
        validate_registration(registration)?;

        self.state = SessionState::AuthenticatingSignup;

        let credential = match self
            .identity
            .sign_up(email, password, registration.user_type())
            .await
        {
            Ok(credential) => credential,
            Err(err) => {
                self.state = SessionState::Unauthenticated;
                return Err(err);
            }
        };

        let profile = match self
            .directory
            .create_user(&credential.user_id, email, registration)
            .await
        {
            Ok(profile) => profile,
            Err(err) => {
                warn!("Signup for {} failed after credential creation: {}", email, err);
                if let Err(cleanup) = self.identity.delete_credential(&credential.user_id).await {
                    error!(
                        "Failed to delete orphaned credential {}: {}",
                        credential.user_id, cleanup
                    );
                }
                self.state = SessionState::Unauthenticated;
                return Err(err);
            }
        };

        let session = Session {
            user_id: credential.user_id,
            user_type: registration.user_type(),
            email: email.to_string(),
        };
        self.establish(session.clone()).await;
        info!("User {} signed up as {}", session.user_id, session.user_type);

        Ok((session, profile))
    }

    /// Forgets this tab's session. The provider credential stays valid.
    pub async fn logout(&mut self) {
        self.storage.clear().await;
        if let SessionState::Authenticated(session) = &self.state {
            info!("User {} logged out", session.user_id);
        }
        self.state = SessionState::Unauthenticated;
    }

    /// Revalidates the stored session at process start.
    pub async fn restore(&mut self) -> Option<Session> {
        let Some(stored) = self.storage.load().await else {
            self.state = SessionState::Unauthenticated;
            return None;
        };

        match self.identity.current_user().await {
            Some(credential) if credential.user_id == stored.user_id => {}
            Some(credential) => {
                warn!(
                    "Stored session {} does not match live credential {}",
                    stored.user_id, credential.user_id
                );
                return self.invalidate().await;
            }
            None => {
                debug!("No live credential for stored session {}", stored.user_id);
                return self.invalidate().await;
            }
        }

        match self.directory.base_user(&stored.user_id).await {
            Ok(Some(base)) if base.user_type == stored.user_type => {
                self.state = SessionState::Authenticated(stored.clone());
                debug!("Restored session for {}", stored.user_id);
                Some(stored)
            }
            Ok(Some(base)) => {
                warn!(
                    "Stored session for {} claims {} but record says {}",
                    stored.user_id, stored.user_type, base.user_type
                );
                self.invalidate().await
            }
            Ok(None) => {
                warn!("User record {} disappeared", stored.user_id);
                self.invalidate().await
            }
            Err(err) => {
                warn!("Could not revalidate session {}: {}", stored.user_id, err);
                self.invalidate().await
            }
        }
    }

    /// Applies a provider notification unless this tab holds its own session.
    pub async fn apply_credential_event(&mut self, event: CredentialEvent) {
        if let Some(local) = self.storage.load().await {
            match event {
                CredentialEvent::SignedOut => {
                    info!("Credential for {} is gone; ending tab session", local.user_id);
                    self.invalidate().await;
                }
                CredentialEvent::SignedIn(credential) if credential.user_id != local.user_id => {
                    debug!(
                        "Ignoring sign-in of {} while tab holds {}",
                        credential.user_id, local.user_id
                    );
                }
                CredentialEvent::SignedIn(_) => {}
            }
            return;
        }

        let CredentialEvent::SignedIn(credential) = event else {
            return;
        };

        match self.directory.base_user(&credential.user_id).await {
            Ok(Some(base)) => {
                let session = Session {
                    user_id: base.id,
                    user_type: base.user_type,
                    email: base.email,
                };
                self.establish(session).await;
            }
            Ok(None) => {
                error!(
                    "Credential {} has no user record; account data is inconsistent",
                    credential.user_id
                );
            }
            Err(err) => warn!("Ignoring credential event for {}: {}", credential.user_id, err),
        }
    }

    pub async fn profile(&self) -> Result<Profile, AuthError> {
        let session = self.session().ok_or(AuthError::NotAuthenticated)?;

        self.directory
            .profile(&session.user_id, session.user_type)
            .await?
            .ok_or_else(|| {
                error!("User {} has no {} profile", session.user_id, session.user_type);
                AuthError::ProfileNotFound(session.user_id.clone())
            })
    }

    async fn establish(&mut self, session: Session) {
        self.storage.save(&session).await;
        self.state = SessionState::Authenticated(session);
    }

    async fn invalidate(&mut self) -> Option<Session> {
        self.storage.clear().await;
        self.state = SessionState::Unauthenticated;
        None
    }
}
