use std::sync::Arc;

use anyhow::anyhow;
use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::Value;

use auth_cell::models::{AuthError, Credential, CredentialEvent, SessionState};
use auth_cell::services::identity::{IdentityProvider, MemoryIdentityProvider};
use auth_cell::services::session::{MemoryTabStorage, SessionManager, TabSessions, TabStorage};
use shared_database::{CasOutcome, Collection, DocumentStore, Filter, MemoryStore};
use shared_models::auth::UserType;
use shared_models::profile::{DoctorRegistration, PatientRegistration, Profile, RegistrationData};
use shared_utils::test_utils::MockSupabaseResponses;

const PASSWORD: &str = "s3cret-pass";

fn patient_registration() -> RegistrationData {
    RegistrationData::Patient(PatientRegistration {
        name: "Asha Rao".to_string(),
        phone: Some("+91 90000 00001".to_string()),
        ..Default::default()
    })
}

struct Harness {
    identity: Arc<MemoryIdentityProvider>,
    store: Arc<MemoryStore>,
}

impl Harness {
    fn new() -> Self {
        Self {
            identity: Arc::new(MemoryIdentityProvider::new()),
            store: Arc::new(MemoryStore::new()),
        }
    }

    fn manager(&self, storage: Arc<dyn TabStorage>) -> SessionManager {
        SessionManager::new(self.identity.clone(), self.store.clone(), storage)
    }

    async fn existing_patient(&self, email: &str) -> String {
        let user_id = self.identity.register(email, PASSWORD).await;
        self.store
            .set(
                &Collection::Users,
                &user_id,
                MockSupabaseResponses::base_user(&user_id, email, "patient"),
            )
            .await
            .unwrap();
        self.store
            .set(
                &Collection::Patients,
                &user_id,
                MockSupabaseResponses::patient_profile(&user_id, email),
            )
            .await
            .unwrap();
        user_id
    }
}

/// Fails every write to one collection.
struct FailingWrites {
    inner: MemoryStore,
    broken: Collection,
}

#[async_trait]
impl DocumentStore for FailingWrites {
    async fn get(&self, collection: &Collection, id: &str) -> anyhow::Result<Option<Value>> {
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &Collection, id: &str, document: Value) -> anyhow::Result<()> {
        if *collection == self.broken {
            return Err(anyhow!("write to {} refused", collection));
        }
        self.inner.set(collection, id, document).await
    }

    async fn update(&self, collection: &Collection, id: &str, fields: Value) -> anyhow::Result<()> {
        self.inner.update(collection, id, fields).await
    }

    async fn query(&self, collection: &Collection, filter: &Filter) -> anyhow::Result<Vec<Value>> {
        self.inner.query(collection, filter).await
    }

    async fn compare_and_set(
        &self,
        collection: &Collection,
        id: &str,
        path: &[&str],
        expected: &Value,
        new: Value,
    ) -> anyhow::Result<CasOutcome> {
        self.inner.compare_and_set(collection, id, path, expected, new).await
    }
}

#[tokio::test]
async fn login_establishes_and_persists_session() {
    let harness = Harness::new();
    let user_id = harness.existing_patient("asha@example.com").await;
    let storage = Arc::new(MemoryTabStorage::new());
    let mut manager = harness.manager(storage.clone());

    let session = manager.login("asha@example.com", PASSWORD).await.unwrap();

    assert_eq!(session.user_id, user_id);
    assert_eq!(session.user_type, UserType::Patient);
    assert_eq!(manager.state(), &SessionState::Authenticated(session.clone()));
    assert_eq!(storage.load().await, Some(session));
    assert_matches!(manager.profile().await.unwrap(), Profile::Patient(p) if p.name == "Asha Rao");
}

#[tokio::test]
async fn invalid_input_is_rejected_before_the_provider() {
    let harness = Harness::new();
    let mut manager = harness.manager(Arc::new(MemoryTabStorage::new()));

    assert_matches!(
        manager.login("not-an-email", PASSWORD).await,
        Err(AuthError::InvalidInput(_))
    );
    assert_matches!(
        manager.login("asha@example.com", "123").await,
        Err(AuthError::InvalidInput(_))
    );
    assert_eq!(manager.state(), &SessionState::Unauthenticated);
}

#[tokio::test]
async fn wrong_password_leaves_tab_unauthenticated() {
    let harness = Harness::new();
    harness.existing_patient("asha@example.com").await;
    let mut manager = harness.manager(Arc::new(MemoryTabStorage::new()));

    assert_matches!(
        manager.login("asha@example.com", "wrong-pass").await,
        Err(AuthError::InvalidCredentials)
    );
    assert_eq!(manager.state(), &SessionState::Unauthenticated);
}

#[tokio::test]
async fn login_without_user_record_is_profile_not_found() {
    let harness = Harness::new();
    let user_id = harness.identity.register("ghost@example.com", PASSWORD).await;
    let storage = Arc::new(MemoryTabStorage::new());
    let mut manager = harness.manager(storage.clone());

    let result = manager.login("ghost@example.com", PASSWORD).await;

    assert_matches!(result, Err(AuthError::ProfileNotFound(id)) if id == user_id);
    assert_eq!(manager.state(), &SessionState::Unauthenticated);
    assert!(storage.load().await.is_none());
    // The upstream credential stays valid.
    assert_eq!(harness.identity.current_user().await.unwrap().user_id, user_id);
}

#[tokio::test]
async fn session_survives_a_process_restart() {
    let harness = Harness::new();
    harness.existing_patient("asha@example.com").await;
    let storage = Arc::new(MemoryTabStorage::new());

    let session = {
        let mut first_run = harness.manager(storage.clone());
        first_run.login("asha@example.com", PASSWORD).await.unwrap()
    };

    let mut second_run = harness.manager(storage.clone());
    assert_eq!(second_run.state(), &SessionState::Unauthenticated);

    let restored = second_run.restore().await;
    assert_eq!(restored, Some(session.clone()));
    assert_eq!(second_run.state(), &SessionState::Authenticated(session));
}

#[tokio::test]
async fn restore_clears_session_when_credential_is_gone() {
    let harness = Harness::new();
    harness.existing_patient("asha@example.com").await;
    let storage = Arc::new(MemoryTabStorage::new());
    harness
        .manager(storage.clone())
        .login("asha@example.com", PASSWORD)
        .await
        .unwrap();

    harness.identity.expire().await;

    let mut restarted = harness.manager(storage.clone());
    assert_eq!(restarted.restore().await, None);
    assert!(storage.load().await.is_none());
}

#[tokio::test]
async fn restore_clears_session_on_user_type_mismatch() {
    let harness = Harness::new();
    let user_id = harness.existing_patient("asha@example.com").await;
    let storage = Arc::new(MemoryTabStorage::new());
    harness
        .manager(storage.clone())
        .login("asha@example.com", PASSWORD)
        .await
        .unwrap();

    harness
        .store
        .update(&Collection::Users, &user_id, serde_json::json!({"user_type": "doctor"}))
        .await
        .unwrap();

    let mut restarted = harness.manager(storage.clone());
    assert_eq!(restarted.restore().await, None);
    assert_eq!(restarted.state(), &SessionState::Unauthenticated);
}

#[tokio::test]
async fn logout_in_one_tab_leaves_the_other_authenticated() {
    let harness = Harness::new();
    harness.existing_patient("asha@example.com").await;
    let tabs = TabSessions::new();

    let mut tab_a = harness.manager(tabs.tab("tab-a").await);
    let mut tab_b = harness.manager(tabs.tab("tab-b").await);
    tab_a.login("asha@example.com", PASSWORD).await.unwrap();
    let session_b = tab_b.login("asha@example.com", PASSWORD).await.unwrap();

    tab_a.logout().await;

    assert_eq!(tab_a.state(), &SessionState::Unauthenticated);
    assert!(tabs.tab("tab-a").await.load().await.is_none());

    let mut tab_b_after_restart = harness.manager(tabs.tab("tab-b").await);
    assert_eq!(tab_b_after_restart.restore().await, Some(session_b));
    assert!(harness.identity.current_user().await.is_some());
}

#[tokio::test]
async fn signup_writes_user_record_and_typed_profile() {
    let harness = Harness::new();
    let mut manager = harness.manager(Arc::new(MemoryTabStorage::new()));

    let registration = RegistrationData::Doctor(DoctorRegistration {
        name: "Dr. Arjun Singh".to_string(),
        specialization: Some("Radiation Oncologist".to_string()),
        slots: vec!["09-10".to_string(), "10-11".to_string()],
        ..Default::default()
    });

    let (session, profile) = manager
        .signup("arjun@hospital.com", PASSWORD, &registration)
        .await
        .unwrap();

    assert_eq!(session.user_type, UserType::Doctor);
    let doctor = assert_matches!(profile, Profile::Doctor(d) => d);
    assert!(doctor.doctor_id.starts_with("DOC"));
    assert_eq!(doctor.available_slots(), vec!["09-10", "10-11"]);

    let stored = harness
        .store
        .get(&Collection::Users, &session.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["user_type"], "doctor");
    assert!(harness
        .store
        .get(&Collection::Doctors, &session.user_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn failed_profile_write_deletes_the_new_credential() {
    let identity = Arc::new(MemoryIdentityProvider::new());
    let store = Arc::new(FailingWrites {
        inner: MemoryStore::new(),
        broken: Collection::Patients,
    });
    let storage = Arc::new(MemoryTabStorage::new());
    let mut manager = SessionManager::new(identity.clone(), store, storage.clone());

    let result = manager
        .signup("asha@example.com", PASSWORD, &patient_registration())
        .await;

    assert_matches!(result, Err(AuthError::Store(msg)) if msg.contains("refused"));
    assert!(!identity.has_account("asha@example.com").await);
    assert!(identity.current_user().await.is_none());
    assert_eq!(manager.state(), &SessionState::Unauthenticated);
    assert!(storage.load().await.is_none());
}

#[tokio::test]
async fn provider_events_do_not_override_a_local_session() {
    let harness = Harness::new();
    let user_id = harness.existing_patient("asha@example.com").await;
    let storage = Arc::new(MemoryTabStorage::new());
    let mut manager = harness.manager(storage.clone());
    let session = manager.login("asha@example.com", PASSWORD).await.unwrap();

    manager
        .apply_credential_event(CredentialEvent::SignedIn(Credential {
            user_id: "someone-else".to_string(),
            email: "other@example.com".to_string(),
            access_token: None,
        }))
        .await;
    assert_eq!(manager.session().map(|s| s.user_id.as_str()), Some(user_id.as_str()));

    manager.apply_credential_event(CredentialEvent::SignedOut).await;
    assert_eq!(manager.state(), &SessionState::Unauthenticated);
    assert!(storage.load().await.is_none());

    // With no local session the provider's sign-in is adopted.
    manager
        .apply_credential_event(CredentialEvent::SignedIn(Credential {
            user_id: user_id.clone(),
            email: "asha@example.com".to_string(),
            access_token: None,
        }))
        .await;
    assert_eq!(manager.state(), &SessionState::Authenticated(session));
}

#[tokio::test]
async fn profile_requires_a_session() {
    let harness = Harness::new();
    let manager = harness.manager(Arc::new(MemoryTabStorage::new()));
    assert_matches!(manager.profile().await, Err(AuthError::NotAuthenticated));
}
