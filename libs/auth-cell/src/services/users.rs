use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use shared_database::{Collection, DocumentStore};
use shared_models::auth::{BaseUser, UserType};
use shared_models::profile::{
    DoctorProfile, ManagementProfile, PatientProfile, Profile, RegistrationData,
};
use shared_utils::ids::{prefixed_id, DOCTOR_PREFIX, EMPLOYEE_PREFIX, PATIENT_PREFIX};

use crate::models::AuthError;

/// Base user records and type-specific profiles.
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn base_user(&self, user_id: &str) -> Result<Option<BaseUser>, AuthError> {
        debug!("Reading base user {}", user_id);

        let document = self
            .store
            .get(&Collection::Users, user_id)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        document
            .map(|doc| serde_json::from_value(doc))
            .transpose()
            .map_err(|e| AuthError::Store(format!("Malformed user record {}: {}", user_id, e)))
    }

    pub async fn profile(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<Option<Profile>, AuthError> {
        let document = self
            .store
            .get(&Collection::for_profile(user_type), user_id)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let Some(document) = document else {
            return Ok(None);
        };

        let profile = match user_type {
            UserType::Doctor => serde_json::from_value(document).map(Profile::Doctor),
            UserType::Patient => serde_json::from_value(document).map(Profile::Patient),
            UserType::Management => serde_json::from_value(document).map(Profile::Management),
        }
        .map_err(|e| AuthError::Store(format!("Malformed {} profile {}: {}", user_type, user_id, e)))?;

        Ok(Some(profile))
    }

    /// Writes the base user record, then the typed profile.
    pub async fn create_user(
        &self,
        user_id: &str,
        email: &str,
        registration: &RegistrationData,
    ) -> Result<Profile, AuthError> {
        let now = Utc::now();
        let user_type = registration.user_type();

        let base = BaseUser {
            id: user_id.to_string(),
            email: email.to_string(),
            user_type,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };
        self.write(&Collection::Users, user_id, to_document(&base)?).await?;

        let profile = match registration {
            RegistrationData::Doctor(data) => Profile::Doctor(DoctorProfile {
                user_id: user_id.to_string(),
                doctor_id: prefixed_id(DOCTOR_PREFIX),
                name: data.name.trim().to_string(),
                email: email.to_string(),
                phone: data.phone.clone().unwrap_or_default(),
                department: data.department.clone().unwrap_or_default(),
                specialization: data.specialization.clone().unwrap_or_default(),
                status: "active".to_string(),
                image_url: None,
                slots: data
                    .slots
                    .iter()
                    .map(|label| (label.trim().to_string(), false))
                    .collect::<BTreeMap<_, _>>(),
                created_at: now,
                updated_at: now,
            }),
            RegistrationData::Patient(data) => Profile::Patient(PatientProfile {
                user_id: user_id.to_string(),
                patient_id: prefixed_id(PATIENT_PREFIX),
                name: data.name.trim().to_string(),
                email: email.to_string(),
                phone: data.phone.clone().unwrap_or_default(),
                address: data.address.clone().unwrap_or_default(),
                date_of_birth: data.date_of_birth.clone(),
                gender: data.gender,
                emergency_contact: data.emergency_contact.clone().unwrap_or_default(),
                created_at: now,
                updated_at: now,
            }),
            RegistrationData::Management(data) => Profile::Management(ManagementProfile {
                user_id: user_id.to_string(),
                emp_id: prefixed_id(EMPLOYEE_PREFIX),
                name: data.name.trim().to_string(),
                email: email.to_string(),
                role: data.role.clone().unwrap_or_default(),
                department: data.department.clone().unwrap_or_default(),
                phone: data.phone.clone().unwrap_or_default(),
                status: "active".to_string(),
                created_at: now,
                updated_at: now,
            }),
        };

        let document = match &profile {
            Profile::Doctor(p) => to_document(p)?,
            Profile::Patient(p) => to_document(p)?,
            Profile::Management(p) => to_document(p)?,
        };
        self.write(&Collection::for_profile(user_type), user_id, document)
            .await?;

        info!("Registered {} {}", user_type, user_id);
        Ok(profile)
    }

    async fn write(&self, collection: &Collection, id: &str, document: Value) -> Result<(), AuthError> {
        self.store
            .set(collection, id, document)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))
    }
}

fn to_document<T: serde::Serialize>(value: &T) -> Result<Value, AuthError> {
    serde_json::to_value(value).map_err(|e| AuthError::Store(e.to_string()))
}
