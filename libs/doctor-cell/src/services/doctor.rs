use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use shared_database::{Collection, DocumentStore, Filter, SortDirection};
use shared_models::profile::DoctorProfile;

use crate::models::DoctorError;

pub struct DoctorService {
    store: Arc<dyn DocumentStore>,
}

impl DoctorService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// All doctors, sorted by name.
    pub async fn list_doctors(&self) -> Result<Vec<DoctorProfile>, DoctorError> {
        let documents = self
            .store
            .query(
                &Collection::Doctors,
                &Filter::new().order_by("name", SortDirection::Ascending),
            )
            .await
            .map_err(|e| DoctorError::Store(e.to_string()))?;

        let doctors: Vec<DoctorProfile> = documents.into_iter().filter_map(parse_doctor).collect();
        debug!("Loaded {} doctors", doctors.len());
        Ok(doctors)
    }

    /// Doctors with at least one free slot.
    pub async fn available_doctors(&self) -> Result<Vec<DoctorProfile>, DoctorError> {
        Ok(self
            .list_doctors()
            .await?
            .into_iter()
            .filter(DoctorProfile::has_available_slot)
            .collect())
    }

    pub async fn get_doctor(&self, doctor_id: &str) -> Result<DoctorProfile, DoctorError> {
        let document = self
            .store
            .get(&Collection::Doctors, doctor_id)
            .await
            .map_err(|e| DoctorError::Store(e.to_string()))?
            .ok_or_else(|| DoctorError::NotFound(doctor_id.to_string()))?;

        serde_json::from_value(document)
            .map_err(|e| DoctorError::Store(format!("Malformed doctor {}: {}", doctor_id, e)))
    }
}

fn parse_doctor(document: Value) -> Option<DoctorProfile> {
    match serde_json::from_value::<DoctorProfile>(document) {
        Ok(doctor) => Some(doctor),
        Err(e) => {
            warn!("Skipping malformed doctor record: {}", e);
            None
        }
    }
}
