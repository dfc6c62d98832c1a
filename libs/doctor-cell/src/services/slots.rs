use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_database::{CasOutcome, Collection, DocumentStore};
use shared_models::profile::DoctorProfile;

use crate::models::SlotError;

const SLOTS_FIELD: &str = "slots";

/// Booked flags of every doctor's slot labels.
///
/// `mark_booked` is the only place a free slot becomes booked, and it is a
/// single conditional write on `slots.<label>`: of several concurrent callers
/// exactly one succeeds.
pub struct SlotRegistry {
    store: Arc<dyn DocumentStore>,
}

impl SlotRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// `false` for booked labels and labels the doctor does not offer.
    pub async fn is_available(&self, doctor_id: &str, slot: &str) -> Result<bool, SlotError> {
        let doctor = self
            .store
            .get(&Collection::Doctors, doctor_id)
            .await
            .map_err(|e| SlotError::Store(e.to_string()))?
            .ok_or_else(|| SlotError::DoctorNotFound(doctor_id.to_string()))?;

        let available = doctor
            .get(SLOTS_FIELD)
            .and_then(|slots| slots.get(slot))
            .and_then(Value::as_bool)
            .map(|booked| !booked)
            .unwrap_or(false);

        debug!("Slot {} of {} available: {}", slot, doctor_id, available);
        Ok(available)
    }

    pub async fn mark_booked(&self, doctor_id: &str, slot: &str) -> Result<(), SlotError> {
        match self.flip(doctor_id, slot, false, true).await? {
            CasOutcome::Applied => {
                info!("Slot {} of doctor {} booked", slot, doctor_id);
                Ok(())
            }
            CasOutcome::Mismatch { current } if current == json!(true) => {
                warn!("Slot {} of doctor {} was already booked", slot, doctor_id);
                Err(SlotError::SlotAlreadyBooked {
                    doctor_id: doctor_id.to_string(),
                    slot: slot.to_string(),
                })
            }
            CasOutcome::Mismatch { current } => Err(SlotError::Store(format!(
                "Slot {} of doctor {} holds unexpected value {}",
                slot, doctor_id, current
            ))),
            CasOutcome::Missing => Err(self.missing(doctor_id, slot).await),
        }
    }

    /// Releases a booked slot. Releasing a free slot is a no-op.
    pub async fn reset_slot(&self, doctor_id: &str, slot: &str) -> Result<(), SlotError> {
        match self.flip(doctor_id, slot, true, false).await? {
            CasOutcome::Applied => {
                info!("Slot {} of doctor {} released", slot, doctor_id);
                Ok(())
            }
            CasOutcome::Mismatch { current } if current == json!(false) => {
                debug!("Slot {} of doctor {} already free", slot, doctor_id);
                Ok(())
            }
            CasOutcome::Mismatch { current } => Err(SlotError::Store(format!(
                "Slot {} of doctor {} holds unexpected value {}",
                slot, doctor_id, current
            ))),
            CasOutcome::Missing => Err(self.missing(doctor_id, slot).await),
        }
    }

    /// Labels whose flag is `false`, sorted.
    pub fn available_slots(doctor: &DoctorProfile) -> Vec<String> {
        doctor.available_slots()
    }

    async fn flip(
        &self,
        doctor_id: &str,
        slot: &str,
        from: bool,
        to: bool,
    ) -> Result<CasOutcome, SlotError> {
        self.store
            .compare_and_set(
                &Collection::Doctors,
                doctor_id,
                &[SLOTS_FIELD, slot],
                &json!(from),
                json!(to),
            )
            .await
            .map_err(|e| SlotError::Store(e.to_string()))
    }

    async fn missing(&self, doctor_id: &str, slot: &str) -> SlotError {
        match self.store.get(&Collection::Doctors, doctor_id).await {
            Ok(Some(_)) => SlotError::UnknownSlot {
                doctor_id: doctor_id.to_string(),
                slot: slot.to_string(),
            },
            Ok(None) => SlotError::DoctorNotFound(doctor_id.to_string()),
            Err(e) => SlotError::Store(e.to_string()),
        }
    }
}
