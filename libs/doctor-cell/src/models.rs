use serde::Serialize;
use thiserror::Error;

use shared_models::error::AppError;
use shared_models::profile::DoctorProfile;

/// A doctor together with the slot labels still open for booking.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorListing {
    #[serde(flatten)]
    pub doctor: DoctorProfile,
    pub available_slots: Vec<String>,
}

impl From<DoctorProfile> for DoctorListing {
    fn from(doctor: DoctorProfile) -> Self {
        let available_slots = doctor.available_slots();
        Self {
            doctor,
            available_slots,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub doctor_id: String,
    pub slot: String,
    pub booked: bool,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum SlotError {
    #[error("Slot {slot} of doctor {doctor_id} is already booked")]
    SlotAlreadyBooked { doctor_id: String, slot: String },

    #[error("Doctor {doctor_id} has no slot {slot}")]
    UnknownSlot { doctor_id: String, slot: String },

    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),

    #[error("Store error: {0}")]
    Store(String),
}

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<SlotError> for AppError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::SlotAlreadyBooked { .. } => AppError::Conflict(err.to_string()),
            SlotError::UnknownSlot { .. } => AppError::BadRequest(err.to_string()),
            SlotError::DoctorNotFound(_) => AppError::NotFound(err.to_string()),
            SlotError::Store(msg) => AppError::Database(msg),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound(_) => AppError::NotFound(err.to_string()),
            DoctorError::Slot(slot) => slot.into(),
            DoctorError::Store(msg) => AppError::Database(msg),
        }
    }
}
