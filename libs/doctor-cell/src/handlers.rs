use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use shared_models::auth::{User, UserType};
use shared_models::error::AppError;
use shared_utils::extractor::require_user_type;

use crate::models::{DoctorListing, SlotStatus};
use crate::router::DoctorState;
use crate::services::{doctor::DoctorService, slots::SlotRegistry};

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

pub async fn list_doctors(
    State(state): State<Arc<DoctorState>>,
) -> Result<Json<Vec<DoctorListing>>, AppError> {
    let doctors = DoctorService::new(Arc::clone(&state.store)).list_doctors().await?;
    Ok(Json(doctors.into_iter().map(DoctorListing::from).collect()))
}

pub async fn list_available_doctors(
    State(state): State<Arc<DoctorState>>,
) -> Result<Json<Vec<DoctorListing>>, AppError> {
    let doctors = DoctorService::new(Arc::clone(&state.store))
        .available_doctors()
        .await?;
    Ok(Json(doctors.into_iter().map(DoctorListing::from).collect()))
}

pub async fn get_doctor(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<DoctorListing>, AppError> {
    let doctor = DoctorService::new(Arc::clone(&state.store))
        .get_doctor(&doctor_id)
        .await?;
    Ok(Json(doctor.into()))
}

pub async fn get_available_slots(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(Arc::clone(&state.store))
        .get_doctor(&doctor_id)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "available_slots": SlotRegistry::available_slots(&doctor),
    })))
}

pub async fn get_slot_status(
    State(state): State<Arc<DoctorState>>,
    Path((doctor_id, slot)): Path<(String, String)>,
) -> Result<Json<SlotStatus>, AppError> {
    let available = SlotRegistry::new(Arc::clone(&state.store))
        .is_available(&doctor_id, &slot)
        .await?;

    Ok(Json(SlotStatus {
        doctor_id,
        slot,
        booked: !available,
    }))
}

// ==============================================================================
// MANAGEMENT HANDLERS
// ==============================================================================

pub async fn reset_slot(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<User>,
    Path((doctor_id, slot)): Path<(String, String)>,
) -> Result<Json<SlotStatus>, AppError> {
    require_user_type(&user, &[UserType::Management])?;

    SlotRegistry::new(Arc::clone(&state.store))
        .reset_slot(&doctor_id, &slot)
        .await?;
    info!("Management user {} released slot {} of {}", user.id, slot, doctor_id);

    Ok(Json(SlotStatus {
        doctor_id,
        slot,
        booked: false,
    }))
}
