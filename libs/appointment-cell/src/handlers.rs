// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use payment_cell::{PaymentConfirmation, PaymentFailure};
use shared_models::auth::{User, UserType};
use shared_models::error::AppError;
use shared_utils::extractor::require_user_type;
use video_conferencing_cell::MeetingLink;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, BookedAppointment,
    BookingConfirmation, BookingIncident, BookingTicket, IncidentQuery, UpdateStatusRequest,
};
use crate::router::AppointmentState;
use crate::services::booking::BookingCoordinator;

fn coordinator(state: &AppointmentState) -> BookingCoordinator {
    BookingCoordinator::new(
        Arc::clone(&state.store),
        Arc::clone(&state.gateway),
        &state.config,
    )
}

/// Patients see their own appointments, doctors theirs, management all.
fn authorize(user: &User, appointment: &Appointment) -> Result<(), AppError> {
    let allowed = match user.user_type() {
        Some(UserType::Management) => true,
        Some(UserType::Patient) => appointment.patient_id == user.id,
        Some(UserType::Doctor) => appointment.doctor_id == user.id,
        None => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized.into())
    }
}

async fn owned_by_patient(
    coordinator: &BookingCoordinator,
    user: &User,
    appointment_id: &str,
) -> Result<Appointment, AppError> {
    require_user_type(user, &[UserType::Patient])?;
    let appointment = coordinator.appointments().get(appointment_id).await?;
    if appointment.patient_id != user.id {
        return Err(AppointmentError::Unauthorized.into());
    }
    Ok(appointment)
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

/// Reserves the slot and creates the payment order. The client opens the
/// checkout with the returned options and reports back on one of the
/// payment callbacks.
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<BookingTicket>, AppError> {
    require_user_type(&user, &[UserType::Patient])?;

    let coordinator = coordinator(&state);
    let patient = coordinator.patient_profile(&user.id).await?;
    let ticket = coordinator.begin_booking(&patient, &request).await?;

    Ok(Json(ticket))
}

pub async fn confirm_payment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(confirmation): Json<PaymentConfirmation>,
) -> Result<Json<BookingConfirmation>, AppError> {
    let coordinator = coordinator(&state);
    owned_by_patient(&coordinator, &user, &appointment_id).await?;

    let confirmed = coordinator
        .confirm_payment(&appointment_id, &confirmation)
        .await?;
    Ok(Json(confirmed))
}

pub async fn record_payment_failure(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(failure): Json<PaymentFailure>,
) -> Result<Json<Appointment>, AppError> {
    let coordinator = coordinator(&state);
    owned_by_patient(&coordinator, &user, &appointment_id).await?;

    let appointment = coordinator
        .abandon_payment(&appointment_id, &failure)
        .await?;
    Ok(Json(appointment))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

pub async fn get_booked_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<BookedAppointment>>, AppError> {
    require_user_type(&user, &[UserType::Patient])?;

    let booked = coordinator(&state)
        .appointments()
        .booked_appointments(&user.id)
        .await?;
    Ok(Json(booked))
}

pub async fn get_patient_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    require_user_type(&user, &[UserType::Patient])?;

    let appointments = coordinator(&state)
        .appointments()
        .paid_for_patient(&user.id)
        .await?;
    Ok(Json(appointments))
}

pub async fn get_doctor_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    require_user_type(&user, &[UserType::Doctor])?;

    let appointments = coordinator(&state)
        .appointments()
        .paid_for_doctor(&user.id)
        .await?;
    Ok(Json(appointments))
}

// ==============================================================================
// SINGLE APPOINTMENT
// ==============================================================================

pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = coordinator(&state)
        .appointments()
        .get(&appointment_id)
        .await?;
    authorize(&user, &appointment)?;

    Ok(Json(appointment))
}

pub async fn update_status(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Appointment>, AppError> {
    require_user_type(&user, &[UserType::Doctor, UserType::Management])?;

    let coordinator = coordinator(&state);
    let appointment = coordinator.appointments().get(&appointment_id).await?;
    authorize(&user, &appointment)?;

    let updated = coordinator
        .update_status(&appointment_id, request.status)
        .await?;
    Ok(Json(updated))
}

/// The room stored at booking time. Only booked appointments have one to join.
pub async fn get_meeting_link(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<MeetingLink>, AppError> {
    let appointment = coordinator(&state)
        .appointments()
        .get(&appointment_id)
        .await?;
    authorize(&user, &appointment)?;

    if !appointment.is_paid() || appointment.status == AppointmentStatus::Cancelled {
        return Err(AppError::Conflict(format!(
            "Appointment {} is not booked",
            appointment_id
        )));
    }

    Ok(Json(MeetingLink::new(&appointment.id, &appointment.meet_link)))
}

// ==============================================================================
// OPERATOR QUEUE (MANAGEMENT)
// ==============================================================================

pub async fn list_incidents(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Query(query): Query<IncidentQuery>,
) -> Result<Json<Vec<BookingIncident>>, AppError> {
    require_user_type(&user, &[UserType::Management])?;

    let incidents = coordinator(&state)
        .incidents()
        .list(query.include_resolved)
        .await?;
    Ok(Json(incidents))
}

pub async fn retry_commit(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_user_type(&user, &[UserType::Management])?;

    let confirmed = coordinator(&state).retry_commit(&appointment_id).await?;
    info!("Management user {} recovered appointment {}", user.id, appointment_id);

    Ok(Json(json!({
        "success": true,
        "appointment": confirmed.appointment,
    })))
}
