// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use doctor_cell::models::{DoctorListing, SlotError};
use payment_cell::{CheckoutOptions, FailureReason, PaymentConfirmation, PaymentError, PaymentOrder};
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Booking progress, in the order the steps run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BookingStep {
    Reserved,
    PaymentInitiated,
    PaymentConfirmed,
    SlotCommitted,
    PatientViewWritten,
}

impl fmt::Display for BookingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStep::Reserved => write!(f, "reserved"),
            BookingStep::PaymentInitiated => write!(f, "payment_initiated"),
            BookingStep::PaymentConfirmed => write!(f, "payment_confirmed"),
            BookingStep::SlotCommitted => write!(f, "slot_committed"),
            BookingStep::PatientViewWritten => write!(f, "patient_view_written"),
        }
    }
}

/// Source of truth for a consultation, stored under `appointments/{id}`.
///
/// `patient_id` and `doctor_id` are the user ids the profiles are keyed by.
/// `meet_link` is fixed when the record is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub patient_email: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub doctor_email: String,
    pub time_slot: String,
    pub appointment_date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    /// Gateway order opened for this appointment. Only a payment against
    /// this order can confirm it.
    #[serde(default)]
    pub payment_order_id: Option<String>,
    #[serde(default)]
    pub razorpay_order_id: Option<String>,
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
    #[serde(default)]
    pub razorpay_signature: Option<String>,
    /// Consultation fee in major currency units.
    pub amount: u64,
    pub meet_link: String,
    pub last_completed_step: BookingStep,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Every commit step has run.
    pub fn is_committed(&self) -> bool {
        self.last_completed_step == BookingStep::PatientViewWritten
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Completed
    }

    /// Payment evidence as recorded on the appointment, once confirmed.
    pub fn payment_evidence(&self) -> Option<PaymentConfirmation> {
        Some(PaymentConfirmation {
            order_id: self.razorpay_order_id.clone()?,
            payment_id: self.razorpay_payment_id.clone()?,
            signature: self.razorpay_signature.clone()?,
        })
    }
}

/// Copy of a committed appointment in `patients/{id}/bookedAppointments`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookedAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub booked_at: DateTime<Utc>,
}

// ==============================================================================
// OPERATOR QUEUE
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    /// Payment captured but another booking holds the slot.
    RefundRequired,
    /// Payment captured but a commit step did not complete.
    CommitFailed,
}

/// A paid booking that needs an operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingIncident {
    pub id: String,
    pub appointment_id: String,
    pub kind: IncidentKind,
    /// The step that was being attempted.
    pub failed_step: BookingStep,
    pub reason: String,
    #[serde(default)]
    pub payment: Option<PaymentConfirmation>,
    pub amount: u64,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: String,
    pub time_slot: String,
    /// Defaults to the booking time.
    #[serde(default)]
    pub appointment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentQuery {
    #[serde(default)]
    pub include_resolved: bool,
}

/// A reserved appointment waiting for the payer.
#[derive(Debug, Clone, Serialize)]
pub struct BookingTicket {
    pub appointment: Appointment,
    pub order: PaymentOrder,
    pub checkout: CheckoutOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingConfirmation {
    pub appointment: Appointment,
    pub available_doctors: Vec<DoctorListing>,
}

#[derive(Debug, Clone)]
pub enum BookingOutcome {
    Booked(BookingConfirmation),
    PaymentFailed {
        appointment: Appointment,
        reason: FailureReason,
    },
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(String),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),

    #[error("Patient profile not found: {0}")]
    PatientNotFound(String),

    #[error("Doctor {doctor_id} has no slot {slot}")]
    UnknownSlot { doctor_id: String, slot: String },

    #[error("Slot {slot} of doctor {doctor_id} is not available")]
    SlotUnavailable { doctor_id: String, slot: String },

    #[error("Slot {slot} was booked by another patient; appointment {appointment_id} needs a refund")]
    SlotConflict { appointment_id: String, slot: String },

    #[error("Payment succeeded but appointment update failed ({appointment_id} at {step})")]
    CommitFailed {
        appointment_id: String,
        step: BookingStep,
    },

    #[error("Payment for appointment {0} is not pending")]
    PaymentNotPending(String),

    #[error("Order {order_id} does not belong to appointment {appointment_id}")]
    OrderMismatch {
        appointment_id: String,
        order_id: String,
    },

    #[error("Appointment {appointment_id} is {status} and can no longer be paid for")]
    NotPayable {
        appointment_id: String,
        status: AppointmentStatus,
    },

    #[error("Payment for appointment {0} was accepted and its commit has not finished")]
    CommitInProgress(String),

    #[error("Appointment {0} has no commit to retry")]
    NothingToRetry(String),

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<SlotError> for AppointmentError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::SlotAlreadyBooked { doctor_id, slot } => {
                AppointmentError::SlotUnavailable { doctor_id, slot }
            }
            SlotError::UnknownSlot { doctor_id, slot } => {
                AppointmentError::UnknownSlot { doctor_id, slot }
            }
            SlotError::DoctorNotFound(id) => AppointmentError::DoctorNotFound(id),
            SlotError::Store(msg) => AppointmentError::Store(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(_)
            | AppointmentError::DoctorNotFound(_)
            | AppointmentError::PatientNotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::UnknownSlot { .. }
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::OrderMismatch { .. } => AppError::BadRequest(err.to_string()),
            AppointmentError::SlotUnavailable { .. }
            | AppointmentError::SlotConflict { .. }
            | AppointmentError::PaymentNotPending(_)
            | AppointmentError::NotPayable { .. }
            | AppointmentError::CommitInProgress(_)
            | AppointmentError::NothingToRetry(_) => AppError::Conflict(err.to_string()),
            AppointmentError::CommitFailed { .. } => AppError::Internal(err.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::Payment(payment) => payment.into(),
            AppointmentError::Store(msg) => AppError::Database(msg),
        }
    }
}
