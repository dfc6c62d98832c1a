use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use shared_database::{CasOutcome, Collection, DocumentStore, Filter, SortDirection};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookedAppointment, BookingStep, PaymentStatus,
};

/// Appointment records and the per-patient booked view.
pub struct AppointmentStore {
    store: Arc<dyn DocumentStore>,
}

impl AppointmentStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        let document = serde_json::to_value(appointment)
            .map_err(|e| AppointmentError::Store(e.to_string()))?;
        self.store
            .set(&Collection::Appointments, &appointment.id, document)
            .await
            .map_err(store_error)
    }

    pub async fn find(&self, appointment_id: &str) -> Result<Option<Appointment>, AppointmentError> {
        let document = self
            .store
            .get(&Collection::Appointments, appointment_id)
            .await
            .map_err(store_error)?;

        document
            .map(|document| parse(document, appointment_id))
            .transpose()
    }

    pub async fn get(&self, appointment_id: &str) -> Result<Appointment, AppointmentError> {
        self.find(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(appointment_id.to_string()))
    }

    /// Merges `fields` into the record and bumps `updated_at`.
    pub async fn update(&self, appointment_id: &str, fields: Value) -> Result<(), AppointmentError> {
        let mut fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.insert("updated_at".to_string(), json!(Utc::now()));

        self.store
            .update(&Collection::Appointments, appointment_id, Value::Object(fields))
            .await
            .map_err(store_error)
    }

    pub async fn record_step(&self, appointment_id: &str, step: BookingStep) -> Result<(), AppointmentError> {
        debug!("Appointment {} reached {}", appointment_id, step);
        self.update(appointment_id, json!({ "last_completed_step": step }))
            .await
    }

    /// Ties the gateway order to the appointment along with the step.
    pub async fn record_order(&self, appointment_id: &str, order_id: &str) -> Result<(), AppointmentError> {
        debug!("Appointment {} awaits payment on order {}", appointment_id, order_id);
        self.update(
            appointment_id,
            json!({
                "payment_order_id": order_id,
                "last_completed_step": BookingStep::PaymentInitiated,
            }),
        )
        .await
    }

    /// Moves `payment_status` from pending to completed in one conditional
    /// write. `false` means another confirmation got there first.
    pub async fn claim_payment(&self, appointment_id: &str) -> Result<bool, AppointmentError> {
        let outcome = self
            .store
            .compare_and_set(
                &Collection::Appointments,
                appointment_id,
                &["payment_status"],
                &json!(PaymentStatus::Pending),
                json!(PaymentStatus::Completed),
            )
            .await
            .map_err(store_error)?;

        match outcome {
            CasOutcome::Applied => Ok(true),
            CasOutcome::Mismatch { .. } => Ok(false),
            CasOutcome::Missing => Err(AppointmentError::NotFound(appointment_id.to_string())),
        }
    }

    pub async fn write_booked_view(
        &self,
        appointment: &Appointment,
        booked_at: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        let view = BookedAppointment {
            appointment: appointment.clone(),
            booked_at,
        };
        let document =
            serde_json::to_value(&view).map_err(|e| AppointmentError::Store(e.to_string()))?;

        self.store
            .set(&booked_collection(&appointment.patient_id), &appointment.id, document)
            .await
            .map_err(store_error)
    }

    pub async fn booked_view(
        &self,
        patient_id: &str,
        appointment_id: &str,
    ) -> Result<Option<BookedAppointment>, AppointmentError> {
        self.store
            .get(&booked_collection(patient_id), appointment_id)
            .await
            .map_err(store_error)?
            .map(|document| parse(document, appointment_id))
            .transpose()
    }

    /// The patient's booked view, newest first.
    pub async fn booked_appointments(&self, patient_id: &str) -> Result<Vec<BookedAppointment>, AppointmentError> {
        let documents = self
            .store
            .query(
                &booked_collection(patient_id),
                &Filter::new().order_by("created_at", SortDirection::Descending),
            )
            .await
            .map_err(store_error)?;
        Ok(parse_all(documents))
    }

    /// Paid appointments of a patient, newest first.
    pub async fn paid_for_patient(&self, patient_id: &str) -> Result<Vec<Appointment>, AppointmentError> {
        self.paid_where("patient_id", patient_id).await
    }

    /// Paid appointments with a doctor, newest first.
    ///
    /// Leaves out payers who lost the slot to someone else: they were
    /// cancelled before commit and never became a consultation. Appointments
    /// cancelled after commit stay listed.
    pub async fn paid_for_doctor(&self, doctor_id: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.paid_where("doctor_id", doctor_id).await?;
        Ok(appointments
            .into_iter()
            .filter(|a| !(a.status == AppointmentStatus::Cancelled && !a.is_committed()))
            .collect())
    }

    /// Paid appointments for one doctor slot, in any status.
    pub async fn paid_for_slot(&self, doctor_id: &str, time_slot: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let documents = self
            .store
            .query(
                &Collection::Appointments,
                &Filter::new()
                    .eq("doctor_id", doctor_id)
                    .eq("time_slot", time_slot)
                    .eq("payment_status", PaymentStatus::Completed.to_string()),
            )
            .await
            .map_err(store_error)?;
        Ok(parse_all(documents))
    }

    async fn paid_where(&self, field: &str, value: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let documents = self
            .store
            .query(
                &Collection::Appointments,
                &Filter::new()
                    .eq(field, value)
                    .eq("payment_status", PaymentStatus::Completed.to_string())
                    .order_by("created_at", SortDirection::Descending),
            )
            .await
            .map_err(store_error)?;
        Ok(parse_all(documents))
    }
}

fn booked_collection(patient_id: &str) -> Collection {
    Collection::BookedAppointments {
        patient_id: patient_id.to_string(),
    }
}

fn store_error(err: anyhow::Error) -> AppointmentError {
    AppointmentError::Store(err.to_string())
}

fn parse<T: DeserializeOwned>(document: Value, id: &str) -> Result<T, AppointmentError> {
    serde_json::from_value(document)
        .map_err(|e| AppointmentError::Store(format!("Malformed appointment {}: {}", id, e)))
}

fn parse_all<T: DeserializeOwned>(documents: Vec<Value>) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|document| match serde_json::from_value(document) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Skipping malformed appointment record: {}", e);
                None
            }
        })
        .collect()
}
