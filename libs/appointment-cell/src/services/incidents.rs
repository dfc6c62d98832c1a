use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use payment_cell::PaymentConfirmation;
use shared_database::{Collection, DocumentStore, Filter, SortDirection};
use shared_utils::ids::prefixed_id;

use crate::models::{Appointment, AppointmentError, BookingIncident, BookingStep, IncidentKind};

const INCIDENT_PREFIX: &str = "INC";

/// Operator queue for paid bookings that did not commit cleanly.
pub struct IncidentQueue {
    store: Arc<dyn DocumentStore>,
}

impl IncidentQueue {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Files an incident. A failure to file is logged, never raised: the
    /// caller is already reporting the underlying problem.
    pub async fn file(
        &self,
        appointment: &Appointment,
        kind: IncidentKind,
        failed_step: BookingStep,
        reason: &str,
        payment: Option<PaymentConfirmation>,
    ) -> Option<BookingIncident> {
        let incident = BookingIncident {
            id: prefixed_id(INCIDENT_PREFIX),
            appointment_id: appointment.id.clone(),
            kind,
            failed_step,
            reason: reason.to_string(),
            payment,
            amount: appointment.amount,
            resolved: false,
            created_at: Utc::now(),
            resolved_at: None,
        };

        let document = match serde_json::to_value(&incident) {
            Ok(document) => document,
            Err(e) => {
                error!("Could not encode incident for {}: {}", appointment.id, e);
                return None;
            }
        };

        match self
            .store
            .set(&Collection::BookingIncidents, &incident.id, document)
            .await
        {
            Ok(()) => {
                warn!(
                    "Filed {:?} incident {} for appointment {} at {}: {}",
                    kind, incident.id, appointment.id, failed_step, reason
                );
                Some(incident)
            }
            Err(e) => {
                error!(
                    "Could not file incident for appointment {} ({}): {}",
                    appointment.id, reason, e
                );
                None
            }
        }
    }

    /// Newest first.
    pub async fn list(&self, include_resolved: bool) -> Result<Vec<BookingIncident>, AppointmentError> {
        let mut filter = Filter::new().order_by("created_at", SortDirection::Descending);
        if !include_resolved {
            filter = filter.eq("resolved", false);
        }
        self.query(&filter).await
    }

    pub async fn open_for(&self, appointment_id: &str) -> Result<Vec<BookingIncident>, AppointmentError> {
        self.query(
            &Filter::new()
                .eq("appointment_id", appointment_id)
                .eq("resolved", false)
                .order_by("created_at", SortDirection::Descending),
        )
        .await
    }

    /// Marks every open incident of `appointment_id` resolved.
    pub async fn resolve_for(&self, appointment_id: &str) -> Result<usize, AppointmentError> {
        let open = self.open_for(appointment_id).await?;
        let now = Utc::now();

        for incident in &open {
            self.store
                .update(
                    &Collection::BookingIncidents,
                    &incident.id,
                    json!({ "resolved": true, "resolved_at": now }),
                )
                .await
                .map_err(|e| AppointmentError::Store(e.to_string()))?;
        }

        if !open.is_empty() {
            info!("Resolved {} incident(s) for {}", open.len(), appointment_id);
        }
        Ok(open.len())
    }

    async fn query(&self, filter: &Filter) -> Result<Vec<BookingIncident>, AppointmentError> {
        let documents = self
            .store
            .query(&Collection::BookingIncidents, filter)
            .await
            .map_err(|e| AppointmentError::Store(e.to_string()))?;

        Ok(documents
            .into_iter()
            .filter_map(|document| match serde_json::from_value(document) {
                Ok(incident) => Some(incident),
                Err(e) => {
                    warn!("Skipping malformed incident: {}", e);
                    None
                }
            })
            .collect())
    }
}
