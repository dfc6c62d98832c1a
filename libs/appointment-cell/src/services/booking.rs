use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};

use doctor_cell::models::{DoctorError, DoctorListing, SlotError};
use doctor_cell::{DoctorService, SlotRegistry};
use payment_cell::{
    Checkout, Payer, PaymentConfirmation, PaymentFailure, PaymentGateway,
    PaymentOrchestrator, PaymentOutcome,
};
use shared_config::AppConfig;
use shared_database::{Collection, DocumentStore};
use shared_models::profile::PatientProfile;
use shared_utils::ids::{prefixed_id, APPOINTMENT_PREFIX};
use video_conferencing_cell::MeetingRoomBinder;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, BookingConfirmation,
    BookingOutcome, BookingStep, BookingTicket, IncidentKind, PaymentStatus,
};
use crate::services::incidents::IncidentQueue;
use crate::services::store::AppointmentStore;

/// Runs a booking from reservation to commit.
///
/// The slot is checked before payment but only marked after the payment is
/// confirmed. `SlotRegistry::mark_booked` decides between concurrent payers;
/// the loser keeps its captured payment, is cancelled and goes to the
/// operator queue for a refund. Commit steps record their progress on the
/// appointment so `retry_commit` can resume where a failure stopped.
pub struct BookingCoordinator {
    appointments: AppointmentStore,
    doctors: DoctorService,
    slots: SlotRegistry,
    payments: PaymentOrchestrator,
    binder: MeetingRoomBinder,
    incidents: IncidentQueue,
    store: Arc<dyn DocumentStore>,
}

impl BookingCoordinator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        Self {
            appointments: AppointmentStore::new(Arc::clone(&store)),
            doctors: DoctorService::new(Arc::clone(&store)),
            slots: SlotRegistry::new(Arc::clone(&store)),
            payments: PaymentOrchestrator::new(gateway, config),
            binder: MeetingRoomBinder::new(config),
            incidents: IncidentQueue::new(Arc::clone(&store)),
            store,
        }
    }

    pub async fn patient_profile(&self, user_id: &str) -> Result<PatientProfile, AppointmentError> {
        let document = self
            .store
            .get(&Collection::Patients, user_id)
            .await
            .map_err(|e| AppointmentError::Store(e.to_string()))?
            .ok_or_else(|| AppointmentError::PatientNotFound(user_id.to_string()))?;

        serde_json::from_value(document)
            .map_err(|e| AppointmentError::Store(format!("Malformed patient {}: {}", user_id, e)))
    }

    // ==========================================================================
    // FULL FLOW
    // ==========================================================================

    /// Reserves, hands the order to `checkout`, and commits or records the failure.
    pub async fn book(
        &self,
        patient: &PatientProfile,
        request: &BookAppointmentRequest,
        checkout: &dyn Checkout,
    ) -> Result<BookingOutcome, AppointmentError> {
        let ticket = self.begin_booking(patient, request).await?;
        let appointment_id = ticket.appointment.id.clone();

        match checkout.open(&ticket.checkout).await {
            PaymentOutcome::Succeeded(confirmation) => {
                let confirmed = self.confirm_payment(&appointment_id, &confirmation).await?;
                Ok(BookingOutcome::Booked(confirmed))
            }
            PaymentOutcome::Failed(failure) => {
                let appointment = self.abandon_payment(&appointment_id, &failure).await?;
                Ok(BookingOutcome::PaymentFailed {
                    appointment,
                    reason: failure.reason,
                })
            }
        }
    }

    // ==========================================================================
    // RESERVE AND INITIATE PAYMENT
    // ==========================================================================

    pub async fn begin_booking(
        &self,
        patient: &PatientProfile,
        request: &BookAppointmentRequest,
    ) -> Result<BookingTicket, AppointmentError> {
        let appointment = self.reserve(patient, request).await?;

        let payer = Payer {
            name: patient.name.clone(),
            email: patient.email.clone(),
            contact: patient.phone.clone(),
        };

        let (order, checkout) = match self.payments.initiate(&appointment.id, &payer).await {
            Ok(initiated) => initiated,
            Err(e) => {
                warn!(
                    "Payment initiation failed for {}; record stays pending: {}",
                    appointment.id, e
                );
                return Err(e.into());
            }
        };

        self.appointments
            .record_order(&appointment.id, &order.id)
            .await?;

        let appointment = Appointment {
            payment_order_id: Some(order.id.clone()),
            last_completed_step: BookingStep::PaymentInitiated,
            ..appointment
        };
        Ok(BookingTicket {
            appointment,
            order,
            checkout,
        })
    }

    async fn reserve(
        &self,
        patient: &PatientProfile,
        request: &BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let doctor = self
            .doctors
            .get_doctor(&request.doctor_id)
            .await
            .map_err(doctor_error)?;

        match doctor.slots.get(&request.time_slot) {
            None => {
                return Err(AppointmentError::UnknownSlot {
                    doctor_id: request.doctor_id.clone(),
                    slot: request.time_slot.clone(),
                })
            }
            Some(true) => {
                return Err(AppointmentError::SlotUnavailable {
                    doctor_id: request.doctor_id.clone(),
                    slot: request.time_slot.clone(),
                })
            }
            Some(false) => {}
        }

        let now = Utc::now();
        let id = prefixed_id(APPOINTMENT_PREFIX);
        let appointment = Appointment {
            meet_link: self.binder.bind(&id, now),
            id,
            patient_id: patient.user_id.clone(),
            patient_name: patient.name.clone(),
            patient_email: patient.email.clone(),
            doctor_id: doctor.user_id.clone(),
            doctor_name: doctor.name.clone(),
            doctor_email: doctor.email.clone(),
            time_slot: request.time_slot.clone(),
            appointment_date: request.appointment_date.unwrap_or(now),
            status: AppointmentStatus::Scheduled,
            payment_status: PaymentStatus::Pending,
            payment_order_id: None,
            razorpay_order_id: None,
            razorpay_payment_id: None,
            razorpay_signature: None,
            amount: self.payments.consultation_fee(),
            last_completed_step: BookingStep::Reserved,
            created_at: now,
            updated_at: now,
        };

        self.appointments.create(&appointment).await?;
        info!(
            "Reserved appointment {} for patient {} with doctor {} at {}",
            appointment.id, appointment.patient_id, appointment.doctor_id, appointment.time_slot
        );
        Ok(appointment)
    }

    // ==========================================================================
    // CHECKOUT CALLBACKS
    // ==========================================================================

    /// Verifies the checkout result and commits the booking.
    ///
    /// The payment must be for the order opened on this appointment. Only
    /// one delivery of a confirmation moves the payment out of pending; a
    /// repeat of an accepted confirmation returns the committed booking.
    pub async fn confirm_payment(
        &self,
        appointment_id: &str,
        confirmation: &PaymentConfirmation,
    ) -> Result<BookingConfirmation, AppointmentError> {
        let appointment = self.appointments.get(appointment_id).await?;

        match appointment.payment_status {
            PaymentStatus::Pending => {}
            PaymentStatus::Completed => return self.repeated_confirmation(appointment, confirmation).await,
            PaymentStatus::Failed => {
                return Err(AppointmentError::PaymentNotPending(appointment_id.to_string()))
            }
        }

        if appointment.status != AppointmentStatus::Scheduled {
            return Err(AppointmentError::NotPayable {
                appointment_id: appointment.id,
                status: appointment.status,
            });
        }
        if appointment.payment_order_id.as_deref() != Some(confirmation.order_id.as_str()) {
            warn!(
                "Confirmation for {} carries order {} instead of {:?}",
                appointment_id, confirmation.order_id, appointment.payment_order_id
            );
            return Err(AppointmentError::OrderMismatch {
                appointment_id: appointment.id,
                order_id: confirmation.order_id.clone(),
            });
        }

        self.payments.confirm(confirmation)?;

        if !self.appointments.claim_payment(appointment_id).await? {
            debug!("Another confirmation of {} got there first", appointment_id);
            let current = self.appointments.get(appointment_id).await?;
            return self.repeated_confirmation(current, confirmation).await;
        }

        self.run_commit(appointment, Some(confirmation), false).await
    }

    async fn repeated_confirmation(
        &self,
        appointment: Appointment,
        confirmation: &PaymentConfirmation,
    ) -> Result<BookingConfirmation, AppointmentError> {
        if appointment.payment_status != PaymentStatus::Completed {
            return Err(AppointmentError::PaymentNotPending(appointment.id));
        }
        match appointment.razorpay_payment_id.as_deref() {
            Some(payment_id) if payment_id == confirmation.payment_id => {}
            Some(_) => return Err(AppointmentError::PaymentNotPending(appointment.id)),
            // Claimed, evidence not written yet
            None => return Err(AppointmentError::CommitInProgress(appointment.id)),
        }
        if appointment.status == AppointmentStatus::Cancelled && !appointment.is_committed() {
            return Err(AppointmentError::SlotConflict {
                appointment_id: appointment.id,
                slot: appointment.time_slot,
            });
        }
        if !appointment.is_committed() {
            return Err(AppointmentError::CommitInProgress(appointment.id));
        }

        debug!("Repeated confirmation for {}", appointment.id);
        self.run_commit(appointment, None, false).await
    }

    /// Records a checkout that did not complete. A payer cancellation leaves
    /// the payment pending; a gateway rejection marks it failed.
    pub async fn abandon_payment(
        &self,
        appointment_id: &str,
        failure: &PaymentFailure,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments.get(appointment_id).await?;
        if appointment.payment_status != PaymentStatus::Pending {
            return Err(AppointmentError::PaymentNotPending(appointment_id.to_string()));
        }

        if self.payments.record_failure(appointment_id, failure) {
            self.appointments
                .update(appointment_id, json!({ "payment_status": PaymentStatus::Failed }))
                .await?;
            return self.appointments.get(appointment_id).await;
        }

        Ok(appointment)
    }

    // ==========================================================================
    // COMMIT
    // ==========================================================================

    /// Management retry of a paid booking whose commit stopped part way.
    pub async fn retry_commit(&self, appointment_id: &str) -> Result<BookingConfirmation, AppointmentError> {
        let appointment = self.appointments.get(appointment_id).await?;

        if appointment.status == AppointmentStatus::Cancelled && !appointment.is_committed() {
            return Err(AppointmentError::NothingToRetry(appointment_id.to_string()));
        }

        let evidence = if appointment.last_completed_step < BookingStep::PaymentConfirmed {
            let open = self.incidents.open_for(appointment_id).await?;
            let evidence = open.into_iter().find_map(|incident| incident.payment);
            if evidence.is_none() {
                return Err(AppointmentError::NothingToRetry(appointment_id.to_string()));
            }
            evidence
        } else {
            None
        };

        info!(
            "Retrying commit of {} from {}",
            appointment_id, appointment.last_completed_step
        );
        let confirmed = self.run_commit(appointment, evidence.as_ref(), true).await?;

        if let Err(e) = self.incidents.resolve_for(appointment_id).await {
            error!("Commit of {} succeeded but incidents stay open: {}", appointment_id, e);
        }
        Ok(confirmed)
    }

    /// Runs the commit steps after `last_completed_step`.
    ///
    /// With `adopt`, a slot already flagged booked is taken as ours when no
    /// other paid appointment holds it: an earlier attempt flagged it and
    /// failed before recording the step.
    async fn run_commit(
        &self,
        mut appointment: Appointment,
        confirmation: Option<&PaymentConfirmation>,
        adopt: bool,
    ) -> Result<BookingConfirmation, AppointmentError> {
        let id = appointment.id.clone();

        if appointment.last_completed_step < BookingStep::PaymentConfirmed {
            let Some(confirmation) = confirmation else {
                return Err(AppointmentError::NothingToRetry(id));
            };
            appointment.razorpay_order_id = Some(confirmation.order_id.clone());
            appointment.razorpay_payment_id = Some(confirmation.payment_id.clone());
            appointment.razorpay_signature = Some(confirmation.signature.clone());

            let written = self
                .appointments
                .update(
                    &id,
                    json!({
                        "payment_status": PaymentStatus::Completed,
                        "razorpay_order_id": confirmation.order_id,
                        "razorpay_payment_id": confirmation.payment_id,
                        "razorpay_signature": confirmation.signature,
                        "last_completed_step": BookingStep::PaymentConfirmed,
                    }),
                )
                .await;
            if let Err(e) = written {
                return Err(self
                    .commit_failed(&appointment, BookingStep::PaymentConfirmed, &e.to_string())
                    .await);
            }
            appointment.payment_status = PaymentStatus::Completed;
            appointment.last_completed_step = BookingStep::PaymentConfirmed;
            info!("Payment {} confirmed for {}", confirmation.payment_id, id);
        }

        if appointment.last_completed_step < BookingStep::SlotCommitted {
            match self
                .slots
                .mark_booked(&appointment.doctor_id, &appointment.time_slot)
                .await
            {
                Ok(()) => {}
                Err(SlotError::SlotAlreadyBooked { .. }) if adopt => {
                    match self.slot_held_by_other(&appointment).await {
                        Ok(false) => warn!(
                            "Slot {} of {} already flagged; adopting it for {}",
                            appointment.time_slot, appointment.doctor_id, id
                        ),
                        Ok(true) => return Err(self.lose_slot(&appointment).await),
                        Err(e) => {
                            return Err(self
                                .commit_failed(&appointment, BookingStep::SlotCommitted, &e.to_string())
                                .await)
                        }
                    }
                }
                Err(SlotError::SlotAlreadyBooked { .. }) => {
                    return Err(self.lose_slot(&appointment).await)
                }
                Err(e) => {
                    return Err(self
                        .commit_failed(&appointment, BookingStep::SlotCommitted, &e.to_string())
                        .await)
                }
            }

            if let Err(e) = self
                .appointments
                .record_step(&id, BookingStep::SlotCommitted)
                .await
            {
                return Err(self
                    .commit_failed(&appointment, BookingStep::SlotCommitted, &e.to_string())
                    .await);
            }
            appointment.last_completed_step = BookingStep::SlotCommitted;
        }

        if appointment.last_completed_step < BookingStep::PatientViewWritten {
            if let Err(e) = self.write_patient_view(&id).await {
                return Err(self
                    .commit_failed(&appointment, BookingStep::PatientViewWritten, &e.to_string())
                    .await);
            }
            info!("Appointment {} committed", id);
        }

        let appointment = self.appointments.get(&id).await?;
        let available_doctors = match self.doctors.available_doctors().await {
            Ok(doctors) => doctors.into_iter().map(DoctorListing::from).collect(),
            Err(e) => {
                warn!("Could not refresh available doctors after booking {}: {}", id, e);
                Vec::new()
            }
        };

        Ok(BookingConfirmation {
            appointment,
            available_doctors,
        })
    }

    async fn write_patient_view(&self, appointment_id: &str) -> Result<(), AppointmentError> {
        let current = self.appointments.get(appointment_id).await?;
        self.appointments
            .write_booked_view(&current, Utc::now())
            .await?;
        self.appointments
            .record_step(appointment_id, BookingStep::PatientViewWritten)
            .await
    }

    async fn slot_held_by_other(&self, appointment: &Appointment) -> Result<bool, AppointmentError> {
        let holders = self
            .appointments
            .paid_for_slot(&appointment.doctor_id, &appointment.time_slot)
            .await?;

        Ok(holders.iter().any(|other| {
            other.id != appointment.id
                && other.status != AppointmentStatus::Cancelled
                && other.last_completed_step >= BookingStep::SlotCommitted
        }))
    }

    /// The slot went to another payer: cancel, keep the captured payment on
    /// record and queue a refund.
    async fn lose_slot(&self, appointment: &Appointment) -> AppointmentError {
        warn!(
            "Appointment {} lost slot {} of {} after payment",
            appointment.id, appointment.time_slot, appointment.doctor_id
        );

        if let Err(e) = self
            .appointments
            .update(&appointment.id, json!({ "status": AppointmentStatus::Cancelled }))
            .await
        {
            error!("Could not cancel conflicting appointment {}: {}", appointment.id, e);
        }

        self.incidents
            .file(
                appointment,
                IncidentKind::RefundRequired,
                BookingStep::SlotCommitted,
                "Slot was booked by another patient after payment",
                appointment.payment_evidence(),
            )
            .await;

        AppointmentError::SlotConflict {
            appointment_id: appointment.id.clone(),
            slot: appointment.time_slot.clone(),
        }
    }

    async fn commit_failed(&self, appointment: &Appointment, step: BookingStep, reason: &str) -> AppointmentError {
        error!(
            "Payment succeeded but appointment update failed for {} at {}: {}",
            appointment.id, step, reason
        );

        self.incidents
            .file(
                appointment,
                IncidentKind::CommitFailed,
                step,
                reason,
                appointment.payment_evidence(),
            )
            .await;

        AppointmentError::CommitFailed {
            appointment_id: appointment.id.clone(),
            step,
        }
    }

    // ==========================================================================
    // LIFECYCLE
    // ==========================================================================

    /// `scheduled` may become `completed` or `cancelled`; nothing else moves.
    /// The booked view and the slot are left as they are.
    pub async fn update_status(
        &self,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments.get(appointment_id).await?;

        if appointment.status != AppointmentStatus::Scheduled || status == AppointmentStatus::Scheduled {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                to: status,
            });
        }

        self.appointments
            .update(appointment_id, json!({ "status": status }))
            .await?;
        info!("Appointment {} is now {}", appointment_id, status);

        self.appointments.get(appointment_id).await
    }

    pub fn appointments(&self) -> &AppointmentStore {
        &self.appointments
    }

    pub fn incidents(&self) -> &IncidentQueue {
        &self.incidents
    }
}

fn doctor_error(err: DoctorError) -> AppointmentError {
    match err {
        DoctorError::NotFound(id) => AppointmentError::DoctorNotFound(id),
        DoctorError::Slot(slot) => slot.into(),
        DoctorError::Store(msg) => AppointmentError::Store(msg),
    }
}
