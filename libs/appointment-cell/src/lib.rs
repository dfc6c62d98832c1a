pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Appointment, AppointmentError, BookingIncident, BookingStep};
pub use router::{appointment_routes, AppointmentState};
pub use services::{booking::BookingCoordinator, incidents::IncidentQueue, store::AppointmentStore};
