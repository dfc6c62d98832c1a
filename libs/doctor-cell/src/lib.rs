pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{DoctorError, SlotError};
pub use router::{doctor_routes, DoctorState};
pub use services::{doctor::DoctorService, slots::SlotRegistry};
