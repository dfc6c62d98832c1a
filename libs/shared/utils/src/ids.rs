use chrono::Utc;
use rand::Rng;

pub const APPOINTMENT_PREFIX: &str = "APT";
pub const DOCTOR_PREFIX: &str = "DOC";
pub const PATIENT_PREFIX: &str = "PAT";
pub const EMPLOYEE_PREFIX: &str = "EMP";

/// `<prefix><unix millis><0..1000>`, e.g. `APT1718000000000417`.
pub fn prefixed_id(prefix: &str) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("{}{}{}", prefix, Utc::now().timestamp_millis(), suffix)
}
