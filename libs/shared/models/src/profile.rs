use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::UserType;

// ==============================================================================
// STORED PROFILES
// ==============================================================================

/// Doctor profile stored under `doctors/{user_id}`.
///
/// `slots` maps a doctor-defined label such as `"09-10"` to its booked flag.
/// A `true` flag blocks further bookings of that label until it is reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorProfile {
    pub user_id: String,
    pub doctor_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub specialization: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub slots: BTreeMap<String, bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorProfile {
    pub fn available_slots(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|(_, booked)| !**booked)
            .map(|(label, _)| label.clone())
            .collect()
    }

    pub fn has_available_slot(&self) -> bool {
        self.slots.values().any(|booked| !booked)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    pub user_id: String,
    pub patient_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub emergency_contact: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManagementProfile {
    pub user_id: String,
    pub emp_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default = "default_status")]
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_status() -> String {
    "active".to_string()
}

/// A user's type-specific profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "user_type", rename_all = "snake_case")]
pub enum Profile {
    Doctor(DoctorProfile),
    Patient(PatientProfile),
    Management(ManagementProfile),
}

impl Profile {
    pub fn user_type(&self) -> UserType {
        match self {
            Profile::Doctor(_) => UserType::Doctor,
            Profile::Patient(_) => UserType::Patient,
            Profile::Management(_) => UserType::Management,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Profile::Doctor(p) => &p.user_id,
            Profile::Patient(p) => &p.user_id,
            Profile::Management(p) => &p.user_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Profile::Doctor(p) => &p.name,
            Profile::Patient(p) => &p.name,
            Profile::Management(p) => &p.name,
        }
    }
}

// ==============================================================================
// REGISTRATION DATA
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorRegistration {
    pub name: String,
    pub specialization: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    /// Slot labels this doctor offers, all initially free.
    #[serde(default)]
    pub slots: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientRegistration {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<Gender>,
    pub emergency_contact: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagementRegistration {
    pub name: String,
    pub role: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "user_type", rename_all = "snake_case")]
pub enum RegistrationData {
    Doctor(DoctorRegistration),
    Patient(PatientRegistration),
    Management(ManagementRegistration),
}

impl RegistrationData {
    pub fn user_type(&self) -> UserType {
        match self {
            RegistrationData::Doctor(_) => UserType::Doctor,
            RegistrationData::Patient(_) => UserType::Patient,
            RegistrationData::Management(_) => UserType::Management,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RegistrationData::Doctor(d) => &d.name,
            RegistrationData::Patient(p) => &p.name,
            RegistrationData::Management(m) => &m.name,
        }
    }
}
