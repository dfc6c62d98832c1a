use std::sync::OnceLock;

use regex::Regex;

use shared_models::profile::RegistrationData;

use crate::models::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if email.len() > 254 || !regex.is_match(email) {
        return Err(AuthError::InvalidInput("Please enter a valid email address".to_string()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_registration(registration: &RegistrationData) -> Result<(), AuthError> {
    if registration.name().trim().is_empty() {
        return Err(AuthError::InvalidInput("Name is required".to_string()));
    }

    if let RegistrationData::Doctor(doctor) = registration {
        if doctor.slots.iter().any(|slot| slot.trim().is_empty()) {
            return Err(AuthError::InvalidInput("Slot labels cannot be empty".to_string()));
        }
    }
    Ok(())
}
