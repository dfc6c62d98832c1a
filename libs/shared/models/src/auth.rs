use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Caller identity extracted from a validated bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Account type from `user_metadata.user_type`, falling back to the role claim.
    pub fn user_type(&self) -> Option<UserType> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get("user_type"))
            .and_then(|value| value.as_str())
            .or(self.role.as_deref())
            .and_then(|value| value.parse().ok())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Doctor,
    Patient,
    Management,
}

impl UserType {
    /// Collection holding the type-specific profile document.
    pub fn profile_collection(&self) -> &'static str {
        match self {
            UserType::Doctor => "doctors",
            UserType::Patient => "patients",
            UserType::Management => "management",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::Doctor => write!(f, "doctor"),
            UserType::Patient => write!(f, "patient"),
            UserType::Management => write!(f, "management"),
        }
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "doctor" => Ok(UserType::Doctor),
            "patient" => Ok(UserType::Patient),
            "management" => Ok(UserType::Management),
            other => Err(format!("Unknown user type: {}", other)),
        }
    }
}

/// Base identity record stored under `users/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaseUser {
    pub id: String,
    pub email: String,
    pub user_type: UserType,
    #[serde(default)]
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_type_round_trips_through_strings() {
        for user_type in [UserType::Doctor, UserType::Patient, UserType::Management] {
            assert_eq!(user_type.to_string().parse::<UserType>().unwrap(), user_type);
        }
        assert!("nurse".parse::<UserType>().is_err());
    }

    #[test]
    fn user_type_prefers_metadata_over_role() {
        let mut user = User {
            id: "u1".to_string(),
            email: None,
            role: Some("authenticated".to_string()),
            metadata: Some(serde_json::json!({ "user_type": "doctor" })),
            created_at: None,
        };
        assert_eq!(user.user_type(), Some(UserType::Doctor));

        user.metadata = None;
        assert_eq!(user.user_type(), None);

        user.role = Some("management".to_string());
        assert_eq!(user.user_type(), Some(UserType::Management));
    }

    #[test]
    fn profile_collections_match_user_type() {
        assert_eq!(UserType::Doctor.profile_collection(), "doctors");
        assert_eq!(UserType::Patient.profile_collection(), "patients");
        assert_eq!(UserType::Management.profile_collection(), "management");
    }
}
