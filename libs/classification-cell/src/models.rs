use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_models::auth::UserType;
use shared_models::error::AppError;

/// Largest image the inference service accepts.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub const ALLOWED_CONTENT_TYPES: [&str; 5] = [
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/bmp",
    "image/tiff",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CancerType {
    Brain,
    Lung,
    Skin,
}

impl fmt::Display for CancerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancerType::Brain => write!(f, "brain"),
            CancerType::Lung => write!(f, "lung"),
            CancerType::Skin => write!(f, "skin"),
        }
    }
}

impl FromStr for CancerType {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "brain" => Ok(CancerType::Brain),
            "lung" => Ok(CancerType::Lung),
            "skin" => Ok(CancerType::Skin),
            other => Err(ClassificationError::InvalidCancerType(other.to_string())),
        }
    }
}

/// An image as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Checked before anything leaves the process.
    pub fn validate(&self) -> Result<(), ClassificationError> {
        let content_type = self.content_type.to_lowercase();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ClassificationError::UnsupportedContentType(
                self.content_type.clone(),
            ));
        }
        if self.bytes.is_empty() {
            return Err(ClassificationError::EmptyUpload);
        }
        if self.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ClassificationError::TooLarge {
                size: self.bytes.len(),
                limit: MAX_UPLOAD_BYTES,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationResult {
    pub predicted_class: String,
    pub confidence: f64,
    pub all_probabilities: BTreeMap<String, f64>,
    pub cancer_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub classes: Vec<String>,
    pub num_classes: usize,
    pub input_size: u32,
    #[serde(default)]
    pub version: Option<String>,
    /// A number, or `"N/A"` when the model was never evaluated.
    #[serde(default)]
    pub test_accuracy: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub models_loaded: Vec<String>,
    #[serde(default)]
    pub device: Option<String>,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// A stored classification under `classifications/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationRecord {
    pub id: String,
    pub user_id: String,
    pub user_type: UserType,
    pub cancer_type: String,
    pub predicted_class: String,
    pub confidence: f64,
    pub all_probabilities: BTreeMap<String, f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Invalid file type {0}. Please upload PNG, JPEG, BMP or TIFF image.")]
    UnsupportedContentType(String),

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("File size {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Invalid cancer_type {0}. Must be: brain, lung, or skin")]
    InvalidCancerType(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Classification service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Classification rejected: {0}")]
    Rejected(String),

    #[error("Unexpected classification response: {0}")]
    MalformedResponse(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<ClassificationError> for AppError {
    fn from(err: ClassificationError) -> Self {
        match err {
            ClassificationError::UnsupportedContentType(_)
            | ClassificationError::EmptyUpload
            | ClassificationError::InvalidCancerType(_)
            | ClassificationError::InvalidUpload(_)
            | ClassificationError::Rejected(_) => AppError::BadRequest(err.to_string()),
            ClassificationError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            ClassificationError::ServiceUnavailable(_) => AppError::ServiceUnavailable(err.to_string()),
            ClassificationError::MalformedResponse(_) => AppError::ExternalService(err.to_string()),
            ClassificationError::Store(msg) => AppError::Database(msg),
        }
    }
}
