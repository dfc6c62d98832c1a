use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Extension, Multipart, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use shared_models::auth::{User, UserType};
use shared_models::error::AppError;
use shared_utils::extractor::require_user_type;

use crate::models::{CancerType, ClassificationError, ClassificationRecord, ImageUpload, ModelInfo};
use crate::router::ClassificationState;
use crate::services::{gateway::ClassificationGateway, history::ClassificationHistory};

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        ClassificationError::InvalidUpload(err.body_text()).into()
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

pub async fn service_health(
    State(state): State<Arc<ClassificationState>>,
) -> Result<Json<Value>, AppError> {
    let health = ClassificationGateway::new(&state.config).health().await?;

    Ok(Json(json!({
        "status": health.status,
        "service_available": health.is_healthy(),
        "models_loaded": health.models_loaded,
    })))
}

pub async fn list_models(
    State(state): State<Arc<ClassificationState>>,
) -> Result<Json<BTreeMap<String, ModelInfo>>, AppError> {
    let models = ClassificationGateway::new(&state.config).models().await?;
    Ok(Json(models))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

/// Multipart form with a `file` image and a `cancer_type` of brain, lung or skin.
pub async fn classify_image(
    State(state): State<Arc<ClassificationState>>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let user_type = require_user_type(&user, &[UserType::Patient, UserType::Doctor])?;

    let mut upload = None;
    let mut cancer_type = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(multipart_error)?;
                upload = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "cancer_type" => {
                let value = field
                    .text()
                    .await
                    .map_err(multipart_error)?;
                cancer_type = Some(value.parse::<CancerType>()?);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ClassificationError::InvalidUpload("No file provided".to_string()))?;
    let cancer_type = cancer_type
        .ok_or_else(|| ClassificationError::InvalidUpload("No cancer_type provided".to_string()))?;

    let result = ClassificationGateway::new(&state.config)
        .classify(upload, cancer_type)
        .await?;

    // The prediction stands even if saving it fails
    let record_id = match ClassificationHistory::new(Arc::clone(&state.store))
        .record(&user.id, user_type, &result, None)
        .await
    {
        Ok(record) => Some(record.id),
        Err(e) => {
            warn!("Could not save classification for {}: {}", user.id, e);
            None
        }
    };
    info!("User {} classified a {} image", user.id, cancer_type);

    Ok(Json(json!({
        "success": true,
        "result": result,
        "record_id": record_id,
    })))
}

pub async fn get_history(
    State(state): State<Arc<ClassificationState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<ClassificationRecord>>, AppError> {
    let history = ClassificationHistory::new(Arc::clone(&state.store))
        .for_user(&user.id)
        .await?;
    Ok(Json(history))
}
