use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::{
    CancerType, ClassificationError, ClassificationResult, ImageUpload, ModelInfo, ServiceHealth,
};

const PREDICT_TIMEOUT: Duration = Duration::from_secs(60);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<ClassificationResult>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the image inference service.
pub struct ClassificationGateway {
    client: Client,
    base_url: String,
}

impl ClassificationGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.classification_api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Validates `upload` locally, then asks the service for a prediction.
    pub async fn classify(
        &self,
        upload: ImageUpload,
        cancer_type: CancerType,
    ) -> Result<ClassificationResult, ClassificationError> {
        upload.validate()?;

        let url = format!("{}/predict", self.base_url);
        debug!(
            "Classifying {} ({} bytes) as {}",
            upload.file_name,
            upload.bytes.len(),
            cancer_type
        );

        let part = multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|e| ClassificationError::UnsupportedContentType(e.to_string()))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("cancer_type", cancer_type.to_string());

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(PREDICT_TIMEOUT)
            .send()
            .await
            .map_err(unavailable)?;

        let body: PredictionResponse = read_json(response).await?;
        match body {
            PredictionResponse {
                success: true,
                result: Some(result),
                ..
            } => {
                info!(
                    "Predicted {} ({:.2}) for {} image",
                    result.predicted_class, result.confidence, cancer_type
                );
                Ok(result)
            }
            PredictionResponse { error, .. } => Err(ClassificationError::MalformedResponse(
                error.unwrap_or_else(|| "prediction missing from response".to_string()),
            )),
        }
    }

    pub async fn health(&self) -> Result<ServiceHealth, ClassificationError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(unavailable)?;
        read_json(response).await
    }

    /// Loaded models keyed by cancer type.
    pub async fn models(&self) -> Result<BTreeMap<String, ModelInfo>, ClassificationError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(unavailable)?;
        read_json(response).await
    }
}

fn unavailable(err: reqwest::Error) -> ClassificationError {
    if err.is_timeout() {
        warn!("Classification service timed out: {}", err);
    } else {
        warn!("Classification service unreachable: {}", err);
    }
    ClassificationError::ServiceUnavailable(err.to_string())
}

/// Maps 5xx to unavailability and other failures to the service's own message.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClassificationError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| ClassificationError::MalformedResponse(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {}", status));

    if status.is_server_error() {
        error!("Classification service failed ({}): {}", status, message);
        Err(ClassificationError::ServiceUnavailable(message))
    } else {
        warn!("Classification request rejected ({}): {}", status, message);
        Err(ClassificationError::Rejected(message))
    }
}
