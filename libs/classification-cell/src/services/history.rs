use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{Collection, DocumentStore, Filter, SortDirection};
use shared_models::auth::UserType;

use crate::models::{ClassificationError, ClassificationRecord, ClassificationResult};

/// Saved predictions per user.
pub struct ClassificationHistory {
    store: Arc<dyn DocumentStore>,
}

impl ClassificationHistory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        user_id: &str,
        user_type: UserType,
        result: &ClassificationResult,
        image_url: Option<String>,
    ) -> Result<ClassificationRecord, ClassificationError> {
        let record = ClassificationRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            user_type,
            cancer_type: result.cancer_type.clone(),
            predicted_class: result.predicted_class.clone(),
            confidence: result.confidence,
            all_probabilities: result.all_probabilities.clone(),
            image_url,
            created_at: Utc::now(),
        };

        let document = serde_json::to_value(&record)
            .map_err(|e| ClassificationError::Store(e.to_string()))?;
        self.store
            .set(&Collection::Classifications, &record.id, document)
            .await
            .map_err(|e| ClassificationError::Store(e.to_string()))?;

        debug!("Saved classification {} for {}", record.id, user_id);
        Ok(record)
    }

    /// Newest first.
    pub async fn for_user(&self, user_id: &str) -> Result<Vec<ClassificationRecord>, ClassificationError> {
        let documents = self
            .store
            .query(
                &Collection::Classifications,
                &Filter::new()
                    .eq("user_id", user_id)
                    .order_by("created_at", SortDirection::Descending),
            )
            .await
            .map_err(|e| ClassificationError::Store(e.to_string()))?;

        Ok(documents
            .into_iter()
            .filter_map(|document| match serde_json::from_value(document) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed classification record: {}", e);
                    None
                }
            })
            .collect())
    }
}
