use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::store::{CasOutcome, Collection, DocumentStore, Filter, SortDirection};
use crate::supabase::SupabaseClient;

/// `DocumentStore` over Supabase PostgREST tables.
///
/// Every table has an `id` primary key (scoped tables use `(patient_id, id)`)
/// and one column per top-level document field. Nested maps such as a
/// doctor's `slots` are `jsonb` columns.
pub struct SupabaseStore {
    supabase: SupabaseClient,
}

#[derive(Debug, Deserialize)]
struct CasResponse {
    found: bool,
    applied: bool,
    #[serde(default)]
    current: Value,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::with_api_key(config, config.store_api_key()),
        }
    }

    fn row_path(collection: &Collection, id: &str) -> String {
        let mut path = format!(
            "/rest/v1/{}?id=eq.{}",
            collection.table(),
            urlencoding::encode(id)
        );
        if let Some((column, value)) = collection.scope() {
            path.push_str(&format!("&{}=eq.{}", column, urlencoding::encode(value)));
        }
        path
    }

    fn query_path(collection: &Collection, filter: &Filter) -> String {
        let mut params: Vec<String> = Vec::new();

        if let Some((column, value)) = collection.scope() {
            params.push(format!("{}=eq.{}", column, urlencoding::encode(value)));
        }
        for (field, value) in &filter.conditions {
            params.push(format!("{}=eq.{}", field, urlencoding::encode(&filter_value(value))));
        }
        if let Some((field, direction)) = &filter.order_by {
            let direction = match direction {
                SortDirection::Ascending => "asc",
                SortDirection::Descending => "desc",
            };
            params.push(format!("order={}.{}", field, direction));
        }
        if let Some(limit) = filter.limit {
            params.push(format!("limit={}", limit));
        }

        if params.is_empty() {
            format!("/rest/v1/{}", collection.table())
        } else {
            format!("/rest/v1/{}?{}", collection.table(), params.join("&"))
        }
    }

    fn prefer(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static(value));
        headers
    }
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    async fn get(&self, collection: &Collection, id: &str) -> Result<Option<Value>> {
        let path = Self::row_path(collection, id);
        debug!("Fetching {}/{}", collection, id);

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await?;

        Ok(rows.into_iter().next())
    }

    async fn set(&self, collection: &Collection, id: &str, document: Value) -> Result<()> {
        let mut row = match document {
            Value::Object(map) => map,
            _ => return Err(anyhow!("Documents must be JSON objects")),
        };
        row.insert("id".to_string(), json!(id));

        let conflict_target = match collection.scope() {
            Some((column, value)) => {
                row.insert(column.to_string(), json!(value));
                format!("{},id", column)
            }
            None => "id".to_string(),
        };

        let path = format!("/rest/v1/{}?on_conflict={}", collection.table(), conflict_target);
        debug!("Upserting {}/{}", collection, id);

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &path,
                None,
                Some(Value::Object(row)),
                Some(Self::prefer("resolution=merge-duplicates,return=representation")),
            )
            .await?;

        Ok(())
    }

    async fn update(&self, collection: &Collection, id: &str, fields: Value) -> Result<()> {
        if !fields.is_object() {
            return Err(anyhow!("Update fields must be a JSON object"));
        }

        let path = Self::row_path(collection, id);
        debug!("Updating {}/{}", collection, id);

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(fields),
                Some(Self::prefer("return=representation")),
            )
            .await?;

        if rows.is_empty() {
            return Err(anyhow!("Document not found: {}/{}", collection, id));
        }

        Ok(())
    }

    async fn query(&self, collection: &Collection, filter: &Filter) -> Result<Vec<Value>> {
        let path = Self::query_path(collection, filter);
        debug!("Querying {}", path);

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await?;

        Ok(rows)
    }

    async fn compare_and_set(
        &self,
        collection: &Collection,
        id: &str,
        path: &[&str],
        expected: &Value,
        new: Value,
    ) -> Result<CasOutcome> {
        if collection.scope().is_some() {
            return Err(anyhow!(
                "Conditional writes are not supported on nested collection {}",
                collection
            ));
        }

        let body = json!({
            "p_table": collection.table(),
            "p_id": id,
            "p_path": path,
            "p_expected": expected,
            "p_new": new,
        });

        let response: CasResponse = self
            .supabase
            .request(Method::POST, "/rest/v1/rpc/compare_and_set_field", None, Some(body))
            .await?;

        let outcome = match (response.found, response.applied) {
            (false, _) => CasOutcome::Missing,
            (true, true) => CasOutcome::Applied,
            (true, false) => CasOutcome::Mismatch {
                current: response.current,
            },
        };

        if !matches!(outcome, CasOutcome::Applied) {
            warn!("Conditional write on {}/{} not applied: {:?}", collection, id, outcome);
        }

        Ok(outcome)
    }
}
