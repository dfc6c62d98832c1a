use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::store::{CasOutcome, Collection, DocumentStore, Filter};

/// In-process document store for local runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: &Collection) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &Collection, id: &str) -> Result<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(&self, collection: &Collection, id: &str, document: Value) -> Result<()> {
        if !document.is_object() {
            return Err(anyhow!("Documents must be JSON objects"));
        }
        debug!("memory set {}/{}", collection, id);
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.clone())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn update(&self, collection: &Collection, id: &str, fields: Value) -> Result<()> {
        let fields = fields
            .as_object()
            .ok_or_else(|| anyhow!("Update fields must be a JSON object"))?;

        let mut collections = self.collections.write().await;
        let document = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| anyhow!("Document not found: {}/{}", collection, id))?;

        for (key, value) in fields {
            document.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn query(&self, collection: &Collection, filter: &Filter) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        let matching = collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(filter.arrange(matching))
    }

    async fn compare_and_set(
        &self,
        collection: &Collection,
        id: &str,
        path: &[&str],
        expected: &Value,
        new: Value,
    ) -> Result<CasOutcome> {
        let mut collections = self.collections.write().await;
        let Some(mut node) = collections.get_mut(collection).and_then(|docs| docs.get_mut(id)) else {
            return Ok(CasOutcome::Missing);
        };

        for segment in path {
            node = match node.get_mut(*segment) {
                Some(child) => child,
                None => return Ok(CasOutcome::Missing),
            };
        }

        if *node != *expected {
            return Ok(CasOutcome::Mismatch {
                current: node.clone(),
            });
        }

        *node = new;
        Ok(CasOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn update_merges_top_level_fields() {
        let store = MemoryStore::new();
        store
            .set(&Collection::Users, "u1", json!({"email": "a@b.com", "user_type": "patient"}))
            .await
            .unwrap();
        store
            .update(&Collection::Users, "u1", json!({"is_verified": true}))
            .await
            .unwrap();

        let doc = store.get(&Collection::Users, "u1").await.unwrap().unwrap();
        assert_eq!(doc["email"], "a@b.com");
        assert_eq!(doc["is_verified"], true);
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let store = MemoryStore::new();
        let result = store.update(&Collection::Users, "ghost", json!({"a": 1})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn compare_and_set_reports_mismatch_and_missing() {
        let store = MemoryStore::new();
        store
            .set(&Collection::Doctors, "d1", json!({"slots": {"09-10": false}}))
            .await
            .unwrap();

        let first = store
            .compare_and_set(&Collection::Doctors, "d1", &["slots", "09-10"], &json!(false), json!(true))
            .await
            .unwrap();
        assert_eq!(first, CasOutcome::Applied);

        let second = store
            .compare_and_set(&Collection::Doctors, "d1", &["slots", "09-10"], &json!(false), json!(true))
            .await
            .unwrap();
        assert_eq!(second, CasOutcome::Mismatch { current: json!(true) });

        let unknown = store
            .compare_and_set(&Collection::Doctors, "d1", &["slots", "11-12"], &json!(false), json!(true))
            .await
            .unwrap();
        assert_eq!(unknown, CasOutcome::Missing);
    }

    #[tokio::test]
    async fn concurrent_compare_and_set_has_one_winner() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(&Collection::Doctors, "d1", json!({"slots": {"09-10": false}}))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .compare_and_set(&Collection::Doctors, "d1", &["slots", "09-10"], &json!(false), json!(true))
                    .await
                    .unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap() == CasOutcome::Applied {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }
}
