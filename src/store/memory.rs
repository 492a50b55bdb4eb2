//! In-memory content store

use super::*;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local content store. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, ContentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Keys of all stored records, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.records.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_by_key(&self, key: &str) -> StoreResult<Option<ContentRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn create(&self, key: &str, text: &str, metadata: RecordMetadata) -> StoreResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(key) {
            return Err(StoreError::Duplicate(key.to_string()));
        }

        records.insert(
            key.to_string(),
            ContentRecord {
                key: key.to_string(),
                text: text.to_string(),
                metadata,
            },
        );
        Ok(())
    }

    async fn delete_by_key(&self, key: &str) -> StoreResult<()> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn list_items(&self, source: &str) -> StoreResult<Vec<ContentRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.metadata.kind == RecordKind::Item && r.metadata.source == source)
            .cloned()
            .collect())
    }
}
