//! Watermark Table
//!
//! Tracks, per source, the identifier of the newest item already processed.
//! A watermark only ever moves forward. The whole table is persisted as one
//! JSON record under [`STATE_KEY`]:
//!
//! ```json
//! { "watermark": { "alice": "1790000000000000001" }, "lastUpdated": 1717000000000 }
//! ```

use crate::source::{Item, ItemId};
use crate::store::{upsert_record, ContentStore, RecordMetadata, StoreError, StoreResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known key of the persisted engine state
pub const STATE_KEY: &str = "gleaner-engine-state";

/// Persisted form of the watermark table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineState {
    #[serde(default)]
    pub watermark: BTreeMap<String, ItemId>,
    /// Epoch milliseconds of the save
    #[serde(default)]
    pub last_updated: i64,
}

/// In-memory source → last processed item mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatermarkTable {
    marks: BTreeMap<String, ItemId>,
}

impl WatermarkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: &str) -> Option<&ItemId> {
        self.marks.get(source)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.marks.contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ItemId)> {
        self.marks.iter()
    }

    /// Move the watermark of `source` to `id`.
    ///
    /// Returns `false` and leaves the table untouched when `id` is not
    /// strictly greater than the current watermark.
    pub fn advance(&mut self, source: &str, id: ItemId) -> bool {
        match self.marks.get(source) {
            Some(current) if *current >= id => false,
            _ => {
                self.marks.insert(source.to_string(), id);
                true
            }
        }
    }

    /// Items of `items` (newest first) that are newer than the watermark.
    ///
    /// This is the leading run of items whose identifier is greater than the
    /// watermark; the scan stops at the first item at or below it, so older
    /// items further down an unsorted feed are not picked up. Pinned items
    /// sit at the head of a feed out of order: they never stop the scan and
    /// are only kept when newer than the watermark. Items without an
    /// identifier do not stop the scan either. Without a watermark every
    /// item is new.
    pub fn filter_new<'a>(&self, source: &str, items: &'a [Item]) -> Vec<&'a Item> {
        let Some(mark) = self.marks.get(source) else {
            return items.iter().collect();
        };

        let mut new_items = Vec::new();
        for item in items {
            match &item.id {
                Some(id) if id <= mark => {
                    if !item.is_pinned {
                        break;
                    }
                }
                _ => new_items.push(item),
            }
        }

        new_items
    }

    /// Snapshot for persistence, stamped with the current time
    pub fn to_state(&self) -> EngineState {
        EngineState {
            watermark: self.marks.clone(),
            last_updated: Utc::now().timestamp_millis(),
        }
    }

    /// Fold a persisted state into the table. Entries never move a
    /// watermark backwards. Returns the number of entries applied.
    pub fn merge_state(&mut self, state: EngineState) -> usize {
        state
            .watermark
            .into_iter()
            .filter(|(source, id)| self.advance(source, id.clone()))
            .count()
    }
}

/// Read the persisted engine state. `Ok(None)` when nothing was saved yet.
pub async fn load_state(store: &dyn ContentStore) -> StoreResult<Option<EngineState>> {
    let Some(record) = store.get_by_key(STATE_KEY).await? else {
        return Ok(None);
    };

    let state: EngineState = serde_json::from_str(&record.text)
        .map_err(|e| StoreError::Serialization(format!("corrupt engine state: {}", e)))?;

    Ok(Some(state))
}

/// Persist the engine state, replacing any previous copy
pub async fn save_state(store: &dyn ContentStore, state: &EngineState) -> StoreResult<()> {
    let text = serde_json::to_string(state)?;
    upsert_record(store, STATE_KEY, &text, RecordMetadata::state()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn items(ids: &[&str]) -> Vec<Item> {
        ids.iter().map(|id| Item::new(*id, "text")).collect()
    }

    fn ids<'a>(items: &[&'a Item]) -> Vec<&'a str> {
        items
            .iter()
            .copied()
            .map(|i| i.id.as_ref().map(|id| id.as_str()).unwrap_or("-"))
            .collect()
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut table = WatermarkTable::new();
        assert!(table.advance("alice", ItemId::new("10")));
        assert!(!table.advance("alice", ItemId::new("9")));
        assert!(!table.advance("alice", ItemId::new("10")));
        assert!(table.advance("alice", ItemId::new("11")));
        assert_eq!(table.get("alice"), Some(&ItemId::new("11")));
    }

    #[test]
    fn test_filter_without_watermark_keeps_all() {
        let table = WatermarkTable::new();
        let feed = items(&["3", "2", "1"]);
        assert_eq!(table.filter_new("alice", &feed).len(), 3);
    }

    #[test]
    fn test_filter_keeps_newer_prefix() {
        let mut table = WatermarkTable::new();
        table.advance("alice", ItemId::new("20"));

        let feed = items(&["23", "22", "20", "19"]);
        assert_eq!(ids(&table.filter_new("alice", &feed)), vec!["23", "22"]);
    }

    #[test]
    fn test_filter_stops_at_first_old_item_in_unsorted_feed() {
        let mut table = WatermarkTable::new();
        table.advance("alice", ItemId::new("20"));

        // 25 is newer than the watermark but sits behind an old item
        let feed = items(&["22", "18", "25"]);
        assert_eq!(ids(&table.filter_new("alice", &feed)), vec!["22"]);
    }

    #[test]
    fn test_filter_skips_over_missing_ids() {
        let mut table = WatermarkTable::new();
        table.advance("alice", ItemId::new("20"));

        let mut feed = items(&["22", "x", "21", "20"]);
        feed[1].id = None;
        assert_eq!(ids(&table.filter_new("alice", &feed)), vec!["22", "-", "21"]);
    }

    #[test]
    fn test_filter_looks_past_pinned_items() {
        let mut table = WatermarkTable::new();
        table.advance("alice", ItemId::new("20"));

        let mut feed = items(&["5", "23", "21", "30", "20", "19"]);
        feed[0].is_pinned = true;
        feed[3].is_pinned = true;
        assert_eq!(ids(&table.filter_new("alice", &feed)), vec!["23", "21", "30"]);

        // An old pinned item alone is nothing new
        feed.truncate(1);
        assert!(table.filter_new("alice", &feed).is_empty());
    }

    #[test]
    fn test_filter_nothing_new() {
        let mut table = WatermarkTable::new();
        table.advance("alice", ItemId::new("20"));
        let feed = items(&["20", "19"]);
        assert!(table.filter_new("alice", &feed).is_empty());
    }

    #[test]
    fn test_merge_state_never_regresses() {
        let mut table = WatermarkTable::new();
        table.advance("alice", ItemId::new("50"));

        let mut state = EngineState::default();
        state.watermark.insert("alice".to_string(), ItemId::new("40"));
        state.watermark.insert("bob".to_string(), ItemId::new("7"));

        assert_eq!(table.merge_state(state), 1);
        assert_eq!(table.get("alice"), Some(&ItemId::new("50")));
        assert_eq!(table.get("bob"), Some(&ItemId::new("7")));
    }

    #[test]
    fn test_state_json_layout() {
        let mut table = WatermarkTable::new();
        table.advance("alice", ItemId::new("42"));
        let state = table.to_state();

        let json: serde_json::Value = serde_json::to_value(&state).unwrap();
        assert_eq!(json["watermark"]["alice"], "42");
        assert!(json["lastUpdated"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryStore::new();
        assert!(load_state(&store).await.unwrap().is_none());

        let mut table = WatermarkTable::new();
        table.advance("alice", ItemId::new("42"));
        save_state(&store, &table.to_state()).await.unwrap();

        table.advance("alice", ItemId::new("43"));
        save_state(&store, &table.to_state()).await.unwrap();

        let loaded = load_state(&store).await.unwrap().unwrap();
        assert_eq!(loaded.watermark.get("alice"), Some(&ItemId::new("43")));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_load_corrupt_state_is_error() {
        let store = MemoryStore::new();
        store
            .create(STATE_KEY, "{not json", RecordMetadata::state())
            .await
            .unwrap();

        let err = load_state(&store).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
