//! Module dedicated to the in-memory counter store.
//!
//! Useful for tests and for hosts whose runtime already persists
//! process state for them. The counters are kept as JSON strings
//! under their persisted keys, exactly the layout a property-store
//! backed implementation would use.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::Result;

use super::{counter_key, parse_counter_key, CounterStore, DailyCounter};

/// The in-memory, JSON-backed counter store.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, date: NaiveDate) -> Result<Option<DailyCounter>> {
        let entries = self.entries.lock().await;

        match entries.get(&counter_key(date)) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, date: NaiveDate, counter: DailyCounter) -> Result<()> {
        let json = serde_json::to_string(&counter)?;
        self.entries.lock().await.insert(counter_key(date), json);
        Ok(())
    }

    async fn delete(&self, date: NaiveDate) -> Result<()> {
        self.entries.lock().await.remove(&counter_key(date));
        Ok(())
    }

    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let entries = self.entries.lock().await;
        Ok(entries.keys().filter_map(|k| parse_counter_key(k)).collect())
    }
}
