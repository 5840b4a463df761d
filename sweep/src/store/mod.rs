//! # Store module
//!
//! Module dedicated to daily counter persistence. Cleanup runs
//! accumulate what they deleted into one [`DailyCounter`] per
//! calendar date, persisted as JSON through the narrow
//! [`CounterStore`] feature so the storage backend (file, embedded
//! database, cloud property store) stays swappable.

pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{message::delete::DeletionOutcome, Result};

/// The prefix of persisted counter keys.
const COUNTER_KEY_PREFIX: &str = "cleanup_";

/// The accumulated cleanup activity of one calendar date.
///
/// Created lazily on the first completed real (non-simulated) run of
/// a date, mutated by accumulation only, and removed by the retention
/// sweep once older than the configured retention window.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DailyCounter {
    /// How many messages were deleted that date.
    pub messages_deleted: u64,

    /// How many bytes deleting them freed (estimated).
    pub bytes_freed: u64,

    /// How many cleanup runs completed that date.
    pub run_count: u32,
}

impl DailyCounter {
    /// Fold one run's outcome into the counter.
    pub fn accumulate(&mut self, outcome: &DeletionOutcome) {
        self.messages_deleted += outcome.messages_processed as u64;
        self.bytes_freed += outcome.bytes_freed;
        self.run_count += 1;
    }
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Get the counter of the given date, if any.
    async fn get(&self, date: NaiveDate) -> Result<Option<DailyCounter>>;

    /// Put the counter of the given date, replacing any previous one.
    async fn put(&self, date: NaiveDate, counter: DailyCounter) -> Result<()>;

    /// Delete the counter of the given date.
    async fn delete(&self, date: NaiveDate) -> Result<()>;

    /// List all dates a counter exists for.
    async fn list_dates(&self) -> Result<Vec<NaiveDate>>;
}

/// The persisted key of the given date's counter.
pub fn counter_key(date: NaiveDate) -> String {
    format!("{COUNTER_KEY_PREFIX}{}", date.format("%Y-%m-%d"))
}

/// The date of the given persisted counter key, if it is one.
pub fn parse_counter_key(key: &str) -> Option<NaiveDate> {
    let date = key.strip_prefix(COUNTER_KEY_PREFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Fold one run's outcome into the given date's persisted counter.
///
/// Read-modify-write: safe because the cleanup lock guarantees a
/// single writer per date key at a time.
pub async fn record(
    store: &dyn CounterStore,
    date: NaiveDate,
    outcome: &DeletionOutcome,
) -> Result<()> {
    let mut counter = store.get(date).await?.unwrap_or_default();
    counter.accumulate(outcome);

    debug!(
        "recorded cleanup run: {} messages, ~{} bytes (daily total: {} messages)",
        outcome.messages_processed, outcome.bytes_freed, counter.messages_deleted,
    );

    store.put(date, counter).await
}

/// Delete every counter older than the given retention window.
pub async fn sweep(store: &dyn CounterStore, today: NaiveDate, retention_days: i64) -> Result<()> {
    for date in store.list_dates().await? {
        if (today - date).num_days() > retention_days {
            debug!("sweeping expired cleanup counter of {date}");
            store.delete(date).await?;
        }
    }

    Ok(())
}
