//! Module dedicated to cleanup planning.
//!
//! The [`CleanupPlanner`] converts a storage overage in bytes into a
//! concrete number of messages to delete, using the sampled average
//! message size. The resulting [`CleanupPlan`] never exceeds the hard
//! per-run cap nor the actual candidate pool size, so a bad size
//! estimate cannot produce a runaway deletion.

use tracing::debug;

use crate::{message::size::SizeSampler, quota::StorageReading, Result};

/// The sized deletion plan of one cleanup run.
///
/// Created once per run, immutable, consumed exactly once by the
/// batch deleter.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CleanupPlan {
    /// How many messages the run should delete.
    pub messages_to_delete: usize,

    /// How many bytes deleting them should free, estimated from the
    /// sampled average.
    pub estimated_bytes_to_free: u64,

    /// The sampled average message size, in bytes.
    pub average_message_size_bytes: f64,

    /// How many messages matched the target query (safety-capped).
    pub candidate_pool_size: usize,
}

impl CleanupPlan {
    /// Whether the plan deletes nothing.
    pub fn is_noop(&self) -> bool {
        self.messages_to_delete == 0
    }
}

/// The cleanup planning engine.
#[derive(Clone)]
pub struct CleanupPlanner {
    sampler: SizeSampler,
}

impl CleanupPlanner {
    pub fn new(sampler: SizeSampler) -> Self {
        Self { sampler }
    }

    /// Compute how many messages matching the given query must be
    /// deleted to bring usage back to the given target ratio.
    pub async fn plan(
        &self,
        usage: &StorageReading,
        target_ratio: f64,
        query: &str,
        hard_cap: usize,
        sample_size: usize,
    ) -> Result<CleanupPlan> {
        let overage_ratio = (usage.usage_ratio() - target_ratio).max(0.0);
        let bytes_to_free = overage_ratio * usage.total_bytes as f64;

        if bytes_to_free <= 0.0 {
            debug!("usage already at or under target, nothing to free");
            return Ok(CleanupPlan::default());
        }

        debug!("need to free {bytes_to_free:.0} bytes");

        let sample = self.sampler.sample(query, sample_size).await?;

        if sample.total_matching_messages == 0 || sample.average_size_bytes <= 0.0 {
            debug!("no deletion candidate matching {query}");
            return Ok(CleanupPlan {
                average_message_size_bytes: sample.average_size_bytes,
                candidate_pool_size: sample.total_matching_messages,
                ..Default::default()
            });
        }

        let needed = (bytes_to_free / sample.average_size_bytes).ceil() as usize;
        let messages_to_delete = needed
            .min(hard_cap)
            .min(sample.total_matching_messages);
        let estimated_bytes_to_free =
            (messages_to_delete as f64 * sample.average_size_bytes) as u64;

        debug!(
            "cleanup plan: delete {messages_to_delete} of {} candidates (computed need: {needed}, hard cap: {hard_cap})",
            sample.total_matching_messages,
        );

        Ok(CleanupPlan {
            messages_to_delete,
            estimated_bytes_to_free,
            average_message_size_bytes: sample.average_size_bytes,
            candidate_pool_size: sample.total_matching_messages,
        })
    }
}
