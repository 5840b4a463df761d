//! Module dedicated to message deletion.
//!
//! The [`BatchDeleter`] executes a [`CleanupPlan`] in fixed-size
//! batches against the messages matching the target query. Batches
//! re-run the same search from offset zero, since already-deleted
//! items drop out of results. The deleter re-checks storage usage
//! mid-run and stops early once usage is back under the target, so an
//! undershooting size estimate never causes over-deletion.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::{
    cleanup::plan::CleanupPlan,
    folder,
    quota::QuotaOracle,
    Result,
};

use super::{
    search::SearchMessages,
    size::{structural_size_estimate, GetMessageSize},
    Id,
};

/// The maximum number of messages processed per search batch.
pub const DELETE_BATCH_SIZE: usize = 200;

/// How many processed messages happen between two mid-run storage
/// re-checks.
pub const RECHECK_EVERY: usize = 400;

/// The courtesy pause inserted between batches, to respect provider
/// rate limits.
const BATCH_PAUSE: Duration = Duration::from_millis(1000);

/// The pause between moving a message to trash and removing it
/// permanently, letting the move register on the provider side first.
const TRASH_MOVE_PAUSE: Duration = Duration::from_millis(500);

#[async_trait]
pub trait MoveToTrash: Send + Sync {
    /// Move the given message to the trash folder.
    async fn move_to_trash(&self, id: &Id) -> Result<()>;
}

#[async_trait]
pub trait RemoveMessages: Send + Sync {
    /// Remove the given message, definitely.
    ///
    /// Manipulate with caution: the message is permanently deleted,
    /// it cannot be restored from trash afterwards.
    async fn remove_message(&self, id: &Id) -> Result<()>;
}

/// The result of one deletion run.
///
/// In dry-run mode the counts represent what the run *would* have
/// affected: they accumulate exactly as in a real run, without any
/// mutation behind them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DeletionOutcome {
    pub messages_processed: usize,
    pub bytes_freed: u64,
}

/// The options of one deletion run.
#[derive(Clone, Copy, Debug)]
pub struct DeleteOptions {
    /// Simulate the run: no mutation is performed, sizes come from
    /// the cheap structural estimate rather than metadata fetches.
    pub dry_run: bool,

    /// The usage ratio the run aims at. The mid-run re-check stops
    /// the run early once usage is at or under this ratio.
    pub target_ratio: f64,
}

/// The batched deletion engine.
#[derive(Clone)]
pub struct BatchDeleter {
    search: Arc<dyn SearchMessages>,
    sizes: Arc<dyn GetMessageSize>,
    trash: Arc<dyn MoveToTrash>,
    remove: Arc<dyn RemoveMessages>,
    oracle: QuotaOracle,
}

impl BatchDeleter {
    pub fn new(
        search: Arc<dyn SearchMessages>,
        sizes: Arc<dyn GetMessageSize>,
        trash: Arc<dyn MoveToTrash>,
        remove: Arc<dyn RemoveMessages>,
        oracle: QuotaOracle,
    ) -> Self {
        Self {
            search,
            sizes,
            trash,
            remove,
            oracle,
        }
    }

    /// Execute the given cleanup plan against the messages matching
    /// the given query.
    ///
    /// Stops when the plan quota is reached, when a batch returns no
    /// matching message (pool exhausted), or when the mid-run
    /// re-check finds usage back at or under the target ratio.
    pub async fn execute(
        &self,
        query: &str,
        plan: &CleanupPlan,
        opts: DeleteOptions,
    ) -> Result<DeletionOutcome> {
        let mut outcome = DeletionOutcome::default();

        if plan.messages_to_delete == 0 {
            return Ok(outcome);
        }

        if opts.dry_run {
            debug!("dry run: simulating deletion of {} messages matching {query}", plan.messages_to_delete);
        } else {
            debug!("deleting {} messages matching {query}", plan.messages_to_delete);
        }

        let trash_target = query == folder::TRASH;
        let mut since_recheck = 0;

        'run: loop {
            let remaining = plan.messages_to_delete - outcome.messages_processed;
            if remaining == 0 {
                break;
            }

            let batch = self
                .search
                .search_message_ids(query, 0, remaining.min(DELETE_BATCH_SIZE))
                .await?;

            if batch.is_empty() {
                debug!("no more messages matching {query}, stopping");
                break;
            }

            let mut batch_processed = 0;

            for id in &batch {
                let size = self.message_size(id, plan, opts.dry_run).await;

                if !opts.dry_run {
                    if let Err(err) = self.delete_message(id, trash_target).await {
                        warn!("cannot delete message {id}, skipping it: {err}");
                        trace!("{err:?}");
                        continue;
                    }
                }

                outcome.messages_processed += 1;
                outcome.bytes_freed += size;
                batch_processed += 1;
                since_recheck += 1;

                if since_recheck >= RECHECK_EVERY {
                    since_recheck = 0;
                    if self.usage_back_under_target(opts.target_ratio).await {
                        debug!(
                            "usage back under target after {} deletions, stopping early",
                            outcome.messages_processed,
                        );
                        break 'run;
                    }
                }

                if outcome.messages_processed >= plan.messages_to_delete {
                    break 'run;
                }
            }

            // A batch where nothing could be processed would repeat
            // forever, since failed items stay in the search results.
            if batch_processed == 0 {
                warn!("no message of the current batch could be deleted, stopping");
                break;
            }

            debug!(
                "processed batch of {batch_processed} messages, {} total",
                outcome.messages_processed,
            );

            sleep(BATCH_PAUSE).await;
        }

        debug!(
            "deletion run complete: {} messages processed, ~{} bytes freed",
            outcome.messages_processed, outcome.bytes_freed,
        );

        Ok(outcome)
    }

    /// Estimate the size of one message about to be deleted.
    ///
    /// Real runs fetch the precise size; a failed fetch falls back to
    /// the plan's sampled average rather than skipping the deletion.
    /// Dry runs use the cheap structural estimate, since a simulation
    /// should not require one expensive call per message.
    async fn message_size(&self, id: &Id, plan: &CleanupPlan, dry_run: bool) -> u64 {
        if dry_run {
            return structural_size_estimate(1);
        }

        match self.sizes.get_message_size(id).await {
            Ok(size) => size,
            Err(err) => {
                warn!("cannot get size of message {id}, using the sampled average: {err}");
                plan.average_message_size_bytes as u64
            }
        }
    }

    /// Delete one message.
    ///
    /// Messages already in the trash folder are removed permanently
    /// right away. Messages from any other folder are moved to trash
    /// first, then removed permanently after a short pause.
    async fn delete_message(&self, id: &Id, trash_target: bool) -> Result<()> {
        if trash_target {
            self.remove.remove_message(id).await
        } else {
            self.trash.move_to_trash(id).await?;
            sleep(TRASH_MOVE_PAUSE).await;
            self.remove.remove_message(id).await
        }
    }

    async fn usage_back_under_target(&self, target_ratio: f64) -> bool {
        match self.oracle.get_usage().await {
            Ok(usage) => usage.usage_ratio() <= target_ratio,
            Err(err) => {
                // The run is already bounded by the plan quota, a
                // failed re-check only loses the early stop.
                warn!("cannot re-check storage usage mid-run: {err}");
                false
            }
        }
    }
}
