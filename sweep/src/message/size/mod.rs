//! Module dedicated to message size estimation.
//!
//! The [`SizeSampler`] estimates the average message size of a
//! candidate pool from a bounded sample instead of scanning the whole
//! pool. It prefers precise per-message metadata and degrades to a
//! structural per-thread estimate, then to a fixed constant: sampling
//! may lose precision but never fails a cleanup run on its own.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{folder::count::FolderCounter, Result};

use super::{
    search::{SearchMessages, SearchThreads},
    Id,
};

/// The structural size estimate of a single-message thread.
pub const BASE_MESSAGE_SIZE_ESTIMATE: u64 = 100 * 1024;

/// The structural size estimate of each additional message in a
/// thread.
pub const PER_ADDITIONAL_MESSAGE_ESTIMATE: u64 = 50 * 1024;

/// The average message size assumed when nothing at all could be
/// sampled. Consumers must never receive a zero average for a
/// non-empty pool.
pub const FALLBACK_AVERAGE_MESSAGE_SIZE: u64 = 500 * 1024;

/// How many size fetches happen between two courtesy pauses.
const SAMPLE_PAUSE_EVERY: usize = 10;

/// The courtesy pause inserted between sample groups, to avoid
/// provider throttling.
const SAMPLE_PAUSE: Duration = Duration::from_millis(200);

/// The structural size estimate of a thread counting `message_count`
/// messages.
///
/// A deliberately crude linear model, used when thread-level APIs do
/// not expose true byte sizes cheaply.
pub fn structural_size_estimate(message_count: usize) -> u64 {
    BASE_MESSAGE_SIZE_ESTIMATE
        + message_count.saturating_sub(1) as u64 * PER_ADDITIONAL_MESSAGE_ESTIMATE
}

#[async_trait]
pub trait GetMessageSize: Send + Sync {
    /// Get the size estimate of the given message, in bytes.
    async fn get_message_size(&self, id: &Id) -> Result<u64>;
}

/// The result of one sampling pass over a candidate pool.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampleResult {
    /// The exact (safety-capped) count of messages matching the
    /// sampled query.
    pub total_matching_messages: usize,

    /// The estimated average message size, in bytes. Zero only when
    /// the pool itself is empty.
    pub average_size_bytes: f64,
}

/// The average message size sampling engine.
#[derive(Clone)]
pub struct SizeSampler {
    counter: FolderCounter,
    search: Arc<dyn SearchMessages>,
    sizes: Arc<dyn GetMessageSize>,
    threads: Option<Arc<dyn SearchThreads>>,
}

impl SizeSampler {
    pub fn new(
        counter: FolderCounter,
        search: Arc<dyn SearchMessages>,
        sizes: Arc<dyn GetMessageSize>,
    ) -> Self {
        Self {
            counter,
            search,
            sizes,
            threads: None,
        }
    }

    /// Enable the structural fallback estimator, used when precise
    /// per-message metadata is entirely unavailable.
    pub fn with_thread_fallback(mut self, threads: Arc<dyn SearchThreads>) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Estimate the average size of messages matching the given
    /// query, from a sample of at most `max_sample_size` of them.
    pub async fn sample(&self, query: &str, max_sample_size: usize) -> Result<SampleResult> {
        let total = self.counter.count_matching(query).await?;
        if total == 0 {
            return Ok(SampleResult::default());
        }

        let sample_size = max_sample_size.min(total);

        let (mut sampled_bytes, mut sampled_count) =
            match self.sample_precise(query, sample_size).await {
                Ok(sample) => sample,
                Err(err) => {
                    warn!("precise size sampling unavailable: {err}");
                    (0, 0)
                }
            };

        if sampled_count == 0 {
            (sampled_bytes, sampled_count) = self.sample_structural(query, sample_size).await;
        }

        let average_size_bytes = if sampled_count == 0 {
            warn!("nothing could be sampled for {query}, assuming a fixed average message size");
            FALLBACK_AVERAGE_MESSAGE_SIZE as f64
        } else {
            sampled_bytes as f64 / sampled_count as f64
        };

        debug!("average message size for {query}: {average_size_bytes:.0} bytes ({sampled_count} sampled of {total} matching)");

        Ok(SampleResult {
            total_matching_messages: total,
            average_size_bytes,
        })
    }

    /// Sum precise per-message size estimates over a sample.
    ///
    /// A single message whose size cannot be fetched is skipped, not
    /// fatal: a handful of skips must not fail the whole sample.
    async fn sample_precise(&self, query: &str, sample_size: usize) -> Result<(u64, usize)> {
        let ids = self
            .search
            .search_message_ids(query, 0, sample_size)
            .await?;

        let mut sampled_bytes = 0;
        let mut sampled_count = 0;

        for (n, id) in ids.iter().enumerate() {
            match self.sizes.get_message_size(id).await {
                Ok(size) => {
                    sampled_bytes += size;
                    sampled_count += 1;
                }
                Err(err) => {
                    warn!("cannot get size of message {id}, skipping it: {err}");
                }
            }

            if (n + 1) % SAMPLE_PAUSE_EVERY == 0 {
                sleep(SAMPLE_PAUSE).await;
            }
        }

        Ok((sampled_bytes, sampled_count))
    }

    /// Sum structural per-thread size estimates over a sample.
    async fn sample_structural(&self, query: &str, sample_size: usize) -> (u64, usize) {
        let Some(threads) = &self.threads else {
            return (0, 0);
        };

        match threads.search_threads(query, 0, sample_size).await {
            Ok(threads) => {
                let bytes = threads
                    .iter()
                    .map(|t| structural_size_estimate(t.message_count))
                    .sum();
                (bytes, threads.len())
            }
            Err(err) => {
                warn!("structural size sampling unavailable: {err}");
                (0, 0)
            }
        }
    }
}
