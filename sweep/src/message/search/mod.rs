//! Module dedicated to message search.
//!
//! Search is a provider feature: the host implements it against its
//! actual search API. Both features are paged, since providers cap
//! how many items a single search may return.

use async_trait::async_trait;

use crate::Result;

use super::Id;

/// A conversation thread matched by a search, summarized by its
/// message count. Used by the structural size estimator when precise
/// per-message metadata is unavailable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadSummary {
    pub id: Id,
    pub message_count: usize,
}

#[async_trait]
pub trait SearchMessages: Send + Sync {
    /// Search messages matching the given query.
    ///
    /// Returns at most `max_results` message identifiers, starting at
    /// the `start` offset of the full result set. A page shorter than
    /// `max_results` signals the end of results.
    async fn search_message_ids(
        &self,
        query: &str,
        start: usize,
        max_results: usize,
    ) -> Result<Vec<Id>>;
}

#[async_trait]
pub trait SearchThreads: Send + Sync {
    /// Search conversation threads matching the given query.
    ///
    /// Same pagination contract as
    /// [`SearchMessages::search_message_ids`].
    async fn search_threads(
        &self,
        query: &str,
        start: usize,
        max_results: usize,
    ) -> Result<Vec<ThreadSummary>>;
}
