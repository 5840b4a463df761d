//! Module dedicated to folder counting.
//!
//! Counting pages through search results because providers cap how
//! many items a single search may return. The count is bounded by a
//! safety cap on scanned items: huge folders are undercounted rather
//! than scanned forever, which is acceptable because consumers only
//! need an order-of-magnitude-correct candidate pool size, itself
//! capped by the per-run deletion limit.

use std::sync::Arc;

use tracing::debug;

use crate::{message::search::SearchMessages, Result};

use super::{FolderCounts, INBOX, SENT, SPAM, TRASH};

/// The maximum number of items a single search page may return.
pub const SEARCH_PAGE_SIZE: usize = 500;

/// The maximum number of items scanned while counting one query.
pub const MAX_SCANNED_MESSAGES: usize = 20_000;

/// The paged folder counting engine.
#[derive(Clone)]
pub struct FolderCounter {
    search: Arc<dyn SearchMessages>,
}

impl FolderCounter {
    pub fn new(search: Arc<dyn SearchMessages>) -> Self {
        Self { search }
    }

    /// Count messages matching the given query.
    ///
    /// Pages through results until a short page signals the end of
    /// results, or until [`MAX_SCANNED_MESSAGES`] items have been
    /// scanned. Hitting the cap is not an error: the partial count
    /// accumulated so far is returned.
    pub async fn count_matching(&self, query: &str) -> Result<usize> {
        let mut total = 0;
        let mut start = 0;

        loop {
            let page = self
                .search
                .search_message_ids(query, start, SEARCH_PAGE_SIZE)
                .await?;
            total += page.len();

            if page.len() < SEARCH_PAGE_SIZE {
                break;
            }

            start += SEARCH_PAGE_SIZE;

            if start >= MAX_SCANNED_MESSAGES {
                debug!("hit safety cap at {start} scanned messages for {query}");
                break;
            }
        }

        debug!("{query}: {total} messages");
        Ok(total)
    }

    /// Count messages in every standard folder.
    pub async fn count_all(&self) -> Result<FolderCounts> {
        let counts = FolderCounts {
            inbox: self.count_matching(INBOX).await?,
            sent: self.count_matching(SENT).await?,
            trash: self.count_matching(TRASH).await?,
            spam: self.count_matching(SPAM).await?,
        };

        debug!(
            "counted {} messages across standard folders",
            counts.total()
        );
        Ok(counts)
    }
}
