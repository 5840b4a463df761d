//! # Report module
//!
//! Module dedicated to the daily usage and activity report. The
//! [`Reporter`] reads a fresh storage snapshot, per-folder counts and
//! today's cleanup counters, composes a plaintext summary and sends
//! it through the [`SendMessage`] provider feature. Sending also
//! sweeps expired counters, so the store never needs its own
//! scheduled maintenance.

use std::{fmt::Write, sync::Arc};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use tracing::{debug, warn};

use crate::{
    account::AccountConfig,
    folder::{count::FolderCounter, FolderCounts},
    quota::{QuotaOracle, StorageReading},
    store::{self, CounterStore, DailyCounter},
    Result,
};

#[async_trait]
pub trait SendMessage: Send + Sync {
    /// Send a plaintext message to the given recipient.
    async fn send_message(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

/// The daily report engine.
///
/// Unlike a cleanup run, a report is read-only: every piece of it is
/// best-effort, a failed reading degrades the report instead of
/// aborting it.
#[derive(Clone)]
pub struct Reporter {
    account_config: Arc<AccountConfig>,
    oracle: QuotaOracle,
    counter: FolderCounter,
    store: Arc<dyn CounterStore>,
    sender: Arc<dyn SendMessage>,
}

impl Reporter {
    pub fn new(
        account_config: Arc<AccountConfig>,
        oracle: QuotaOracle,
        counter: FolderCounter,
        store: Arc<dyn CounterStore>,
        sender: Arc<dyn SendMessage>,
    ) -> Self {
        Self {
            account_config,
            oracle,
            counter,
            store,
            sender,
        }
    }

    /// Compose and send the daily report, then sweep expired
    /// counters.
    pub async fn send_daily_report(&self) -> Result<()> {
        let today = Local::now().date_naive();

        let usage = match self.oracle.get_usage().await {
            Ok(usage) => Some(usage),
            Err(err) => {
                warn!("cannot read storage usage for the report: {err}");
                None
            }
        };

        let counts = match self.counter.count_all().await {
            Ok(counts) => counts,
            Err(err) => {
                warn!("cannot count folders for the report: {err}");
                FolderCounts::default()
            }
        };

        let stats = match self.store.get(today).await {
            Ok(stats) => stats.unwrap_or_default(),
            Err(err) => {
                warn!("cannot read today's cleanup counters: {err}");
                DailyCounter::default()
            }
        };

        let subject = match &usage {
            Some(usage) => format!(
                "Daily mailbox storage report - {:.0}% used",
                usage.usage_percent(),
            ),
            None => String::from("Daily mailbox storage report - usage unavailable"),
        };
        let body = compose_report(today, usage.as_ref(), &counts, &stats);

        self.sender
            .send_message(&self.account_config.report_recipient(), &subject, &body)
            .await?;
        debug!("daily report sent");

        let retention_days = self.account_config.report_retention_days();
        if let Err(err) = store::sweep(self.store.as_ref(), today, retention_days).await {
            warn!("cannot sweep expired cleanup counters: {err}");
        }

        Ok(())
    }
}

/// Compose the plaintext body of the daily report.
fn compose_report(
    today: NaiveDate,
    usage: Option<&StorageReading>,
    counts: &FolderCounts,
    stats: &DailyCounter,
) -> String {
    let mut body = String::new();

    let _ = writeln!(body, "Daily storage report");
    let _ = writeln!(body, "====================");
    let _ = writeln!(body);

    let _ = writeln!(body, "Storage status:");
    match usage {
        Some(usage) => {
            let _ = writeln!(body, "- Used: {} GB of {} GB", usage.used_gb(), usage.total_gb());
            let _ = writeln!(body, "- Free: {} GB", usage.free_gb());
            let _ = writeln!(body, "- Usage: {:.0}%", usage.usage_percent());
        }
        None => {
            let _ = writeln!(body, "- Unavailable (all quota providers failed)");
        }
    }
    let _ = writeln!(body);

    let _ = writeln!(body, "Message counts:");
    let _ = writeln!(body, "- Inbox: {} messages", counts.inbox);
    let _ = writeln!(body, "- Sent: {} messages", counts.sent);
    let _ = writeln!(body, "- Trash: {} messages", counts.trash);
    let _ = writeln!(body, "- Spam: {} messages", counts.spam);
    let _ = writeln!(body, "- Total: {} messages", counts.total());
    let _ = writeln!(body);

    if stats.messages_deleted > 0 {
        let _ = writeln!(body, "Cleanup activity today:");
        let _ = writeln!(body, "- Cleanup runs: {}", stats.run_count);
        let _ = writeln!(body, "- Messages deleted: {}", stats.messages_deleted);
        let _ = writeln!(body, "- Space freed: ~{} bytes", stats.bytes_freed);
    } else {
        let _ = writeln!(body, "No cleanup needed today - storage under threshold");
    }
    let _ = writeln!(body);

    let _ = writeln!(body, "Generated: {today}");

    body
}
