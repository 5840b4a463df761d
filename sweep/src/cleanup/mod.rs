//! # Cleanup module
//!
//! Module dedicated to cleanup orchestration. The main structure of
//! this module is the [`CleanupRunner`], which ties the quota oracle,
//! the planner and the batch deleter into one run, serialized by an
//! advisory file lock.

mod error;
pub mod plan;

use std::{fs::OpenOptions, path::PathBuf, sync::Arc, time::Duration};

use advisory_lock::{AdvisoryFileLock, FileLockError, FileLockMode};
use chrono::Local;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::{
    account::AccountConfig,
    message::delete::{BatchDeleter, DeleteOptions, DeletionOutcome},
    quota::QuotaOracle,
    report::SendMessage,
    store::{self, CounterStore},
    Result,
};

use self::plan::CleanupPlanner;

#[doc(inline)]
pub use error::Error;

/// How many times lock acquisition is retried before the run is
/// skipped. Combined with [`LOCK_RETRY_PAUSE`] this bounds
/// acquisition to a few seconds.
const LOCK_RETRIES: usize = 6;

/// The pause between two lock acquisition attempts.
const LOCK_RETRY_PAUSE: Duration = Duration::from_millis(500);

/// The cleanup orchestration engine.
///
/// One [`run`](CleanupRunner::run) measures usage, sizes a plan when
/// usage exceeds the configured threshold, executes it, and records
/// the outcome into the daily counters. Runs are serialized by an
/// exclusive lock file: a run that cannot acquire the lock within a
/// few seconds is silently skipped, since overlapping schedule
/// firings are expected and the next scheduled invocation retries
/// anyway (the library itself never retries).
#[derive(Clone)]
pub struct CleanupRunner {
    account_config: Arc<AccountConfig>,
    oracle: QuotaOracle,
    planner: CleanupPlanner,
    deleter: BatchDeleter,
    store: Arc<dyn CounterStore>,
    sender: Arc<dyn SendMessage>,
    dry_run: Option<bool>,
}

impl CleanupRunner {
    pub fn new(
        account_config: Arc<AccountConfig>,
        oracle: QuotaOracle,
        planner: CleanupPlanner,
        deleter: BatchDeleter,
        store: Arc<dyn CounterStore>,
        sender: Arc<dyn SendMessage>,
    ) -> Self {
        Self {
            account_config,
            oracle,
            planner,
            deleter,
            store,
            sender,
            dry_run: None,
        }
    }

    pub fn set_some_dry_run(&mut self, dry_run: Option<bool>) {
        self.dry_run = dry_run;
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.set_some_dry_run(Some(dry_run));
    }

    pub fn with_some_dry_run(mut self, dry_run: Option<bool>) -> Self {
        self.set_some_dry_run(dry_run);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.set_dry_run(dry_run);
        self
    }

    /// Whether this runner simulates deletions, either from an
    /// explicit override or from the account configuration.
    pub fn get_dry_run(&self) -> bool {
        self.dry_run
            .unwrap_or_else(|| self.account_config.cleanup_dry_run())
    }

    fn lock_file_path(&self) -> PathBuf {
        let lock_file_name = format!("sweep-cleanup.{}.lock", self.account_config.name);
        self.account_config.cleanup_lock_dir().join(lock_file_name)
    }

    /// Run one cleanup pass.
    ///
    /// Returns `Ok(None)` when the run was skipped (lock contention,
    /// usage under threshold, or nothing to delete) and
    /// `Ok(Some(outcome))` when a plan was executed. On failure the
    /// configured recipient is notified (best effort) before the
    /// error propagates; the lock is released on every path.
    pub async fn run(&self) -> Result<Option<DeletionOutcome>> {
        let lock_file_path = self.lock_file_path();

        debug!("locking cleanup file {lock_file_path:?}");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&lock_file_path)
            .map_err(|err| Error::OpenLockFileError(err, lock_file_path.clone()))?;

        let mut attempts = 0;
        loop {
            match AdvisoryFileLock::try_lock(&lock_file, FileLockMode::Exclusive) {
                Ok(()) => break,
                Err(FileLockError::AlreadyLocked) if attempts < LOCK_RETRIES => {
                    attempts += 1;
                    sleep(LOCK_RETRY_PAUSE).await;
                }
                Err(FileLockError::AlreadyLocked) => {
                    debug!("another cleanup run is in progress, skipping this one");
                    return Ok(None);
                }
                Err(err) => {
                    return Err(Error::LockFileError(err, lock_file_path).into());
                }
            }
        }

        let res = self.run_locked().await;

        if let Err(err) = &res {
            warn!("cleanup run failed: {err}");
            trace!("{err:?}");
            self.notify_failure(err).await;
        }

        debug!("unlocking cleanup file");
        if let Err(err) = AdvisoryFileLock::unlock(&lock_file) {
            warn!(
                "{}",
                Error::UnlockFileError(err, lock_file_path),
            );
        }

        res
    }

    async fn run_locked(&self) -> Result<Option<DeletionOutcome>> {
        let usage = self.oracle.get_usage().await?;
        let threshold = self.account_config.cleanup_storage_threshold();

        if usage.usage_ratio() <= threshold {
            debug!(
                "usage at {:.0}% is under the {:.0}% threshold, no cleanup needed",
                usage.usage_percent(),
                threshold * 100.0,
            );
            return Ok(None);
        }

        let query = self.account_config.cleanup_target_query();
        let target_ratio = self.account_config.cleanup_target_ratio();

        let plan = self
            .planner
            .plan(
                &usage,
                target_ratio,
                &query,
                self.account_config.cleanup_max_delete_per_run(),
                self.account_config.cleanup_sample_size(),
            )
            .await?;

        if plan.is_noop() {
            debug!("nothing to delete in {query}");
            return Ok(None);
        }

        let dry_run = self.get_dry_run();
        let outcome = self
            .deleter
            .execute(
                &query,
                &plan,
                DeleteOptions {
                    dry_run,
                    target_ratio,
                },
            )
            .await?;

        if dry_run {
            debug!("dry run, not recording cleanup counters");
        } else {
            let today = Local::now().date_naive();
            if let Err(err) = store::record(self.store.as_ref(), today, &outcome).await {
                // The deletion already happened: a counter that could
                // not be persisted must not fail the run.
                warn!("cannot record cleanup counters: {err}");
                trace!("{err:?}");
            }
        }

        Ok(Some(outcome))
    }

    async fn notify_failure(&self, err: &crate::Error) {
        let recipient = self.account_config.report_recipient();
        let subject = "Mailbox storage cleanup failed";
        let body = format!(
            "The scheduled storage cleanup run for {} failed:\n\n{err:?}\n\nThe next scheduled run will retry from scratch.\n",
            self.account_config.name,
        );

        if let Err(err) = self.sender.send_message(&recipient, subject, &body).await {
            warn!("cannot send cleanup failure notification: {err}");
        }
    }
}
