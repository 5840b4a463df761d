use std::{
    collections::VecDeque,
    fs::OpenOptions,
    sync::{Arc, Mutex},
};

use advisory_lock::{AdvisoryFileLock, FileLockMode};
use async_trait::async_trait;
use chrono::{Duration, Local};
use sweep::{
    account::config::{AccountConfig, CleanupConfig, ReportConfig},
    cleanup::{plan::CleanupPlanner, CleanupRunner},
    folder::count::FolderCounter,
    message::{
        delete::{BatchDeleter, MoveToTrash, RemoveMessages},
        search::SearchMessages,
        size::{GetMessageSize, SizeSampler},
        Id,
    },
    quota::{GetStorageQuota, QuotaOracle, StorageReading},
    report::{Reporter, SendMessage},
    store::{memory::MemoryCounterStore, CounterStore, DailyCounter},
    Result,
};
use tempfile::TempDir;

const MB: u64 = 1024 * 1024;
const TOTAL: u64 = 10240 * MB;

/// An in-memory mailbox acting as every provider at once: paged
/// search over one candidate pool, per-message sizes, trash moves,
/// permanent removals, and a storage quota that shrinks as messages
/// are removed.
struct FakeMailbox {
    pool: Mutex<Vec<(Id, u64)>>,
    trashed: Mutex<Vec<Id>>,
    removed: Mutex<Vec<Id>>,
    other_bytes: u64,
    total_bytes: u64,
}

impl FakeMailbox {
    /// A mailbox whose candidate pool holds `count` messages of
    /// `size` bytes each, on top of `other_bytes` of unrelated usage.
    fn new(count: usize, size: u64, other_bytes: u64) -> Arc<Self> {
        let pool = (0..count).map(|n| (Id::new(n), size)).collect();

        Arc::new(Self {
            pool: Mutex::new(pool),
            trashed: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            other_bytes,
            total_bytes: TOTAL,
        })
    }

    fn pool_len(&self) -> usize {
        self.pool.lock().unwrap().len()
    }

    fn trashed_len(&self) -> usize {
        self.trashed.lock().unwrap().len()
    }

    fn removed_len(&self) -> usize {
        self.removed.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchMessages for FakeMailbox {
    async fn search_message_ids(
        &self,
        _query: &str,
        start: usize,
        max_results: usize,
    ) -> Result<Vec<Id>> {
        let pool = self.pool.lock().unwrap();
        Ok(pool
            .iter()
            .skip(start)
            .take(max_results)
            .map(|(id, _)| id.clone())
            .collect())
    }
}

#[async_trait]
impl GetMessageSize for FakeMailbox {
    async fn get_message_size(&self, id: &Id) -> Result<u64> {
        let pool = self.pool.lock().unwrap();
        pool.iter()
            .find(|(i, _)| i == id)
            .map(|(_, size)| *size)
            .ok_or_else(|| anyhow::anyhow!("unknown message {id}"))
    }
}

#[async_trait]
impl MoveToTrash for FakeMailbox {
    async fn move_to_trash(&self, id: &Id) -> Result<()> {
        self.trashed.lock().unwrap().push(id.clone());
        Ok(())
    }
}

#[async_trait]
impl RemoveMessages for FakeMailbox {
    async fn remove_message(&self, id: &Id) -> Result<()> {
        let mut pool = self.pool.lock().unwrap();
        let n = pool
            .iter()
            .position(|(i, _)| i == id)
            .ok_or_else(|| anyhow::anyhow!("unknown message {id}"))?;
        pool.remove(n);
        self.removed.lock().unwrap().push(id.clone());
        Ok(())
    }
}

#[async_trait]
impl GetStorageQuota for FakeMailbox {
    async fn get_storage_quota(&self) -> Result<StorageReading> {
        let pool_bytes: u64 = self.pool.lock().unwrap().iter().map(|(_, s)| s).sum();

        Ok(StorageReading {
            used_bytes: self.other_bytes + pool_bytes,
            total_bytes: self.total_bytes,
        })
    }
}

/// Serves a scripted sequence of readings, repeating the last one.
struct ScriptedQuota(Mutex<VecDeque<StorageReading>>);

impl ScriptedQuota {
    fn new(readings: impl IntoIterator<Item = StorageReading>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(readings.into_iter().collect())))
    }
}

#[async_trait]
impl GetStorageQuota for ScriptedQuota {
    async fn get_storage_quota(&self) -> Result<StorageReading> {
        let mut readings = self.0.lock().unwrap();
        if readings.len() > 1 {
            Ok(readings.pop_front().unwrap())
        } else {
            readings
                .front()
                .copied()
                .ok_or_else(|| anyhow::anyhow!("no scripted reading left"))
        }
    }
}

struct BrokenQuota;

#[async_trait]
impl GetStorageQuota for BrokenQuota {
    async fn get_storage_quota(&self) -> Result<StorageReading> {
        Err(anyhow::anyhow!("quota api unreachable"))
    }
}

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl SendMessage for RecordingSender {
    async fn send_message(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.into(), subject.into(), body.into()));
        Ok(())
    }
}

fn account_config(name: &str, lock_dir: &TempDir, cleanup: CleanupConfig) -> Arc<AccountConfig> {
    Arc::new(AccountConfig {
        name: name.into(),
        email: "test@localhost".into(),
        cleanup: Some(CleanupConfig {
            lock_dir: Some(lock_dir.path().to_owned()),
            ..cleanup
        }),
        report: None,
    })
}

fn runner(
    config: Arc<AccountConfig>,
    mailbox: Arc<FakeMailbox>,
    oracle: QuotaOracle,
    store: Arc<MemoryCounterStore>,
    sender: Arc<RecordingSender>,
) -> CleanupRunner {
    let search: Arc<dyn SearchMessages> = mailbox.clone();
    let counter = FolderCounter::new(search.clone());
    let sampler = SizeSampler::new(counter, search.clone(), mailbox.clone());
    let planner = CleanupPlanner::new(sampler);
    let deleter = BatchDeleter::new(
        search,
        mailbox.clone(),
        mailbox.clone(),
        mailbox.clone(),
        oracle.clone(),
    );

    CleanupRunner::new(config, oracle, planner, deleter, store, sender)
}

#[test_log::test(tokio::test(start_paused = true))]
async fn over_threshold_run_deletes_and_records() {
    // 7540MB of unrelated usage + 2000 messages of 1MB: 9540MB of
    // 10240MB used (~93%). Freeing back to 75% takes 1860 messages.
    let mailbox = FakeMailbox::new(2000, MB, 7540 * MB);
    let oracle = QuotaOracle::new(mailbox.clone());
    let store = Arc::new(MemoryCounterStore::default());
    let sender = Arc::new(RecordingSender::default());
    let lock_dir = tempfile::tempdir().unwrap();
    let config = account_config("real-run", &lock_dir, CleanupConfig::default());

    let runner = runner(config, mailbox.clone(), oracle, store.clone(), sender.clone())
        .with_dry_run(false);

    let outcome = runner.run().await.unwrap().unwrap();

    assert_eq!(outcome.messages_processed, 1860);
    assert_eq!(outcome.bytes_freed, 1860 * MB);
    assert_eq!(mailbox.pool_len(), 140);
    // Non-trash target: every deletion moves to trash first.
    assert_eq!(mailbox.trashed_len(), 1860);
    assert_eq!(mailbox.removed_len(), 1860);

    let today = Local::now().date_naive();
    let counter = store.get(today).await.unwrap().unwrap();
    assert_eq!(counter.messages_deleted, 1860);
    assert_eq!(counter.bytes_freed, 1860 * MB);
    assert_eq!(counter.run_count, 1);

    // The lock was released and usage is back at the threshold: the
    // next run is a no-op.
    assert!(runner.run().await.unwrap().is_none());
    assert_eq!(mailbox.pool_len(), 140);

    // No failure, so nothing was sent.
    assert!(sender.sent.lock().unwrap().is_empty());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn dry_run_mutates_nothing_and_records_nothing() {
    let mailbox = FakeMailbox::new(2000, MB, 7540 * MB);
    let oracle = QuotaOracle::new(mailbox.clone());
    let store = Arc::new(MemoryCounterStore::default());
    let sender = Arc::new(RecordingSender::default());
    let lock_dir = tempfile::tempdir().unwrap();
    // dry_run is left unset: simulation is the default.
    let config = account_config("dry-run", &lock_dir, CleanupConfig::default());

    let runner = runner(config, mailbox.clone(), oracle, store.clone(), sender);

    let outcome = runner.run().await.unwrap().unwrap();

    // Counts report what the run would have affected...
    assert_eq!(outcome.messages_processed, 1860);
    assert!(outcome.bytes_freed > 0);

    // ...but nothing was touched and nothing was recorded.
    assert_eq!(mailbox.pool_len(), 2000);
    assert_eq!(mailbox.trashed_len(), 0);
    assert_eq!(mailbox.removed_len(), 0);
    let today = Local::now().date_naive();
    assert!(store.get(today).await.unwrap().is_none());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn under_threshold_run_is_a_noop() {
    let mailbox = FakeMailbox::new(100, MB, 1000 * MB);
    let oracle = QuotaOracle::new(mailbox.clone());
    let store = Arc::new(MemoryCounterStore::default());
    let sender = Arc::new(RecordingSender::default());
    let lock_dir = tempfile::tempdir().unwrap();
    let config = account_config("under", &lock_dir, CleanupConfig::default());

    let runner = runner(config, mailbox.clone(), oracle, store, sender).with_dry_run(false);

    assert!(runner.run().await.unwrap().is_none());
    assert_eq!(mailbox.pool_len(), 100);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn mid_run_recheck_stops_early_once_under_target() {
    let mailbox = FakeMailbox::new(2000, MB, 7540 * MB);
    // First reading (measurement) is over threshold, every later one
    // (the mid-run re-checks) is back under it.
    let scripted = ScriptedQuota::new([
        StorageReading {
            used_bytes: 9216 * MB,
            total_bytes: TOTAL,
        },
        StorageReading {
            used_bytes: 7168 * MB,
            total_bytes: TOTAL,
        },
    ]);
    let oracle = QuotaOracle::new(scripted);
    let store = Arc::new(MemoryCounterStore::default());
    let sender = Arc::new(RecordingSender::default());
    let lock_dir = tempfile::tempdir().unwrap();
    let config = account_config("early-stop", &lock_dir, CleanupConfig::default());

    let runner = runner(config, mailbox.clone(), oracle, store, sender).with_dry_run(false);

    let outcome = runner.run().await.unwrap().unwrap();

    // The plan wanted 1500+ messages, the re-check stopped it at 400.
    assert_eq!(outcome.messages_processed, 400);
    assert_eq!(mailbox.pool_len(), 1600);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn trash_target_skips_the_trash_move() {
    let mailbox = FakeMailbox::new(300, MB, 7630 * MB);
    let oracle = QuotaOracle::new(mailbox.clone());
    let store = Arc::new(MemoryCounterStore::default());
    let sender = Arc::new(RecordingSender::default());
    let lock_dir = tempfile::tempdir().unwrap();
    let config = account_config(
        "trash-target",
        &lock_dir,
        CleanupConfig {
            target_query: Some("in:trash".into()),
            ..Default::default()
        },
    );

    let runner = runner(config, mailbox.clone(), oracle, store, sender).with_dry_run(false);

    let outcome = runner.run().await.unwrap().unwrap();

    assert_eq!(outcome.messages_processed, 250);
    // Already-trashed messages are removed permanently, directly.
    assert_eq!(mailbox.trashed_len(), 0);
    assert_eq!(mailbox.removed_len(), 250);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn lock_contention_skips_the_run_silently() {
    let mailbox = FakeMailbox::new(2000, MB, 7540 * MB);
    let oracle = QuotaOracle::new(mailbox.clone());
    let store = Arc::new(MemoryCounterStore::default());
    let sender = Arc::new(RecordingSender::default());
    let lock_dir = tempfile::tempdir().unwrap();
    let config = account_config("contended", &lock_dir, CleanupConfig::default());

    // Hold the lock the runner will try to acquire.
    let lock_path = lock_dir.path().join("sweep-cleanup.contended.lock");
    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)
        .unwrap();
    AdvisoryFileLock::try_lock(&lock_file, FileLockMode::Exclusive).unwrap();

    let runner = runner(config, mailbox.clone(), oracle, store, sender).with_dry_run(false);

    assert!(runner.run().await.unwrap().is_none());
    assert_eq!(mailbox.pool_len(), 2000);

    // Once released, the run proceeds normally.
    AdvisoryFileLock::unlock(&lock_file).unwrap();
    assert!(runner.run().await.unwrap().is_some());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn measurement_failure_aborts_and_notifies() {
    let mailbox = FakeMailbox::new(2000, MB, 7540 * MB);
    let oracle = QuotaOracle::new(Arc::new(BrokenQuota)).with_fallback(Arc::new(BrokenQuota));
    let store = Arc::new(MemoryCounterStore::default());
    let sender = Arc::new(RecordingSender::default());
    let lock_dir = tempfile::tempdir().unwrap();
    let config = account_config("broken", &lock_dir, CleanupConfig::default());

    let runner = runner(config, mailbox.clone(), oracle, store, sender.clone())
        .with_dry_run(false);

    assert!(runner.run().await.is_err());

    // Nothing was deleted on a guessed usage.
    assert_eq!(mailbox.pool_len(), 2000);

    let sent = sender.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (recipient, subject, _) = &sent[0];
    assert_eq!(recipient, "test@localhost");
    assert!(subject.contains("cleanup failed"));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn daily_report_summarizes_and_sweeps() {
    let mailbox = FakeMailbox::new(1000, MB, 7000 * MB);
    let oracle = QuotaOracle::new(mailbox.clone());
    let store = Arc::new(MemoryCounterStore::default());
    let sender = Arc::new(RecordingSender::default());

    let today = Local::now().date_naive();
    let expired = today - Duration::days(10);
    store
        .put(
            today,
            DailyCounter {
                messages_deleted: 42,
                bytes_freed: 42 * MB,
                run_count: 3,
            },
        )
        .await
        .unwrap();
    store.put(expired, DailyCounter::default()).await.unwrap();

    let config = Arc::new(AccountConfig {
        name: "report".into(),
        email: "test@localhost".into(),
        cleanup: None,
        report: Some(ReportConfig {
            recipient: Some("reports@localhost".into()),
            retention_days: Some(7),
        }),
    });

    let search: Arc<dyn SearchMessages> = mailbox.clone();
    let reporter = Reporter::new(
        config,
        oracle,
        FolderCounter::new(search),
        store.clone(),
        sender.clone(),
    );

    reporter.send_daily_report().await.unwrap();

    let sent = sender.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (recipient, subject, body) = &sent[0];
    assert_eq!(recipient, "reports@localhost");
    assert!(subject.starts_with("Daily mailbox storage report"));
    assert!(body.contains("- Messages deleted: 42"));
    assert!(body.contains("- Cleanup runs: 3"));

    // Sending the report sweeps expired counters.
    assert!(store.get(expired).await.unwrap().is_none());
    assert!(store.get(today).await.unwrap().is_some());
}
