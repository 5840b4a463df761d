//! Rust library to keep a mailbox account under a storage threshold.
//!
//! The main purpose of this library is to help you to build scheduled
//! storage management for a hosted mailbox account without caring
//! about which provider actually hosts it: the library periodically
//! measures account storage usage and, when usage exceeds a
//! configured threshold, computes how many messages must be removed
//! from a target folder to bring usage back under the threshold, then
//! deletes (or simulates deleting) that many messages in rate-limited
//! batches. It can also compose a daily usage and activity report.
//!
//! This goal is achieved by exposing provider features as traits:
//! your host application (a cron job, a cloud function, a CLI)
//! implements them for its actual provider, then hands them to the
//! engines of this crate, which own all of the sizing, batching,
//! locking and reporting logic.
//!
//! See examples in the /tests folder.
//!
//! ## Provider features
//!
//! - [`GetStorageQuota`](crate::quota::GetStorageQuota)
//! - [`SearchMessages`](crate::message::search::SearchMessages)
//! - [`SearchThreads`](crate::message::search::SearchThreads)
//! - [`GetMessageSize`](crate::message::size::GetMessageSize)
//! - [`MoveToTrash`](crate::message::delete::MoveToTrash)
//! - [`RemoveMessages`](crate::message::delete::RemoveMessages)
//! - [`CounterStore`](crate::store::CounterStore)
//! - [`SendMessage`](crate::report::SendMessage)
//!
//! ## Engines
//!
//! - [`QuotaOracle`](crate::quota::QuotaOracle)
//! - [`FolderCounter`](crate::folder::count::FolderCounter)
//! - [`SizeSampler`](crate::message::size::SizeSampler)
//! - [`CleanupPlanner`](crate::cleanup::plan::CleanupPlanner)
//! - [`BatchDeleter`](crate::message::delete::BatchDeleter)
//! - [`CleanupRunner`](crate::cleanup::CleanupRunner)
//! - [`Reporter`](crate::report::Reporter)

pub mod account;
pub mod cleanup;
pub mod folder;
pub mod message;
pub mod quota;
pub mod report;
pub mod store;

#[doc(inline)]
pub use message::{delete, search, size};

/// The global `Error` alias of the library.
pub type Error = anyhow::Error;

/// The global `Result` alias of the library.
pub type Result<T> = anyhow::Result<T>;
