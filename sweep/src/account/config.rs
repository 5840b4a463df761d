//! Module dedicated to account configuration.
//!
//! This module contains the representation of the user's current
//! account configuration named [`AccountConfig`], with its cleanup
//! and report sub-configurations. The configuration is built once per
//! run and shared by reference: the engines never mutate it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::folder;

/// The usage ratio above which a cleanup run starts deleting.
pub const DEFAULT_STORAGE_THRESHOLD: f64 = 0.75;

/// The search expression identifying the candidate pool of messages
/// eligible for deletion.
pub const DEFAULT_TARGET_QUERY: &str = folder::SENT;

/// The maximum number of messages a single cleanup run may delete,
/// independent of the computed need.
pub const DEFAULT_MAX_DELETE_PER_RUN: usize = 2000;

/// The maximum number of messages sampled to estimate the average
/// message size.
pub const DEFAULT_SAMPLE_SIZE: usize = 200;

/// The number of days daily cleanup counters are kept before the
/// retention sweep removes them.
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// The historical buffer factor applied to the threshold when
/// [`CleanupConfig::threshold_buffer`] is enabled.
pub const THRESHOLD_BUFFER_FACTOR: f64 = 0.95;

/// The user's account configuration.
///
/// It represents everything that the user can customize for a given
/// account. It is the main configuration used by all other modules.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AccountConfig {
    /// The name of the user account.
    ///
    /// The account name is used as an unique identifier for a given
    /// configuration. It also names the cleanup lock file, so two
    /// accounts never contend on the same lock.
    pub name: String,

    /// The email address of the user account.
    ///
    /// Used as the report and error notification recipient when
    /// [`ReportConfig::recipient`] is left blank.
    pub email: String,

    /// The cleanup configuration.
    pub cleanup: Option<CleanupConfig>,

    /// The report configuration.
    pub report: Option<ReportConfig>,
}

impl AccountConfig {
    /// Whether cleanup runs only simulate deletions.
    ///
    /// Defaults to `true`: a run never destroys anything until the
    /// user explicitly opts out of the simulation mode. See
    /// [`CleanupConfig::dry_run`] for why the default is defensive.
    pub fn cleanup_dry_run(&self) -> bool {
        self.cleanup
            .as_ref()
            .and_then(|c| c.dry_run)
            .unwrap_or(true)
    }

    /// The usage ratio that triggers a cleanup run.
    pub fn cleanup_storage_threshold(&self) -> f64 {
        self.cleanup
            .as_ref()
            .and_then(|c| c.storage_threshold)
            .unwrap_or(DEFAULT_STORAGE_THRESHOLD)
    }

    /// The usage ratio a cleanup run aims at once triggered.
    ///
    /// Matches the threshold exactly, unless the historical
    /// [`CleanupConfig::threshold_buffer`] option is enabled, in which
    /// case the run aims slightly under it for buffer.
    pub fn cleanup_target_ratio(&self) -> f64 {
        let buffer = self
            .cleanup
            .as_ref()
            .and_then(|c| c.threshold_buffer)
            .unwrap_or_default();

        if buffer {
            self.cleanup_storage_threshold() * THRESHOLD_BUFFER_FACTOR
        } else {
            self.cleanup_storage_threshold()
        }
    }

    /// The search expression identifying deletion candidates.
    pub fn cleanup_target_query(&self) -> String {
        self.cleanup
            .as_ref()
            .and_then(|c| c.target_query.clone())
            .unwrap_or_else(|| DEFAULT_TARGET_QUERY.to_owned())
    }

    /// The hard cap on messages deleted by a single run.
    pub fn cleanup_max_delete_per_run(&self) -> usize {
        self.cleanup
            .as_ref()
            .and_then(|c| c.max_delete_per_run)
            .unwrap_or(DEFAULT_MAX_DELETE_PER_RUN)
    }

    /// The maximum size of the average-size sample.
    pub fn cleanup_sample_size(&self) -> usize {
        self.cleanup
            .as_ref()
            .and_then(|c| c.sample_size)
            .unwrap_or(DEFAULT_SAMPLE_SIZE)
    }

    /// The directory holding the cleanup lock file.
    ///
    /// Defaults to the system temporary directory.
    pub fn cleanup_lock_dir(&self) -> PathBuf {
        self.cleanup
            .as_ref()
            .and_then(|c| c.lock_dir.clone())
            .unwrap_or_else(std::env::temp_dir)
    }

    /// The recipient of daily reports and error notifications.
    ///
    /// Falls back to the account email address when left blank.
    pub fn report_recipient(&self) -> String {
        self.report
            .as_ref()
            .and_then(|c| c.recipient.clone())
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| self.email.clone())
    }

    /// The retention window of daily cleanup counters, in days.
    pub fn report_retention_days(&self) -> i64 {
        self.report
            .as_ref()
            .and_then(|c| c.retention_days)
            .unwrap_or(DEFAULT_RETENTION_DAYS)
    }
}

/// The cleanup configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CleanupConfig {
    /// Simulate deletions instead of performing them.
    ///
    /// Defaults to `true`. A real run permanently removes messages:
    /// for a non-trash target they are moved to the trash folder and
    /// then removed from it right away, which bypasses any grace
    /// period the provider normally offers on trashed messages. Only
    /// set this to `false` once a few simulated runs reported the
    /// numbers you expected.
    pub dry_run: Option<bool>,

    /// The usage ratio (0-1) that triggers a cleanup run.
    pub storage_threshold: Option<f64>,

    /// Aim at `storage-threshold * 0.95` instead of the threshold
    /// itself, freeing slightly more space as a buffer.
    pub threshold_buffer: Option<bool>,

    /// The search expression identifying deletion candidates, for
    /// example `in:sent`.
    pub target_query: Option<String>,

    /// The hard cap on messages deleted by a single run.
    pub max_delete_per_run: Option<usize>,

    /// The maximum size of the average-size sample.
    pub sample_size: Option<usize>,

    /// The directory holding the cleanup lock file.
    pub lock_dir: Option<PathBuf>,
}

/// The report configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReportConfig {
    /// The recipient of daily reports and error notifications.
    ///
    /// Blank means the account email address.
    pub recipient: Option<String>,

    /// The number of days daily cleanup counters are kept.
    pub retention_days: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AccountConfig {
            name: "test".into(),
            email: "test@localhost".into(),
            ..Default::default()
        };

        assert!(config.cleanup_dry_run());
        assert_eq!(config.cleanup_storage_threshold(), 0.75);
        assert_eq!(config.cleanup_target_ratio(), 0.75);
        assert_eq!(config.cleanup_target_query(), folder::SENT);
        assert_eq!(config.cleanup_max_delete_per_run(), 2000);
        assert_eq!(config.report_recipient(), "test@localhost");
        assert_eq!(config.report_retention_days(), 7);
    }

    #[test]
    fn threshold_buffer_variant() {
        let config = AccountConfig {
            cleanup: Some(CleanupConfig {
                storage_threshold: Some(0.8),
                threshold_buffer: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(config.cleanup_storage_threshold(), 0.8);
        assert_eq!(config.cleanup_target_ratio(), 0.8 * 0.95);
    }

    #[test]
    fn blank_report_recipient_falls_back_to_account_email() {
        let config = AccountConfig {
            email: "test@localhost".into(),
            report: Some(ReportConfig {
                recipient: Some("  ".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(config.report_recipient(), "test@localhost");
    }
}
