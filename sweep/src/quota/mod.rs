//! # Quota module
//!
//! Module dedicated to storage quota measurement. The main entities
//! are the [`StorageReading`] structure, the [`GetStorageQuota`]
//! provider feature and the [`QuotaOracle`] engine that normalizes a
//! primary and a fallback provider into a single reading.

mod error;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::Result;

#[doc(inline)]
pub use error::Error;

const BYTES_PER_GB: f64 = (1024u64 * 1024 * 1024) as f64;

/// A point-in-time account storage measurement.
///
/// Readings are produced fresh on every call to the
/// [`QuotaOracle`] and never cached beyond one cleanup run, except
/// for the single mid-run re-check performed by the batch deleter.
/// All sizing math works on raw bytes; the GB accessors exist for
/// reporting only and are rounded to 2 decimals.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StorageReading {
    /// The number of bytes currently used by the account, potentially
    /// across multiple services sharing the same quota.
    pub used_bytes: u64,

    /// The total storage capacity of the account, in bytes.
    pub total_bytes: u64,
}

impl StorageReading {
    /// The used/total ratio, in [0, 1].
    ///
    /// A zero-capacity reading yields 0 rather than dividing: such
    /// readings are rejected by the oracle as measurement errors
    /// before any sizing math sees them.
    pub fn usage_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.total_bytes as f64
        }
    }

    /// The used/total ratio as a percentage, in [0, 100].
    pub fn usage_percent(&self) -> f64 {
        self.usage_ratio() * 100.0
    }

    /// The used capacity in GB, rounded to 2 decimals.
    pub fn used_gb(&self) -> f64 {
        round2(self.used_bytes as f64 / BYTES_PER_GB)
    }

    /// The total capacity in GB, rounded to 2 decimals.
    pub fn total_gb(&self) -> f64 {
        round2(self.total_bytes as f64 / BYTES_PER_GB)
    }

    /// The free capacity in GB, rounded to 2 decimals.
    pub fn free_gb(&self) -> f64 {
        round2(self.total_bytes.saturating_sub(self.used_bytes) as f64 / BYTES_PER_GB)
    }

    fn is_valid(&self) -> bool {
        self.total_bytes > 0 && self.used_bytes <= self.total_bytes
    }
}

fn round2(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

#[async_trait]
pub trait GetStorageQuota: Send + Sync {
    /// Get the current storage quota of the account.
    ///
    /// Implementations should report the quota shared across all
    /// services of the account when available, since mailbox usage
    /// alone may underestimate how full the account really is.
    async fn get_storage_quota(&self) -> Result<StorageReading>;
}

/// The storage quota oracle.
///
/// Wraps a primary quota provider (account-wide quota) and an
/// optional fallback provider (service-specific usage) behind a
/// single [`QuotaOracle::get_usage`] call. The oracle fails only when
/// every configured provider fails or reports an invalid reading, in
/// which case the caller must treat storage as unknown and abort the
/// cleanup run: sizing a destructive operation from a guessed usage
/// is never acceptable.
#[derive(Clone)]
pub struct QuotaOracle {
    primary: Arc<dyn GetStorageQuota>,
    fallback: Option<Arc<dyn GetStorageQuota>>,
}

impl QuotaOracle {
    pub fn new(primary: Arc<dyn GetStorageQuota>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn GetStorageQuota>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Get a fresh, validated storage reading.
    pub async fn get_usage(&self) -> Result<StorageReading> {
        let primary_err = match self.primary.get_storage_quota().await {
            Ok(reading) if reading.is_valid() => {
                debug!(
                    "storage usage: {}GB of {}GB ({:.0}%)",
                    reading.used_gb(),
                    reading.total_gb(),
                    reading.usage_percent(),
                );
                return Ok(reading);
            }
            Ok(reading) => {
                let err =
                    Error::InvalidStorageReadingError(reading.used_bytes, reading.total_bytes);
                warn!("primary quota provider returned an invalid reading: {err}");
                err.to_string()
            }
            Err(err) => {
                warn!("primary quota provider failed: {err}");
                err.to_string()
            }
        };

        let Some(fallback) = &self.fallback else {
            return Err(Error::GetStorageQuotaNoFallbackError(primary_err).into());
        };

        match fallback.get_storage_quota().await {
            Ok(reading) if reading.is_valid() => {
                debug!(
                    "storage usage (fallback): {}GB of {}GB ({:.0}%)",
                    reading.used_gb(),
                    reading.total_gb(),
                    reading.usage_percent(),
                );
                Ok(reading)
            }
            Ok(reading) => {
                let err =
                    Error::InvalidStorageReadingError(reading.used_bytes, reading.total_bytes);
                Err(Error::GetStorageQuotaError(primary_err, err.to_string()).into())
            }
            Err(err) => Err(Error::GetStorageQuotaError(primary_err, err.to_string()).into()),
        }
    }
}
