use thiserror::Error;

/// Errors related to storage quota measurement.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid storage reading: {0} bytes used of {1} bytes total")]
    InvalidStorageReadingError(u64, u64),
    #[error("cannot get storage quota: all providers failed (primary: {0}, fallback: {1})")]
    GetStorageQuotaError(String, String),
    #[error("cannot get storage quota: primary provider failed ({0}), no fallback configured")]
    GetStorageQuotaNoFallbackError(String),
}
