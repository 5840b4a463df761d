use std::{io, path::PathBuf};

use advisory_lock::FileLockError;
use thiserror::Error;

/// Errors related to cleanup orchestration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot open cleanup lock file {1}")]
    OpenLockFileError(#[source] io::Error, PathBuf),
    #[error("cannot lock cleanup file {1}")]
    LockFileError(#[source] FileLockError, PathBuf),
    #[error("cannot unlock cleanup file {1}")]
    UnlockFileError(#[source] FileLockError, PathBuf),
}
