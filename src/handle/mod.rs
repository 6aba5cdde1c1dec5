//! Tracking handles
//!
//! Accepted submissions are tracked through reference-counted handles.
//! Cloning a handle yields the same logical handle: every clone observes the
//! reports folded in by a poll on any other clone.

mod batch;
mod exercise;
mod job;
mod submission;

pub use batch::{Batch, BatchProgress};
pub use exercise::{Exercise, ExercisesSet, DEFAULT_INLINE_FILE_NAME};
pub use job::{Job, JobReportState};
pub use submission::{AuthorOutcome, ExerciseSubmission};

pub(crate) use batch::BatchIdentity;
pub(crate) use job::JobIdentity;
pub(crate) use submission::SubmissionIdentity;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use crate::error::{GradingError, GradingResult};

/// The immediate answer of the service to an upload.
#[derive(Debug, Clone)]
pub struct Acceptance {
    /// Raw response entity
    pub entity: Vec<u8>,
    /// Decoded document
    pub document: Value,
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Claim the poll guard of a handle, or fail if a poll is already running.
pub(crate) fn begin_poll<'a>(
    guard: &'a tokio::sync::Mutex<()>,
    label: impl FnOnce() -> String,
) -> GradingResult<tokio::sync::MutexGuard<'a, ()>> {
    guard
        .try_lock()
        .map_err(|_| GradingError::AlreadyPolling { handle: label() })
}
