//! Progress observation.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::handle::{Batch, ExerciseSubmission, Job};

/// The handle being polled, as seen by an observer.
#[derive(Debug, Clone, Copy)]
pub enum PollTarget<'a> {
    Job(&'a Job),
    Batch(&'a Batch),
    Exercise(&'a ExerciseSubmission),
}

impl PollTarget<'_> {
    pub fn label(&self) -> String {
        match self {
            PollTarget::Job(job) => format!("job {}", job.jobid()),
            PollTarget::Batch(batch) => format!("batch {}", batch.batchid()),
            PollTarget::Exercise(exercise) => format!("exercise {}", exercise.exerciseid()),
        }
    }
}

/// Error type observers may return.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Notified after every poll attempt, with the 0-based attempt index.
///
/// Failures and panics of an observer never abort polling.
pub trait PollObserver: Send + Sync {
    fn on_attempt(&self, index: u32, target: PollTarget<'_>) -> Result<(), ObserverError>;
}

/// Adapter for closures; see `PollOptions::with_progress`.
pub struct FnObserver<F>(pub F);

impl<F> PollObserver for FnObserver<F>
where
    F: Fn(u32, PollTarget<'_>) + Send + Sync,
{
    fn on_attempt(&self, index: u32, target: PollTarget<'_>) -> Result<(), ObserverError> {
        (self.0)(index, target);
        Ok(())
    }
}

pub(crate) fn notify(observer: Option<&dyn PollObserver>, index: u32, target: PollTarget<'_>) {
    let Some(observer) = observer else {
        return;
    };
    match catch_unwind(AssertUnwindSafe(|| observer.on_attempt(index, target))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(handle = %target.label(), index, error = %e, "poll observer failed");
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic".to_string());
            tracing::warn!(handle = %target.label(), index, panic = %message, "poll observer panicked");
        }
    }
}
