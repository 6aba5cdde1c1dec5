//! Poll budgets and per-call overrides.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::observer::{FnObserver, PollObserver, PollTarget};

/// Client-wide poll settings, usually taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollDefaults {
    /// Wait between two attempts
    pub step: Duration,
    /// Budget of job, partial-batch and exercise polls
    pub attempts: u32,
    /// Budget of final-batch polls
    pub retry: u32,
}

impl Default for PollDefaults {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(3),
            attempts: 30,
            retry: 100,
        }
    }
}

/// Per-call overrides; anything left unset falls back to [`PollDefaults`].
#[derive(Clone, Default)]
pub struct PollOptions {
    pub step: Option<Duration>,
    pub attempts: Option<u32>,
    pub retry: Option<u32>,
    pub observer: Option<Arc<dyn PollObserver>>,
}

impl PollOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PollObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Observe progress with a closure.
    pub fn with_progress<F>(self, f: F) -> Self
    where
        F: Fn(u32, PollTarget<'_>) + Send + Sync + 'static,
    {
        self.with_observer(Arc::new(FnObserver(f)))
    }

    pub(crate) fn step_or(&self, defaults: &PollDefaults) -> Duration {
        self.step.unwrap_or(defaults.step)
    }

    pub(crate) fn attempts_or(&self, defaults: &PollDefaults) -> u32 {
        self.attempts.unwrap_or(defaults.attempts)
    }

    pub(crate) fn retry_or(&self, defaults: &PollDefaults) -> u32 {
        self.retry.unwrap_or(defaults.retry)
    }
}

impl fmt::Debug for PollOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollOptions")
            .field("step", &self.step)
            .field("attempts", &self.attempts)
            .field("retry", &self.retry)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
