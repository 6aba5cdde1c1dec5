//! Client-level error taxonomy.
//!
//! Every failure surfaced by the client maps onto one [`GradingError`]
//! variant, and every variant onto a [`FailureKind`] with a stable exit code
//! for the `gradx` binary.

use std::path::PathBuf;

use gradx_protocol::EnvelopeError;

use crate::config::ConfigError;
use crate::host::TransportError;

/// Errors raised by submission and polling operations.
#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    /// The exercise has no deployment token; nothing was sent.
    #[error("Non deployed exercise {exercise}")]
    NotDeployed { exercise: String },

    /// A local artifact could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The service answered something the client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The poll budget ran out before the report became final.
    #[error("report not ready after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    /// The service reported that it could not grade a job.
    #[error("grading failed for job {jobid}: {message}")]
    RemoteFailure { jobid: String, message: String },

    /// Another poll is already running on the same handle.
    #[error("a poll is already in progress on {handle}")]
    AlreadyPolling { handle: String },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<EnvelopeError> for GradingError {
    fn from(err: EnvelopeError) -> Self {
        GradingError::Protocol(err.to_string())
    }
}

/// Failure kind for exit code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad local input: undeployed exercise, unreadable file (exit code 10)
    Input = 10,
    /// Transport failures (exit code 20)
    Transport = 20,
    /// Contract mismatch with the service (exit code 30)
    Protocol = 30,
    /// Service-side grading failure (exit code 40)
    Remote = 40,
    /// Poll budget exhausted (exit code 80)
    Timeout = 80,
    /// Concurrent poll rejected (exit code 90)
    Busy = 90,
    /// Configuration failures (exit code 92)
    Config = 92,
}

impl GradingError {
    /// Map error to failure kind for exit code
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            GradingError::NotDeployed { .. } => FailureKind::Input,
            GradingError::Read { .. } => FailureKind::Input,
            GradingError::Protocol(_) => FailureKind::Protocol,
            GradingError::Timeout { .. } => FailureKind::Timeout,
            GradingError::RemoteFailure { .. } => FailureKind::Remote,
            GradingError::AlreadyPolling { .. } => FailureKind::Busy,
            GradingError::Transport(_) => FailureKind::Transport,
            GradingError::Config(_) => FailureKind::Config,
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.failure_kind() as i32
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GradingError::Timeout { .. })
    }
}

/// Result type for grading operations
pub type GradingResult<T> = Result<T, GradingError>;
