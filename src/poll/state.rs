//! Poll state machine
//!
//! Pending → Partial (batches only) → Final, with Failed and Exhausted as
//! the unsuccessful outcomes. Exhausted is not terminal: a later poll
//! resumes from it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollState {
    /// Accepted, no report seen yet
    Pending,
    /// Some sub-job reports seen, batch not complete
    Partial,
    /// Complete report received
    Final,
    /// Poll budget ran out; resumable
    Exhausted,
    /// The service reported a grading failure
    Failed,
}

impl PollState {
    /// Final and Failed end polling; a rewritten report may still move
    /// between the two.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollState::Final | PollState::Failed)
    }

    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: PollState) -> bool {
        use PollState::*;
        match (self, target) {
            (Pending, _) => true,

            (Partial, Pending) => false,
            (Partial, _) => true,

            (Exhausted, _) => true,

            (Final | Failed, Final | Failed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PollState::Pending => "PENDING",
            PollState::Partial => "PARTIAL",
            PollState::Final => "FINAL",
            PollState::Exhausted => "EXHAUSTED",
            PollState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
