//! Mock Grading Service
//!
//! In-process stand-in for the grading service, used through
//! `MockTransport` in tests and demos.
//!
//! # Routes
//!
//! - `POST a:/exercise/<cookie>/job`: grade one answer
//! - `POST a:/exercise/<cookie>/batch`: grade every answer of a tar archive
//! - `POST e:/exercises/`: deploy a new exercise with two pseudo-jobs
//! - `POST x:/exercisesset/yml2json/<campaign>`: echo a set description
//! - `GET s:<path>`: serve a report once its delay has elapsed
//!
//! Batch reports are revealed progressively: every fetch shows one more
//! entry and grades the one shown before it.

mod failure;
mod service;
mod state;

pub use failure::{FailureConfig, FailureInjector, FailureMode, MockRoute};
pub use service::MockGradingService;
pub use state::{Grade, MockState};
