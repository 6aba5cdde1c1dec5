//! Submission encoding and acceptance parsing.

pub mod acceptance;
pub mod encoder;

pub use encoder::{encode, SubmissionKind};
