//! Acceptance documents.
//!
//! The service answers every upload immediately with one of three
//! "submitted" reports. They carry the identifiers needed to poll for the
//! grading result later.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attr;
use crate::envelope::{decode_element, select, Element};
use crate::error::EnvelopeResult;

/// Attributes of a submitted-report element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationAttrs {
    /// Storage location token where reports will appear.
    #[serde(deserialize_with = "attr::text")]
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonAttrs {
    #[serde(deserialize_with = "attr::text")]
    pub personid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseAttrs {
    #[serde(deserialize_with = "attr::text")]
    pub exerciseid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAttrs {
    #[serde(deserialize_with = "attr::text")]
    pub jobid: String,
    #[serde(deserialize_with = "attr::text")]
    pub archived: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAttrs {
    #[serde(deserialize_with = "attr::text")]
    pub batchid: String,
    #[serde(deserialize_with = "attr::text")]
    pub archived: String,
}

/// Acceptance of a single answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmittedReport {
    #[serde(rename = "$")]
    pub attrs: LocationAttrs,
    pub person: Element<PersonAttrs>,
    pub exercise: Element<ExerciseAttrs>,
    pub job: Element<JobAttrs>,
}

/// Acceptance of a new exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseSubmittedReport {
    #[serde(rename = "$")]
    pub attrs: LocationAttrs,
    pub person: Element<PersonAttrs>,
    pub exercise: Element<ExerciseAttrs>,
}

/// Acceptance of a batch of answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiJobSubmittedReport {
    #[serde(rename = "$")]
    pub attrs: LocationAttrs,
    pub person: Element<PersonAttrs>,
    pub exercise: Element<ExerciseAttrs>,
    pub batch: Element<BatchAttrs>,
}

/// The acceptance variants, one per submission kind.
#[derive(Debug, Clone)]
pub enum Accepted {
    Job(JobSubmittedReport),
    Exercise(ExerciseSubmittedReport),
    Batch(MultiJobSubmittedReport),
}

impl Accepted {
    pub const JOB: &'static str = "jobSubmittedReport";
    pub const EXERCISE: &'static str = "exerciseSubmittedReport";
    pub const BATCH: &'static str = "multiJobSubmittedReport";

    /// Decode whichever acceptance element the document carries.
    pub fn from_document(document: &Value) -> EnvelopeResult<Self> {
        let (name, subtree) = select(document, &[Self::JOB, Self::EXERCISE, Self::BATCH])?;
        match name {
            Self::JOB => decode_element(name, subtree).map(Accepted::Job),
            Self::EXERCISE => decode_element(name, subtree).map(Accepted::Exercise),
            _ => decode_element(name, subtree).map(Accepted::Batch),
        }
    }

    /// Element name of this variant.
    pub fn element(&self) -> &'static str {
        match self {
            Accepted::Job(_) => Self::JOB,
            Accepted::Exercise(_) => Self::EXERCISE,
            Accepted::Batch(_) => Self::BATCH,
        }
    }
}
