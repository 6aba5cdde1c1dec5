//! Exercise author report.
//!
//! Once a newly submitted exercise has been checked, the service publishes an
//! author report with the deployment token of the exercise and the
//! pseudo-jobs it graded against the exercise's own sample answers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::element_text;
use crate::attr;
use crate::envelope::{decode_element, select, Element, OneOrMany};
use crate::error::EnvelopeResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorReportAttrs {
    #[serde(default, deserialize_with = "attr::opt_text")]
    pub exerciseid: Option<String>,
    /// Deployment token; absent when the exercise could not be deployed.
    #[serde(default, deserialize_with = "attr::opt_text")]
    pub safecookie: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PseudoJobAttrs {
    #[serde(deserialize_with = "attr::text")]
    pub name: String,
    #[serde(deserialize_with = "attr::text")]
    pub jobid: String,
    #[serde(deserialize_with = "attr::text")]
    pub location: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PseudoJobs {
    #[serde(default)]
    pub pseudojob: OneOrMany<Element<PseudoJobAttrs>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseAuthorReport {
    #[serde(rename = "$", default)]
    pub attrs: AuthorReportAttrs,
    #[serde(default)]
    pub pseudojobs: Option<PseudoJobs>,
    #[serde(default)]
    pub message: Option<Value>,
}

impl ExerciseAuthorReport {
    pub const ELEMENT: &'static str = "exerciseAuthorReport";

    pub fn from_document(document: &Value) -> EnvelopeResult<Self> {
        let (name, subtree) = select(document, &[Self::ELEMENT])?;
        decode_element(name, subtree)
    }

    /// Deployment token, if the exercise was deployed.
    pub fn safecookie(&self) -> Option<&str> {
        self.attrs
            .safecookie
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn pseudojobs(&self) -> Vec<PseudoJobAttrs> {
        self.pseudojobs
            .clone()
            .unwrap_or_default()
            .pseudojob
            .into_vec()
            .into_iter()
            .map(|e| e.attrs)
            .collect()
    }

    pub fn message(&self) -> Option<String> {
        self.message.as_ref().and_then(element_text)
    }
}
