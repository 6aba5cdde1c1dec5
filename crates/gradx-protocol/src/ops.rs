//! Typed shapes of the service documents, one module per exchange.

pub mod author;
pub mod report;
pub mod submitted;

pub use author::{ExerciseAuthorReport, PseudoJobAttrs};
pub use report::{BatchEntry, JobProblemReport, JobReport, JobStudentReport, MultiJobStudentReport};
pub use submitted::{
    Accepted, ExerciseSubmittedReport, JobSubmittedReport, MultiJobSubmittedReport,
};

use serde_json::Value;

/// Text content of a simple child element.
///
/// A text-only child decodes either as a bare string or, when it also has
/// attributes, as an object holding the text under `_`.
pub(crate) fn element_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Object(map) => map.get("_").and_then(Value::as_str).map(|s| s.trim().to_string()),
        Value::Array(items) => items.first().and_then(element_text),
        _ => None,
    }
}
