//! Grading report documents.
//!
//! A single job yields either a student report (a mark) or a problem report
//! (grading could not complete). A batch report aggregates the reports of its
//! jobs available so far, together with the expected job count.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::element_text;
use crate::attr;
use crate::envelope::{decode_element, select, OneOrMany};
use crate::error::EnvelopeResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentReportAttrs {
    #[serde(default, deserialize_with = "attr::opt_text")]
    pub jobid: Option<String>,
    /// Name of the submitted item; stable key of a job inside a batch.
    #[serde(default, deserialize_with = "attr::opt_text")]
    pub name: Option<String>,
    /// Absent while a batch job is still being graded.
    #[serde(default, deserialize_with = "attr::opt_text")]
    pub mark: Option<String>,
    #[serde(rename = "totalMark", default, deserialize_with = "attr::opt_text")]
    pub total_mark: Option<String>,
    #[serde(default, deserialize_with = "attr::opt_text")]
    pub archived: Option<String>,
}

/// Report of a graded job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStudentReport {
    #[serde(rename = "$", default)]
    pub attrs: StudentReportAttrs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemReportAttrs {
    #[serde(default, deserialize_with = "attr::opt_text")]
    pub jobid: Option<String>,
    #[serde(default, deserialize_with = "attr::opt_text")]
    pub name: Option<String>,
    /// Grading phase in which the problem occurred.
    #[serde(default, deserialize_with = "attr::opt_text")]
    pub phase: Option<String>,
}

/// Report of a job the service could not grade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProblemReport {
    #[serde(rename = "$", default)]
    pub attrs: ProblemReportAttrs,
    #[serde(default)]
    pub message: Option<Value>,
}

impl JobProblemReport {
    /// Human-readable description of the problem.
    pub fn describe(&self) -> String {
        let message = self
            .message
            .as_ref()
            .and_then(element_text)
            .filter(|m| !m.is_empty());
        match (&self.attrs.phase, message) {
            (Some(phase), Some(message)) => format!("{} (phase {})", message, phase),
            (None, Some(message)) => message,
            (Some(phase), None) => format!("grading problem in phase {}", phase),
            (None, None) => "grading problem".to_string(),
        }
    }
}

/// Outcome of grading one job.
#[derive(Debug, Clone)]
pub enum JobReport {
    Student(JobStudentReport),
    Problem(JobProblemReport),
}

impl JobReport {
    pub const STUDENT: &'static str = "jobStudentReport";
    pub const PROBLEM: &'static str = "jobProblemReport";

    /// Decode the report of a single job.
    pub fn from_document(document: &Value) -> EnvelopeResult<Self> {
        let (name, subtree) = select(document, &[Self::STUDENT, Self::PROBLEM])?;
        Self::from_element(name, subtree)
    }

    fn from_element(name: &str, subtree: &Value) -> EnvelopeResult<Self> {
        if name == Self::PROBLEM {
            decode_element(name, subtree).map(JobReport::Problem)
        } else {
            decode_element(name, subtree).map(JobReport::Student)
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            JobReport::Student(r) => r.attrs.name.as_deref(),
            JobReport::Problem(r) => r.attrs.name.as_deref(),
        }
    }

    pub fn jobid(&self) -> Option<&str> {
        match self {
            JobReport::Student(r) => r.attrs.jobid.as_deref(),
            JobReport::Problem(r) => r.attrs.jobid.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiJobAttrs {
    #[serde(default, deserialize_with = "attr::opt_text")]
    pub batchid: Option<String>,
    /// Number of jobs found in the uploaded archive, once known.
    #[serde(default, deserialize_with = "attr::opt_text")]
    pub totaljobs: Option<String>,
    #[serde(default, deserialize_with = "attr::opt_text")]
    pub finishedjobs: Option<String>,
}

/// Aggregated report of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiJobStudentReport {
    #[serde(rename = "$", default)]
    pub attrs: MultiJobAttrs,
    #[serde(rename = "jobStudentReport", default)]
    pub students: OneOrMany<Value>,
    #[serde(rename = "jobProblemReport", default)]
    pub problems: OneOrMany<Value>,
}

/// One job report found inside a batch report, with its raw subtree.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub report: JobReport,
    pub raw: Value,
}

impl BatchEntry {
    /// Stable key of this entry: the name of the submitted item.
    pub fn key(&self) -> Option<&str> {
        self.report.name().map(str::trim).filter(|k| !k.is_empty())
    }
}

impl MultiJobStudentReport {
    pub const ELEMENT: &'static str = "multiJobStudentReport";

    pub fn from_document(document: &Value) -> EnvelopeResult<Self> {
        let (name, subtree) = select(document, &[Self::ELEMENT])?;
        decode_element(name, subtree)
    }

    /// Expected number of jobs, if the service already knows it.
    pub fn total_jobs(&self) -> EnvelopeResult<Option<u32>> {
        self.attrs
            .totaljobs
            .as_deref()
            .map(|v| attr::parse_u32("totaljobs", v))
            .transpose()
    }

    /// All job reports carried by this batch report, in document order
    /// (student reports first).
    pub fn entries(&self) -> EnvelopeResult<Vec<BatchEntry>> {
        let students = self.students.clone().into_vec().into_iter().map(|raw| (JobReport::STUDENT, raw));
        let problems = self.problems.clone().into_vec().into_iter().map(|raw| (JobReport::PROBLEM, raw));

        students
            .chain(problems)
            .map(|(name, raw)| {
                let report = JobReport::from_element(name, &raw)?;
                Ok(BatchEntry { report, raw })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_student_report() {
        let doc = json!({"fw4ex": {"jobStudentReport": {
            "$": {"jobid": "J1", "mark": "0.6", "totalMark": "1"}
        }}});
        match JobReport::from_document(&doc).unwrap() {
            JobReport::Student(r) => {
                assert_eq!(r.attrs.mark.as_deref(), Some("0.6"));
                assert_eq!(r.attrs.total_mark.as_deref(), Some("1"));
            }
            JobReport::Problem(_) => panic!("expected a student report"),
        }
    }

    #[test]
    fn test_problem_report_describe() {
        let doc = json!({"fw4ex": {"jobProblemReport": {
            "$": {"jobid": "J2", "phase": "compile"},
            "message": "gcc exited with status 1"
        }}});
        match JobReport::from_document(&doc).unwrap() {
            JobReport::Problem(r) => {
                assert_eq!(r.describe(), "gcc exited with status 1 (phase compile)");
            }
            JobReport::Student(_) => panic!("expected a problem report"),
        }
    }

    #[test]
    fn test_batch_entries_single_and_repeated_children() {
        let doc = json!({"fw4ex": {"multiJobStudentReport": {
            "$": {"totaljobs": "3", "finishedjobs": "1"},
            "jobStudentReport": [
                {"$": {"name": "one", "jobid": "J1", "mark": "1"}},
                {"$": {"name": "two", "jobid": "J2"}}
            ],
            "jobProblemReport": {"$": {"name": "three", "jobid": "J3"}}
        }}});

        let report = MultiJobStudentReport::from_document(&doc).unwrap();
        assert_eq!(report.total_jobs().unwrap(), Some(3));

        let entries = report.entries().unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key().unwrap()).collect();
        assert_eq!(keys, vec!["one", "two", "three"]);
        assert!(matches!(entries[2].report, JobReport::Problem(_)));
    }

    #[test]
    fn test_batch_without_jobs_yet() {
        let doc = json!({"fw4ex": {"multiJobStudentReport": {"$": {}}}});
        let report = MultiJobStudentReport::from_document(&doc).unwrap();
        assert_eq!(report.total_jobs().unwrap(), None);
        assert!(report.entries().unwrap().is_empty());
    }
}
