//! Mock service state: deployed exercises and published reports.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

/// Outcome of grading one answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Grade {
    Mark { mark: f64, total: f64 },
    /// The answer could not be graded
    Problem(String),
}

impl Grade {
    /// A mark out of 1.
    pub fn mark(mark: f64) -> Self {
        Grade::Mark { mark, total: 1.0 }
    }

    pub fn out_of(mark: f64, total: f64) -> Self {
        Grade::Mark { mark, total }
    }

    pub fn problem(message: impl Into<String>) -> Self {
        Grade::Problem(message.into())
    }

    /// Single-job report document.
    pub(crate) fn job_report(&self, jobid: &str, name: Option<&str>, archived: &str) -> Value {
        json!({"fw4ex": self.entry(jobid, name, Some(archived))})
    }

    /// Report element of one graded job, keyed by its element name.
    fn entry(&self, jobid: &str, name: Option<&str>, archived: Option<&str>) -> Value {
        let mut attrs = json!({"jobid": jobid});
        if let Some(name) = name {
            attrs["name"] = json!(name);
        }
        if let Some(archived) = archived {
            attrs["archived"] = json!(archived);
        }
        match self {
            Grade::Mark { mark, total } => {
                attrs["mark"] = json!(mark.to_string());
                attrs["totalMark"] = json!(total.to_string());
                json!({"jobStudentReport": {"$": attrs}})
            }
            Grade::Problem(message) => {
                json!({"jobProblemReport": {"$": attrs, "message": message}})
            }
        }
    }
}

/// Grades an answer given its name and content.
pub type Grader = Arc<dyn Fn(&str, &[u8]) -> Grade + Send + Sync>;

#[derive(Clone)]
pub struct DeployedExercise {
    pub name: String,
    pub grader: Grader,
}

impl fmt::Debug for DeployedExercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployedExercise").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub name: String,
    pub jobid: String,
    pub grade: Grade,
}

/// A batch whose report grows with every fetch.
#[derive(Debug, Clone)]
pub struct MockBatch {
    pub batchid: String,
    pub entries: Vec<BatchEntry>,
    /// Number of fetches served so far
    pub fetches: usize,
}

impl MockBatch {
    /// Serve the next report: after `n` fetches, the first `n` entries are
    /// listed and the first `n - 1` of them are graded.
    pub fn next_report(&mut self) -> Value {
        self.fetches += 1;
        let visible = self.fetches.min(self.entries.len());
        let graded = (self.fetches - 1).min(self.entries.len());

        let mut students = Vec::new();
        let mut problems = Vec::new();
        for (index, entry) in self.entries.iter().take(visible).enumerate() {
            if index < graded {
                let element = entry.grade.entry(&entry.jobid, Some(&entry.name), None);
                match entry.grade {
                    Grade::Mark { .. } => students.push(element["jobStudentReport"].clone()),
                    Grade::Problem(_) => problems.push(element["jobProblemReport"].clone()),
                }
            } else {
                students.push(json!({"$": {"jobid": entry.jobid, "name": entry.name}}));
            }
        }

        json!({"fw4ex": {"multiJobStudentReport": {
            "$": {
                "batchid": self.batchid,
                "totaljobs": self.entries.len().to_string(),
                "finishedjobs": graded.to_string()
            },
            "jobStudentReport": students,
            "jobProblemReport": problems
        }}})
    }

    pub fn is_complete(&self) -> bool {
        self.fetches > self.entries.len()
    }
}

#[derive(Debug, Clone)]
pub enum ReportContent {
    Document(Value),
    Batch(MockBatch),
}

#[derive(Debug, Clone)]
pub struct StoredReport {
    /// Fetches still answered with 404
    pub remaining_delay: u32,
    pub content: ReportContent,
}

/// Mock service state container
#[derive(Debug)]
pub struct MockState {
    /// Deployed exercises by safecookie
    pub exercises: HashMap<String, DeployedExercise>,
    /// Published reports by storage path
    pub reports: HashMap<String, StoredReport>,
    /// Person id stamped on every acceptance
    pub personid: String,
    /// Fetches answered with 404 before a new report is served
    pub report_delay: u32,
    id_counter: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            exercises: HashMap::new(),
            reports: HashMap::new(),
            personid: "45".to_string(),
            report_delay: 0,
            id_counter: 0,
        }
    }
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, prefix: &str) -> String {
        self.id_counter += 1;
        format!("{}{:06}", prefix, self.id_counter)
    }

    pub fn publish(&mut self, path: String, content: ReportContent) {
        let report = StoredReport {
            remaining_delay: self.report_delay,
            content,
        };
        self.reports.insert(path, report);
    }

    /// Serve the report at `path`, or `None` while it is not available.
    pub fn fetch(&mut self, path: &str) -> Option<Value> {
        let report = self.reports.get_mut(path)?;
        if report.remaining_delay > 0 {
            report.remaining_delay -= 1;
            return None;
        }
        Some(match &mut report.content {
            ReportContent::Document(document) => document.clone(),
            ReportContent::Batch(batch) => batch.next_report(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> MockBatch {
        MockBatch {
            batchid: "B1".to_string(),
            entries: vec![
                BatchEntry {
                    name: "one".to_string(),
                    jobid: "J1".to_string(),
                    grade: Grade::mark(1.0),
                },
                BatchEntry {
                    name: "two".to_string(),
                    jobid: "J2".to_string(),
                    grade: Grade::problem("no main"),
                },
            ],
            fetches: 0,
        }
    }

    #[test]
    fn test_batch_reveals_progressively() {
        let mut batch = batch();

        let first = batch.next_report();
        let report = &first["fw4ex"]["multiJobStudentReport"];
        assert_eq!(report["jobStudentReport"].as_array().unwrap().len(), 1);
        assert!(report["jobStudentReport"][0]["$"].get("mark").is_none());
        assert_eq!(report["$"]["totaljobs"], "2");

        batch.next_report();
        let third = batch.next_report();
        let report = &third["fw4ex"]["multiJobStudentReport"];
        assert_eq!(report["jobStudentReport"][0]["$"]["mark"], "1");
        assert_eq!(report["jobProblemReport"][0]["message"], "no main");
        assert_eq!(report["$"]["finishedjobs"], "2");
        assert!(batch.is_complete());
    }

    #[test]
    fn test_report_delay() {
        let mut state = MockState::new();
        state.report_delay = 1;
        state.publish("/s/a.xml".to_string(), ReportContent::Document(json!({"x": 1})));

        assert!(state.fetch("/s/a.xml").is_none());
        assert_eq!(state.fetch("/s/a.xml"), Some(json!({"x": 1})));
        assert!(state.fetch("/s/b.xml").is_none());
    }

    #[test]
    fn test_grade_rendering() {
        let report = Grade::out_of(45.0, 100.0).job_report("P2", Some("half"), "2024-01-01 00:00:00");
        let attrs = &report["fw4ex"]["jobStudentReport"]["$"];
        assert_eq!(attrs["mark"], "45");
        assert_eq!(attrs["totalMark"], "100");
        assert_eq!(attrs["name"], "half");
    }
}
