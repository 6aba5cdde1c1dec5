use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use gradx_protocol::attr;
use gradx_protocol::ops::JobReport;
use serde_json::Value;

use super::{read, write, Acceptance, Exercise};
use crate::artifact::Artifact;
use crate::error::GradingResult;
use crate::poll::{PollState, PollTarget, Pollable};

/// Immutable attributes a job is created with.
pub(crate) struct JobIdentity {
    pub jobid: String,
    pub pathdir: String,
    /// Key of the job inside its batch or exercise
    pub name: Option<String>,
    pub exercise: Option<Exercise>,
    pub exercise_uuid: Option<String>,
    pub personid: Option<String>,
    pub archived: Option<DateTime<Utc>>,
}

/// Report-derived, mutable part of a job.
#[derive(Debug, Clone)]
pub struct JobReportState {
    pub state: PollState,
    /// Once present, never goes back to absent
    pub mark: Option<f64>,
    pub total_mark: Option<f64>,
    /// Raw report entity (absent for batch sub-jobs)
    pub entity: Option<Vec<u8>>,
    pub document: Option<Value>,
    /// Description of the grading problem, if any
    pub problem: Option<String>,
}

struct JobInner {
    identity: JobIdentity,
    content: Option<Artifact>,
    acceptance: Option<Acceptance>,
    report: RwLock<JobReportState>,
    poll_guard: tokio::sync::Mutex<()>,
}

/// Shared handle on one graded answer.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    pub(crate) fn new(identity: JobIdentity, content: Option<Artifact>, acceptance: Option<Acceptance>) -> Self {
        Self {
            inner: Arc::new(JobInner {
                identity,
                content,
                acceptance,
                report: RwLock::new(JobReportState {
                    state: PollState::Pending,
                    mark: None,
                    total_mark: None,
                    entity: None,
                    document: None,
                    problem: None,
                }),
                poll_guard: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn jobid(&self) -> &str {
        &self.inner.identity.jobid
    }

    pub fn pathdir(&self) -> &str {
        &self.inner.identity.pathdir
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.identity.name.as_deref()
    }

    pub fn exercise(&self) -> Option<&Exercise> {
        self.inner.identity.exercise.as_ref()
    }

    /// Service-assigned identifier of the exercise.
    pub fn exercise_uuid(&self) -> Option<&str> {
        self.inner.identity.exercise_uuid.as_deref()
    }

    pub fn personid(&self) -> Option<&str> {
        self.inner.identity.personid.as_deref()
    }

    pub fn archived(&self) -> Option<DateTime<Utc>> {
        self.inner.identity.archived
    }

    /// Submitted content; absent for batch sub-jobs and pseudo-jobs.
    pub fn content(&self) -> Option<&Artifact> {
        self.inner.content.as_ref()
    }

    pub fn acceptance(&self) -> Option<&Acceptance> {
        self.inner.acceptance.as_ref()
    }

    pub fn report_path(&self) -> String {
        format!("{}/{}.xml", self.pathdir().trim_end_matches('/'), self.jobid())
    }

    pub fn state(&self) -> PollState {
        read(&self.inner.report).state
    }

    pub fn mark(&self) -> Option<f64> {
        read(&self.inner.report).mark
    }

    pub fn total_mark(&self) -> Option<f64> {
        read(&self.inner.report).total_mark
    }

    pub fn problem(&self) -> Option<String> {
        read(&self.inner.report).problem.clone()
    }

    /// Snapshot of the report-derived fields.
    pub fn report(&self) -> JobReportState {
        read(&self.inner.report).clone()
    }

    /// Whether both values are the same logical handle.
    pub fn ptr_eq(&self, other: &Job) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn poll_guard(&self) -> &tokio::sync::Mutex<()> {
        &self.inner.poll_guard
    }

    /// Fold a report into the job. Later reports overwrite earlier ones,
    /// except that a mark is never lost and a finished job never becomes
    /// pending again.
    pub(crate) fn apply_report(
        &self,
        report: &JobReport,
        document: Value,
        entity: Option<Vec<u8>>,
    ) -> GradingResult<PollState> {
        let outcome = ReportOutcome::parse(report)?;
        Ok(self.apply_outcome(outcome, document, entity))
    }

    /// Fold an already validated report into the job.
    pub(crate) fn apply_outcome(
        &self,
        outcome: ReportOutcome,
        document: Value,
        entity: Option<Vec<u8>>,
    ) -> PollState {
        let mut current = write(&self.inner.report);
        let next = match outcome {
            ReportOutcome::Graded { mark, total } => {
                if mark.is_some() {
                    current.mark = mark;
                    current.problem = None;
                }
                if total.is_some() {
                    current.total_mark = total;
                }
                if current.mark.is_some() {
                    PollState::Final
                } else if current.state.is_terminal() {
                    current.state
                } else {
                    PollState::Pending
                }
            }
            ReportOutcome::Problem(problem) => {
                current.problem = Some(problem);
                PollState::Failed
            }
        };
        current.document = Some(document);
        if entity.is_some() {
            current.entity = entity;
        }

        if current.state.can_transition_to(next) {
            if current.state != next {
                tracing::debug!(jobid = %self.jobid(), from = %current.state, to = %next, "job state changed");
            }
            current.state = next;
        } else {
            tracing::warn!(jobid = %self.jobid(), from = %current.state, to = %next, "ignoring invalid job transition");
        }
        current.state
    }
}

/// What one job report says, once its attributes are checked.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReportOutcome {
    Graded { mark: Option<f64>, total: Option<f64> },
    Problem(String),
}

impl ReportOutcome {
    pub(crate) fn parse(report: &JobReport) -> GradingResult<Self> {
        match report {
            JobReport::Student(student) => {
                let mark = student
                    .attrs
                    .mark
                    .as_deref()
                    .map(|m| attr::parse_mark("mark", m))
                    .transpose()?;
                let total = student
                    .attrs
                    .total_mark
                    .as_deref()
                    .map(|m| attr::parse_mark("totalMark", m))
                    .transpose()?;
                Ok(ReportOutcome::Graded { mark, total })
            }
            JobReport::Problem(problem) => Ok(ReportOutcome::Problem(problem.describe())),
        }
    }
}

impl Pollable for Job {
    fn label(&self) -> String {
        format!("job {}", self.jobid())
    }

    fn report_path(&self) -> String {
        Job::report_path(self)
    }

    fn target(&self) -> PollTarget<'_> {
        PollTarget::Job(self)
    }

    fn state(&self) -> PollState {
        Job::state(self)
    }

    fn apply(&self, document: &Value, entity: &[u8]) -> GradingResult<PollState> {
        let report = JobReport::from_document(document)?;
        self.apply_report(&report, document.clone(), Some(entity.to_vec()))
    }

    fn mark_exhausted(&self) {
        let mut current = write(&self.inner.report);
        if !current.state.is_terminal() {
            current.state = PollState::Exhausted;
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = read(&self.inner.report);
        f.debug_struct("Job")
            .field("jobid", &self.jobid())
            .field("name", &self.name())
            .field("state", &report.state)
            .field("mark", &report.mark)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job() -> Job {
        Job::new(
            JobIdentity {
                jobid: "J1".to_string(),
                pathdir: "/s/job/J1/".to_string(),
                name: None,
                exercise: None,
                exercise_uuid: None,
                personid: Some("45".to_string()),
                archived: None,
            },
            None,
            None,
        )
    }

    fn apply(job: &Job, document: Value) -> PollState {
        Pollable::apply(job, &document, b"{}").unwrap()
    }

    #[test]
    fn test_report_path() {
        assert_eq!(job().report_path(), "/s/job/J1/J1.xml");
    }

    #[test]
    fn test_mark_makes_job_final() {
        let job = job();
        let state = apply(
            &job,
            json!({"fw4ex": {"jobStudentReport": {"$": {"mark": "0.6", "totalMark": "1"}}}}),
        );
        assert_eq!(state, PollState::Final);
        assert_eq!(job.mark(), Some(0.6));
        assert_eq!(job.total_mark(), Some(1.0));
        assert!(job.report().entity.is_some());
    }

    #[test]
    fn test_mark_never_regresses() {
        let job = job();
        apply(&job, json!({"fw4ex": {"jobStudentReport": {"$": {"mark": "1"}}}}));
        let state = apply(&job, json!({"fw4ex": {"jobStudentReport": {"$": {}}}}));

        assert_eq!(state, PollState::Final);
        assert_eq!(job.mark(), Some(1.0));
    }

    #[test]
    fn test_problem_report_fails_job() {
        let job = job();
        let state = apply(
            &job,
            json!({"fw4ex": {"jobProblemReport": {"$": {"phase": "run"}, "message": "timeout"}}}),
        );
        assert_eq!(state, PollState::Failed);
        assert_eq!(job.problem().as_deref(), Some("timeout (phase run)"));
    }

    #[test]
    fn test_negative_mark_is_protocol_error() {
        let job = job();
        let document = json!({"fw4ex": {"jobStudentReport": {"$": {"mark": "-1"}}}});
        assert!(Pollable::apply(&job, &document, b"").is_err());
        assert_eq!(job.state(), PollState::Pending);
    }

    #[test]
    fn test_exhausted_only_when_not_terminal() {
        let job = job();
        job.mark_exhausted();
        assert_eq!(job.state(), PollState::Exhausted);

        apply(&job, json!({"fw4ex": {"jobStudentReport": {"$": {"mark": "1"}}}}));
        job.mark_exhausted();
        assert_eq!(job.state(), PollState::Final);
    }

    #[test]
    fn test_later_mark_overwrites_earlier_one() {
        let job = job();
        apply(&job, json!({"fw4ex": {"jobStudentReport": {"$": {"mark": "1"}}}}));
        let state = apply(&job, json!({"fw4ex": {"jobStudentReport": {"$": {"mark": "0.5"}}}}));

        assert_eq!(state, PollState::Final);
        assert_eq!(job.mark(), Some(0.5));
    }

    #[test]
    fn test_clones_share_state() {
        let job = job();
        let clone = job.clone();
        apply(&clone, json!({"fw4ex": {"jobStudentReport": {"$": {"mark": "1"}}}}));

        assert!(job.ptr_eq(&clone));
        assert_eq!(job.mark(), Some(1.0));
    }
}
