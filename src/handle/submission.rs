use std::fmt;
use std::sync::{Arc, RwLock};

use gradx_protocol::ops::ExerciseAuthorReport;
use serde_json::Value;

use super::job::JobIdentity;
use super::{read, write, Acceptance, Exercise, Job};
use crate::artifact::Artifact;
use crate::cache::JobsCache;
use crate::error::GradingResult;
use crate::poll::{PollState, PollTarget, Pollable};

/// Name of the author report under an exercise's location.
const AUTHOR_REPORT: &str = "exerciseAuthorReport.xml";

pub(crate) struct SubmissionIdentity {
    pub location: String,
    pub personid: String,
    pub exerciseid: String,
}

/// What the author report said about a submitted exercise.
#[derive(Debug, Clone)]
pub struct AuthorOutcome {
    pub state: PollState,
    /// Deployment token, once the exercise is deployed
    pub safecookie: Option<String>,
    pub message: Option<String>,
    pub entity: Option<Vec<u8>>,
    pub document: Option<Value>,
}

struct SubmissionInner {
    identity: SubmissionIdentity,
    content: Option<Artifact>,
    acceptance: Acceptance,
    outcome: RwLock<AuthorOutcome>,
    pseudojobs: JobsCache,
    poll_guard: tokio::sync::Mutex<()>,
}

/// Shared handle on a newly submitted exercise.
#[derive(Clone)]
pub struct ExerciseSubmission {
    inner: Arc<SubmissionInner>,
}

impl ExerciseSubmission {
    pub(crate) fn new(identity: SubmissionIdentity, content: Option<Artifact>, acceptance: Acceptance) -> Self {
        Self {
            inner: Arc::new(SubmissionInner {
                identity,
                content,
                acceptance,
                outcome: RwLock::new(AuthorOutcome {
                    state: PollState::Pending,
                    safecookie: None,
                    message: None,
                    entity: None,
                    document: None,
                }),
                pseudojobs: JobsCache::new(),
                poll_guard: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn location(&self) -> &str {
        &self.inner.identity.location
    }

    pub fn personid(&self) -> &str {
        &self.inner.identity.personid
    }

    pub fn exerciseid(&self) -> &str {
        &self.inner.identity.exerciseid
    }

    pub fn content(&self) -> Option<&Artifact> {
        self.inner.content.as_ref()
    }

    pub fn acceptance(&self) -> &Acceptance {
        &self.inner.acceptance
    }

    pub fn report_path(&self) -> String {
        format!("{}/{}", self.location().trim_end_matches('/'), AUTHOR_REPORT)
    }

    pub fn state(&self) -> PollState {
        read(&self.inner.outcome).state
    }

    pub fn safecookie(&self) -> Option<String> {
        read(&self.inner.outcome).safecookie.clone()
    }

    pub fn outcome(&self) -> AuthorOutcome {
        read(&self.inner.outcome).clone()
    }

    /// The deployed exercise, usable for answers and batches.
    pub fn exercise(&self) -> Option<Exercise> {
        self.safecookie()
            .map(|cookie| Exercise::new(self.exerciseid()).with_safecookie(cookie))
    }

    /// Pseudo-jobs the service graded against the exercise's sample answers,
    /// keyed by name (`perfect`, `half`, ...).
    pub fn pseudojobs(&self) -> &JobsCache {
        &self.inner.pseudojobs
    }

    pub fn pseudojob(&self, name: &str) -> Option<Job> {
        self.inner.pseudojobs.get(name)
    }

    pub fn ptr_eq(&self, other: &ExerciseSubmission) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn poll_guard(&self) -> &tokio::sync::Mutex<()> {
        &self.inner.poll_guard
    }

    pub(crate) fn apply_report(
        &self,
        report: &ExerciseAuthorReport,
        document: Value,
        entity: Vec<u8>,
    ) -> PollState {
        let identity = &self.inner.identity;
        for pseudo in report.pseudojobs() {
            let (_, inserted) = self.inner.pseudojobs.upsert(&pseudo.name, || {
                Job::new(
                    JobIdentity {
                        jobid: pseudo.jobid.clone(),
                        pathdir: pseudo.location.clone(),
                        name: Some(pseudo.name.clone()),
                        exercise: None,
                        exercise_uuid: Some(identity.exerciseid.clone()),
                        personid: Some(identity.personid.clone()),
                        archived: None,
                    },
                    None,
                    None,
                )
            });
            if inserted {
                tracing::debug!(exerciseid = %self.exerciseid(), name = %pseudo.name, jobid = %pseudo.jobid, "pseudo-job registered");
            }
        }

        let mut outcome = write(&self.inner.outcome);
        let next = match report.safecookie() {
            Some(cookie) => {
                outcome.safecookie = Some(cookie.to_string());
                PollState::Final
            }
            None => PollState::Failed,
        };
        outcome.message = report.message();
        outcome.document = Some(document);
        outcome.entity = Some(entity);

        if outcome.state.can_transition_to(next) {
            if outcome.state != next {
                tracing::info!(exerciseid = %self.exerciseid(), to = %next, "exercise report received");
            }
            outcome.state = next;
        }
        outcome.state
    }
}

impl Pollable for ExerciseSubmission {
    fn label(&self) -> String {
        format!("exercise {}", self.exerciseid())
    }

    fn report_path(&self) -> String {
        ExerciseSubmission::report_path(self)
    }

    fn target(&self) -> PollTarget<'_> {
        PollTarget::Exercise(self)
    }

    fn state(&self) -> PollState {
        ExerciseSubmission::state(self)
    }

    fn apply(&self, document: &Value, entity: &[u8]) -> GradingResult<PollState> {
        let report = ExerciseAuthorReport::from_document(document)?;
        Ok(self.apply_report(&report, document.clone(), entity.to_vec()))
    }

    fn mark_exhausted(&self) {
        let mut outcome = write(&self.inner.outcome);
        if !outcome.state.is_terminal() {
            outcome.state = PollState::Exhausted;
        }
    }
}

impl fmt::Debug for ExerciseSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = read(&self.inner.outcome);
        f.debug_struct("ExerciseSubmission")
            .field("exerciseid", &self.exerciseid())
            .field("location", &self.location())
            .field("state", &outcome.state)
            .field("pseudojobs", &self.inner.pseudojobs)
            .finish()
    }
}
