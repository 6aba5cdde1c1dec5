use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use gradx_protocol::ops::MultiJobStudentReport;
use serde_json::Value;

use super::job::{JobIdentity, ReportOutcome};
use super::{read, write, Acceptance, Exercise, Job};
use crate::artifact::Artifact;
use crate::cache::JobsCache;
use crate::error::{GradingError, GradingResult};
use crate::poll::{PollState, PollTarget, Pollable};

pub(crate) struct BatchIdentity {
    pub batchid: String,
    pub pathdir: String,
    pub exercise: Exercise,
    pub exercise_uuid: String,
    pub personid: String,
    pub archived: Option<DateTime<Utc>>,
}

/// Progress of a batch as of the last report.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub state: PollState,
    /// Never above `totaljobs`; monotonic once `totaljobs` is known
    pub finishedjobs: u32,
    /// Set once the service knows how many jobs the archive holds
    pub totaljobs: Option<u32>,
    pub entity: Option<Vec<u8>>,
    pub document: Option<Value>,
}

struct BatchInner {
    identity: BatchIdentity,
    content: Option<Artifact>,
    acceptance: Acceptance,
    progress: RwLock<BatchProgress>,
    jobs: JobsCache,
    poll_guard: tokio::sync::Mutex<()>,
}

/// Shared handle on a batch of answers uploaded together.
#[derive(Clone)]
pub struct Batch {
    inner: Arc<BatchInner>,
}

impl Batch {
    pub(crate) fn new(identity: BatchIdentity, content: Option<Artifact>, acceptance: Acceptance) -> Self {
        Self {
            inner: Arc::new(BatchInner {
                identity,
                content,
                acceptance,
                progress: RwLock::new(BatchProgress {
                    state: PollState::Pending,
                    finishedjobs: 0,
                    totaljobs: None,
                    entity: None,
                    document: None,
                }),
                jobs: JobsCache::new(),
                poll_guard: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn batchid(&self) -> &str {
        &self.inner.identity.batchid
    }

    pub fn pathdir(&self) -> &str {
        &self.inner.identity.pathdir
    }

    pub fn exercise(&self) -> &Exercise {
        &self.inner.identity.exercise
    }

    pub fn exercise_uuid(&self) -> &str {
        &self.inner.identity.exercise_uuid
    }

    pub fn personid(&self) -> &str {
        &self.inner.identity.personid
    }

    pub fn archived(&self) -> Option<DateTime<Utc>> {
        self.inner.identity.archived
    }

    pub fn content(&self) -> Option<&Artifact> {
        self.inner.content.as_ref()
    }

    pub fn acceptance(&self) -> &Acceptance {
        &self.inner.acceptance
    }

    pub fn report_path(&self) -> String {
        format!("{}/{}.xml", self.pathdir().trim_end_matches('/'), self.batchid())
    }

    pub fn state(&self) -> PollState {
        read(&self.inner.progress).state
    }

    pub fn finishedjobs(&self) -> u32 {
        read(&self.inner.progress).finishedjobs
    }

    pub fn totaljobs(&self) -> Option<u32> {
        read(&self.inner.progress).totaljobs
    }

    /// Number of distinct sub-jobs seen so far.
    pub fn seen(&self) -> usize {
        self.inner.jobs.len()
    }

    pub fn progress(&self) -> BatchProgress {
        read(&self.inner.progress).clone()
    }

    pub fn jobs(&self) -> &JobsCache {
        &self.inner.jobs
    }

    /// Sub-job submitted under `key` (its file or directory name).
    pub fn job(&self, key: &str) -> Option<Job> {
        self.inner.jobs.get(key)
    }

    pub fn is_complete(&self) -> bool {
        self.state() == PollState::Final
    }

    pub fn ptr_eq(&self, other: &Batch) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn poll_guard(&self) -> &tokio::sync::Mutex<()> {
        &self.inner.poll_guard
    }

    /// Fold a batch report into the handle. Every entry is validated
    /// before anything is cached, so a rejected report changes nothing.
    pub(crate) fn apply_report(
        &self,
        report: &MultiJobStudentReport,
        document: Value,
        entity: Vec<u8>,
    ) -> GradingResult<PollState> {
        let total = report.total_jobs()?;
        let identity = &self.inner.identity;

        let mut checked = Vec::new();
        for entry in report.entries()? {
            let key = entry.key().ok_or_else(|| {
                GradingError::Protocol(format!(
                    "report of batch {} has a job entry without a name",
                    self.batchid()
                ))
            })?
            .to_string();
            let jobid = entry.report.jobid().unwrap_or(key.as_str()).to_string();
            let outcome = ReportOutcome::parse(&entry.report)?;
            checked.push((key, jobid, outcome, entry.raw));
        }

        for (key, jobid, outcome, raw) in checked {
            let (job, inserted) = self.inner.jobs.upsert(&key, || {
                Job::new(
                    JobIdentity {
                        jobid,
                        pathdir: identity.pathdir.clone(),
                        name: Some(key.clone()),
                        exercise: Some(identity.exercise.clone()),
                        exercise_uuid: Some(identity.exercise_uuid.clone()),
                        personid: Some(identity.personid.clone()),
                        archived: None,
                    },
                    None,
                    None,
                )
            });
            if inserted {
                tracing::debug!(batchid = %self.batchid(), key = %key, "new sub-job");
            }
            job.apply_outcome(outcome, raw, None);
        }

        let finished = self.inner.jobs.finished_count();
        let mut progress = write(&self.inner.progress);

        match (progress.totaljobs, total) {
            (None, Some(t)) => progress.totaljobs = Some(t),
            (Some(known), Some(t)) if known != t => {
                tracing::warn!(batchid = %self.batchid(), known, reported = t, "totaljobs changed; keeping first value");
            }
            _ => {}
        }

        // Never above totaljobs; never decreasing once totaljobs is known.
        let finishedjobs = progress.finishedjobs.max(finished);
        progress.finishedjobs = progress.totaljobs.map_or(finishedjobs, |t| finishedjobs.min(t));
        progress.document = Some(document);
        progress.entity = Some(entity);

        let next = match progress.totaljobs {
            Some(t) if progress.finishedjobs >= t => PollState::Final,
            _ if !self.inner.jobs.is_empty() => PollState::Partial,
            _ => PollState::Pending,
        };
        if progress.state.can_transition_to(next) {
            if progress.state != next {
                tracing::info!(batchid = %self.batchid(), from = %progress.state, to = %next,
                    finishedjobs = progress.finishedjobs, totaljobs = ?progress.totaljobs, "batch state changed");
            }
            progress.state = next;
        } else {
            tracing::warn!(batchid = %self.batchid(), from = %progress.state, to = %next, "ignoring invalid batch transition");
        }
        Ok(progress.state)
    }
}

impl Pollable for Batch {
    fn label(&self) -> String {
        format!("batch {}", self.batchid())
    }

    fn report_path(&self) -> String {
        Batch::report_path(self)
    }

    fn target(&self) -> PollTarget<'_> {
        PollTarget::Batch(self)
    }

    fn state(&self) -> PollState {
        Batch::state(self)
    }

    fn apply(&self, document: &Value, entity: &[u8]) -> GradingResult<PollState> {
        let report = MultiJobStudentReport::from_document(document)?;
        self.apply_report(&report, document.clone(), entity.to_vec())
    }

    fn mark_exhausted(&self) {
        let mut progress = write(&self.inner.progress);
        if !progress.state.is_terminal() {
            progress.state = PollState::Exhausted;
        }
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let progress = read(&self.inner.progress);
        f.debug_struct("Batch")
            .field("batchid", &self.batchid())
            .field("state", &progress.state)
            .field("finishedjobs", &progress.finishedjobs)
            .field("totaljobs", &progress.totaljobs)
            .field("jobs", &self.inner.jobs)
            .finish()
    }
}
