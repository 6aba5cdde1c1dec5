//! Grading client
//!
//! Submits work to the grading service and polls for the reports it
//! produces. Uploads are never retried (they are not idempotent); report
//! fetches are retried within the poll budget.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gradx_protocol::{EntityDecoder, Endpoint, JsonEntityDecoder, ServiceRequest, TEXT_XML};
use serde_json::Value;

use super::transport::Transport;
use crate::artifact::{Artifact, ContentLoader};
use crate::error::{GradingError, GradingResult};
use crate::handle::{begin_poll, Acceptance, Batch, Exercise, ExerciseSubmission, ExercisesSet, Job};
use crate::poll::{self, PollDefaults, PollOptions, PollState};
use crate::submit::{acceptance, encode, SubmissionKind};

pub struct GradingClient {
    transport: Arc<dyn Transport>,
    decoder: Arc<dyn EntityDecoder>,
    defaults: PollDefaults,
    request_counter: AtomicU64,
}

impl GradingClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_defaults(transport, PollDefaults::default())
    }

    pub fn with_defaults(transport: Arc<dyn Transport>, defaults: PollDefaults) -> Self {
        Self {
            transport,
            decoder: Arc::new(JsonEntityDecoder),
            defaults,
            request_counter: AtomicU64::new(0),
        }
    }

    /// Replace the entity decoder (JSON by default).
    pub fn with_decoder(mut self, decoder: Arc<dyn EntityDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn defaults(&self) -> &PollDefaults {
        &self.defaults
    }

    fn next_request_id(&self) -> String {
        let counter = self.request_counter.fetch_add(1, Ordering::SeqCst);
        let timestamp = chrono::Utc::now().timestamp_millis();
        format!("req-{:x}-{:08x}", timestamp, counter)
    }

    pub(crate) fn decode(&self, entity: &[u8]) -> GradingResult<Value> {
        let document = self.decoder.decode(entity)?;
        tracing::trace!(?document, "decoded entity");
        Ok(document)
    }

    /// POST an upload and decode the acceptance.
    async fn upload(&self, kind: &SubmissionKind, artifact: &Artifact) -> GradingResult<Acceptance> {
        let request = encode(self.next_request_id(), kind, artifact);
        let response = self.transport.execute(&request).await?;

        if !response.is_accepted() {
            return Err(GradingError::Protocol(format!(
                "{} {} rejected with status {}: {}",
                request.method.as_str(),
                request.path,
                response.status,
                response.text().trim()
            )));
        }

        let document = self.decode(&response.entity)?;
        tracing::debug!(request_id = %request.request_id, status = response.status, "upload accepted");
        Ok(Acceptance {
            entity: response.entity,
            document,
        })
    }

    /// Fetch a report; `None` means "not ready yet".
    pub(crate) async fn fetch_report(&self, path: &str) -> GradingResult<Option<Vec<u8>>> {
        let request = ServiceRequest::get(self.next_request_id(), Endpoint::Storage, path)
            .with_header("Accept", TEXT_XML);

        match self.transport.execute(&request).await {
            Ok(response) if response.is_success() => Ok(Some(response.entity)),
            Ok(response) if response.is_not_ready() => {
                tracing::debug!(path, status = response.status, "report not available");
                Ok(None)
            }
            Ok(response) => Err(GradingError::Protocol(format!(
                "GET {} rejected with status {}",
                path, response.status
            ))),
            Err(e) if e.is_transient() => {
                tracing::warn!(path, error = %e, "transient failure fetching report");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    // === Submissions ===

    /// Submit the file at `path` as an answer to `exercise`.
    ///
    /// The exercise must be deployed; otherwise nothing is read or sent.
    pub async fn send_file_answer(&self, exercise: &Exercise, path: impl AsRef<Path>) -> GradingResult<Job> {
        let kind = SubmissionKind::single_answer(exercise)?;
        let artifact = ContentLoader::load(path).await?;
        self.send_answer(exercise, &kind, artifact).await
    }

    /// Submit an in-memory answer under the exercise's inline file name.
    pub async fn send_string_answer(&self, exercise: &Exercise, text: &str) -> GradingResult<Job> {
        let kind = SubmissionKind::single_answer(exercise)?;
        let artifact = Artifact::from_string(exercise.inline_file_name(), text);
        self.send_answer(exercise, &kind, artifact).await
    }

    async fn send_answer(&self, exercise: &Exercise, kind: &SubmissionKind, artifact: Artifact) -> GradingResult<Job> {
        let accepted = self.upload(kind, &artifact).await?;
        acceptance::parse_job(exercise, artifact, accepted)
    }

    /// Submit an archive of student answers to `exercise`.
    pub async fn send_batch(&self, exercise: &Exercise, path: impl AsRef<Path>) -> GradingResult<Batch> {
        let kind = SubmissionKind::batch(exercise)?;
        let artifact = ContentLoader::load(path).await?;
        let accepted = self.upload(&kind, &artifact).await?;
        acceptance::parse_batch(exercise, artifact, accepted)
    }

    /// Submit a new exercise archive.
    pub async fn submit_new_exercise(&self, path: impl AsRef<Path>) -> GradingResult<ExerciseSubmission> {
        let artifact = ContentLoader::load(path).await?;
        let accepted = self.upload(&SubmissionKind::NewExercise, &artifact).await?;
        acceptance::parse_exercise(artifact, accepted)
    }

    /// Upload an exercises-set description for `campaign`.
    pub async fn upload_exercises_set(&self, campaign: &str, path: impl AsRef<Path>) -> GradingResult<ExercisesSet> {
        let artifact = ContentLoader::load(path).await?;
        let kind = SubmissionKind::ExercisesSet {
            campaign: campaign.to_string(),
        };
        let accepted = self.upload(&kind, &artifact).await?;
        Ok(acceptance::parse_exercises_set(campaign, accepted))
    }

    // === Reports ===

    /// Poll until the job's report is final.
    ///
    /// A job already final returns at once. A problem report yields
    /// `RemoteFailure`; the job keeps the problem description.
    pub async fn get_job_report(&self, job: &Job, options: &PollOptions) -> GradingResult<Job> {
        let _guard = begin_poll(job.poll_guard(), || format!("job {}", job.jobid()))?;

        if !job.state().is_terminal() {
            poll::poll(
                self,
                job,
                options.attempts_or(&self.defaults),
                options.step_or(&self.defaults),
                options.observer.as_deref(),
                |j: &Job| j.state().is_terminal(),
            )
            .await?;
        }

        if job.state() == PollState::Failed {
            return Err(GradingError::RemoteFailure {
                jobid: job.jobid().to_string(),
                message: job.problem().unwrap_or_default(),
            });
        }
        Ok(job.clone())
    }

    /// Poll until at least one sub-job report is known, or the batch is
    /// complete.
    pub async fn get_batch_report(&self, batch: &Batch, options: &PollOptions) -> GradingResult<Batch> {
        let _guard = begin_poll(batch.poll_guard(), || format!("batch {}", batch.batchid()))?;

        if !batch.is_complete() {
            poll::poll(
                self,
                batch,
                options.attempts_or(&self.defaults),
                options.step_or(&self.defaults),
                options.observer.as_deref(),
                |b: &Batch| !b.jobs().is_empty() || b.is_complete(),
            )
            .await?;
        }
        Ok(batch.clone())
    }

    /// Poll until every job of the batch is finished.
    pub async fn get_final_batch_report(&self, batch: &Batch, options: &PollOptions) -> GradingResult<Batch> {
        let _guard = begin_poll(batch.poll_guard(), || format!("batch {}", batch.batchid()))?;

        if !batch.is_complete() {
            poll::poll(
                self,
                batch,
                options.retry_or(&self.defaults),
                options.step_or(&self.defaults),
                options.observer.as_deref(),
                |b: &Batch| b.is_complete(),
            )
            .await?;
        }
        Ok(batch.clone())
    }

    /// Poll until the exercise's author report is available.
    ///
    /// An exercise the service refused to deploy yields `RemoteFailure`.
    pub async fn get_exercise_report(
        &self,
        submission: &ExerciseSubmission,
        options: &PollOptions,
    ) -> GradingResult<ExerciseSubmission> {
        let _guard = begin_poll(submission.poll_guard(), || {
            format!("exercise {}", submission.exerciseid())
        })?;

        if !submission.state().is_terminal() {
            poll::poll(
                self,
                submission,
                options.attempts_or(&self.defaults),
                options.step_or(&self.defaults),
                options.observer.as_deref(),
                |s: &ExerciseSubmission| s.state().is_terminal(),
            )
            .await?;
        }

        if submission.state() == PollState::Failed {
            let outcome = submission.outcome();
            return Err(GradingError::RemoteFailure {
                jobid: submission.exerciseid().to_string(),
                message: outcome
                    .message
                    .unwrap_or_else(|| "exercise was not deployed".to_string()),
            });
        }
        Ok(submission.clone())
    }

    /// Poll every pseudo-job of a deployed exercise until its report is final.
    ///
    /// A pseudo-job graded with a problem keeps its `Failed` state and does
    /// not stop the others; any other error is returned.
    pub async fn get_pseudojob_reports(
        &self,
        submission: &ExerciseSubmission,
        options: &PollOptions,
    ) -> GradingResult<ExerciseSubmission> {
        for (name, job) in submission.pseudojobs().snapshot() {
            match self.get_job_report(&job, options).await {
                Ok(_) => {}
                Err(GradingError::RemoteFailure { message, .. }) => {
                    tracing::warn!(pseudojob = %name, %message, "pseudo-job not graded");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(submission.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::BatchIdentity;
    use crate::host::transport::MockTransport;
    use crate::host::TransportError;
    use async_trait::async_trait;
    use gradx_protocol::ServiceResponse;
    use serde_json::json;

    /// Answers every request with the same response.
    struct FixedTransport(ServiceResponse);

    #[async_trait]
    impl Transport for FixedTransport {
        async fn execute(&self, _request: &ServiceRequest) -> Result<ServiceResponse, TransportError> {
            Ok(self.0.clone())
        }
    }

    fn fixed(status: u16, document: Value) -> GradingClient {
        let response = ServiceResponse::with_status(status, document.to_string().into_bytes());
        GradingClient::new(Arc::new(FixedTransport(response)))
    }

    #[test]
    fn test_request_id_generation() {
        let client = GradingClient::new(Arc::new(MockTransport::new()));

        let id1 = client.next_request_id();
        let id2 = client.next_request_id();

        assert_ne!(id1, id2);
        assert!(id1.starts_with("req-"));
        assert!(id2.ends_with("00000001"));
    }

    #[tokio::test]
    async fn test_undeployed_exercise_sends_nothing() {
        let transport = MockTransport::new();
        let client = GradingClient::new(Arc::new(transport.clone()));

        let err = client
            .send_file_answer(&Exercise::new("min"), "/nonexistent/min.c")
            .await
            .unwrap_err();

        assert!(matches!(err, GradingError::NotDeployed { .. }));
        assert_eq!(transport.service().request_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_report_fetch_is_fatal() {
        use crate::mock::{FailureConfig, MockRoute};

        let transport = MockTransport::new();
        transport
            .service()
            .inject_failure(MockRoute::Report, FailureConfig::status(403));
        let client = GradingClient::new(Arc::new(transport));

        let err = client.fetch_report("/s/job/J1/J1.xml").await.unwrap_err();
        assert!(matches!(err, GradingError::Protocol(ref m) if m.contains("403")));
    }

    #[tokio::test]
    async fn test_upload_accepted_with_202() {
        let client = fixed(
            202,
            json!({"fw4ex": {"jobSubmittedReport": {
                "$": {"location": "/s/job/J1"},
                "person": {"$": {"personid": "45"}},
                "exercise": {"$": {"exerciseid": "ex-1"}},
                "job": {"$": {"jobid": "J1", "archived": "2018-11-20 19:12:06"}}
            }}}),
        );
        let exercise = Exercise::new("min").with_safecookie("C1");

        let job = client.send_string_answer(&exercise, "x").await.unwrap();
        assert_eq!(job.jobid(), "J1");
    }

    #[tokio::test]
    async fn test_empty_batch_completes_batch_report() {
        let client = fixed(
            200,
            json!({"fw4ex": {"multiJobStudentReport": {"$": {"batchid": "B1", "totaljobs": "0"}}}}),
        );
        let batch = Batch::new(
            BatchIdentity {
                batchid: "B1".to_string(),
                pathdir: "/s/batch/B1".to_string(),
                exercise: Exercise::new("min").with_safecookie("C1"),
                exercise_uuid: "ex-1".to_string(),
                personid: "45".to_string(),
                archived: None,
            },
            None,
            Acceptance {
                entity: Vec::new(),
                document: Value::Null,
            },
        );

        let options = PollOptions::new().with_step(std::time::Duration::ZERO).with_attempts(3);
        client.get_batch_report(&batch, &options).await.unwrap();
        assert!(batch.is_complete());
        assert!(batch.jobs().is_empty());
    }
}
