//! Turns the service's immediate answer into a tracking handle.
//!
//! Required identifiers must be present and non-empty; anything else is a
//! contract mismatch and is never retried.

use gradx_protocol::attr;
use gradx_protocol::ops::Accepted;

use crate::artifact::Artifact;
use crate::error::{GradingError, GradingResult};
use crate::handle::{
    Acceptance, Batch, BatchIdentity, Exercise, ExerciseSubmission, ExercisesSet, Job, JobIdentity,
    SubmissionIdentity,
};

fn unexpected(expected: &str, found: &Accepted) -> GradingError {
    GradingError::Protocol(format!("expected {}, got {}", expected, found.element()))
}

fn required(element: &str, attribute: &str, value: &str) -> GradingResult<String> {
    Ok(attr::non_empty(element, attribute, value)?.to_string())
}

/// Acceptance of a single answer.
pub fn parse_job(exercise: &Exercise, content: Artifact, acceptance: Acceptance) -> GradingResult<Job> {
    let report = match Accepted::from_document(&acceptance.document)? {
        Accepted::Job(report) => report,
        other => return Err(unexpected(Accepted::JOB, &other)),
    };

    let identity = JobIdentity {
        jobid: required("job", "jobid", &report.job.attrs.jobid)?,
        pathdir: required(Accepted::JOB, "location", &report.attrs.location)?,
        name: None,
        exercise: Some(exercise.clone()),
        exercise_uuid: Some(required("exercise", "exerciseid", &report.exercise.attrs.exerciseid)?),
        personid: Some(required("person", "personid", &report.person.attrs.personid)?),
        archived: Some(attr::parse_timestamp(
            "archived",
            &required("job", "archived", &report.job.attrs.archived)?,
        )?),
    };

    tracing::info!(jobid = %identity.jobid, personid = ?identity.personid, "answer accepted");
    Ok(Job::new(identity, Some(content), Some(acceptance)))
}

/// Acceptance of a batch; the batch starts with no finished job.
pub fn parse_batch(exercise: &Exercise, content: Artifact, acceptance: Acceptance) -> GradingResult<Batch> {
    let report = match Accepted::from_document(&acceptance.document)? {
        Accepted::Batch(report) => report,
        other => return Err(unexpected(Accepted::BATCH, &other)),
    };

    let identity = BatchIdentity {
        batchid: required("batch", "batchid", &report.batch.attrs.batchid)?,
        pathdir: required(Accepted::BATCH, "location", &report.attrs.location)?,
        exercise: exercise.clone(),
        exercise_uuid: required("exercise", "exerciseid", &report.exercise.attrs.exerciseid)?,
        personid: required("person", "personid", &report.person.attrs.personid)?,
        archived: Some(attr::parse_timestamp(
            "archived",
            &required("batch", "archived", &report.batch.attrs.archived)?,
        )?),
    };

    tracing::info!(batchid = %identity.batchid, personid = %identity.personid, "batch accepted");
    Ok(Batch::new(identity, Some(content), acceptance))
}

/// Acceptance of a new exercise.
pub fn parse_exercise(content: Artifact, acceptance: Acceptance) -> GradingResult<ExerciseSubmission> {
    let report = match Accepted::from_document(&acceptance.document)? {
        Accepted::Exercise(report) => report,
        other => return Err(unexpected(Accepted::EXERCISE, &other)),
    };

    let identity = SubmissionIdentity {
        location: required(Accepted::EXERCISE, "location", &report.attrs.location)?,
        personid: required("person", "personid", &report.person.attrs.personid)?,
        exerciseid: required("exercise", "exerciseid", &report.exercise.attrs.exerciseid)?,
    };

    tracing::info!(exerciseid = %identity.exerciseid, "exercise accepted");
    Ok(ExerciseSubmission::new(identity, Some(content), acceptance))
}

/// Any decoded document is a valid exercises-set description.
pub fn parse_exercises_set(campaign: &str, acceptance: Acceptance) -> ExercisesSet {
    ExercisesSet {
        campaign: campaign.to_string(),
        document: acceptance.document,
    }
}
