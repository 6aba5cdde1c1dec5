//! Upload request construction.

use gradx_protocol::{Endpoint, Method, ServiceRequest, OCTET_STREAM, TEXT_PLAIN, TEXT_XML};

use crate::artifact::Artifact;
use crate::error::{GradingError, GradingResult};
use crate::handle::Exercise;

/// What an upload is for; decides endpoint, path and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionKind {
    SingleAnswer { safecookie: String },
    Batch { safecookie: String },
    NewExercise,
    ExercisesSet { campaign: String },
}

impl SubmissionKind {
    /// Answer to a deployed exercise; fails before any I/O otherwise.
    pub fn single_answer(exercise: &Exercise) -> GradingResult<Self> {
        Ok(SubmissionKind::SingleAnswer {
            safecookie: deployed(exercise)?.to_string(),
        })
    }

    pub fn batch(exercise: &Exercise) -> GradingResult<Self> {
        Ok(SubmissionKind::Batch {
            safecookie: deployed(exercise)?.to_string(),
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            SubmissionKind::SingleAnswer { .. } | SubmissionKind::Batch { .. } => Endpoint::Acceptance,
            SubmissionKind::NewExercise => Endpoint::Exercise,
            SubmissionKind::ExercisesSet { .. } => Endpoint::Extra,
        }
    }

    pub fn path(&self) -> String {
        match self {
            SubmissionKind::SingleAnswer { safecookie } => format!("/exercise/{}/job", safecookie),
            SubmissionKind::Batch { safecookie } => format!("/exercise/{}/batch", safecookie),
            SubmissionKind::NewExercise => "/exercises/".to_string(),
            SubmissionKind::ExercisesSet { campaign } => format!("/exercisesset/yml2json/{}", campaign),
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            SubmissionKind::ExercisesSet { .. } => TEXT_PLAIN,
            _ => OCTET_STREAM,
        }
    }

    fn accept(&self) -> &'static str {
        match self {
            SubmissionKind::ExercisesSet { .. } => OCTET_STREAM,
            _ => TEXT_XML,
        }
    }
}

fn deployed(exercise: &Exercise) -> GradingResult<&str> {
    exercise.safecookie().ok_or_else(|| GradingError::NotDeployed {
        exercise: exercise.name().to_string(),
    })
}

/// Build the upload request for `artifact`.
pub fn encode(request_id: String, kind: &SubmissionKind, artifact: &Artifact) -> ServiceRequest {
    let mut body = artifact.bytes().to_vec();
    if matches!(kind, SubmissionKind::ExercisesSet { .. }) {
        body.push(b'\n');
    }

    let request = ServiceRequest {
        request_id,
        endpoint: kind.endpoint(),
        method: Method::Post,
        path: kind.path(),
        headers: Vec::new(),
        body,
    };
    let length = request.body.len();

    let request = request
        .with_header("Content-Type", kind.content_type())
        .with_header("Content-Disposition", format!("inline; filename={}", artifact.name()))
        .with_header("Accept", kind.accept())
        .with_header("Content-Length", length.to_string());

    tracing::debug!(
        request_id = %request.request_id,
        endpoint = %request.endpoint,
        path = %request.path,
        length,
        "encoded upload"
    );
    request
}
