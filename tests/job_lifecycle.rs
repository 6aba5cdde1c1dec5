//! Single-answer lifecycle against the mock grading service.

use std::sync::Arc;
use std::time::Duration;

use gradx_client::mock::{FailureConfig, Grade, MockGradingService, MockRoute};
use gradx_client::{Exercise, GradingClient, GradingError, MockTransport, PollOptions, PollState};
use tempfile::TempDir;

fn setup() -> (MockGradingService, GradingClient, Exercise) {
    let service = MockGradingService::new();
    let exercise = service.deploy("min", "C00KIE", |_, content| {
        if String::from_utf8_lossy(content).contains("return") {
            Grade::mark(1.0)
        } else {
            Grade::mark(0.6)
        }
    });
    let transport = MockTransport::with_service(service.clone());
    (service, GradingClient::new(Arc::new(transport)), exercise)
}

fn fast() -> PollOptions {
    PollOptions::new().with_step(Duration::ZERO).with_attempts(5)
}

#[tokio::test]
async fn test_file_answer_gets_full_mark() {
    let (_service, client, exercise) = setup();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("min.c");
    std::fs::write(&path, "int min(int a, int b) { return a < b ? a : b; }\n").unwrap();

    let job = client.send_file_answer(&exercise, &path).await.unwrap();
    assert_eq!(job.state(), PollState::Pending);
    assert_eq!(job.content().unwrap().name(), "min.c");

    let graded = client.get_job_report(&job, &fast()).await.unwrap();
    assert!(graded.ptr_eq(&job));
    assert_eq!(job.state(), PollState::Final);
    assert_eq!(job.mark(), Some(1.0));
    assert_eq!(job.total_mark(), Some(1.0));
}

#[tokio::test]
async fn test_string_answer_gets_partial_mark() {
    let (service, client, exercise) = setup();
    service.set_personid("P42");

    let job = client.send_string_answer(&exercise, "int min;").await.unwrap();
    assert_eq!(job.personid(), Some("P42"));
    assert_eq!(job.content().unwrap().name(), "file");

    client.get_job_report(&job, &fast()).await.unwrap();
    assert_eq!(job.mark(), Some(0.6));
    assert_eq!(job.personid(), Some("P42"));
}

#[tokio::test]
async fn test_inline_file_name_is_sent() {
    let (service, client, exercise) = setup();
    let exercise = exercise.with_inline_file_name("answer.c");

    client.send_string_answer(&exercise, "x").await.unwrap();

    let requests = service.requests();
    assert_eq!(
        requests[0].header("Content-Disposition"),
        Some("inline; filename=answer.c")
    );
}

#[tokio::test]
async fn test_delayed_report_is_retried() {
    let (service, client, exercise) = setup();
    service.set_report_delay(2);

    let job = client.send_string_answer(&exercise, "return 0;").await.unwrap();
    client.get_job_report(&job, &fast()).await.unwrap();

    assert_eq!(job.mark(), Some(1.0));
    assert_eq!(service.route_count(MockRoute::Report), 3);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let (service, client, exercise) = setup();
    service.inject_failure(
        MockRoute::Report,
        FailureConfig::unreachable().with_fail_count(2),
    );
    let job = client.send_string_answer(&exercise, "return 0;").await.unwrap();

    client.get_job_report(&job, &fast()).await.unwrap();

    assert_eq!(job.mark(), Some(1.0));
    assert_eq!(service.route_count(MockRoute::Report), 3);
}

#[tokio::test]
async fn test_final_job_is_not_polled_again() {
    let (service, client, exercise) = setup();
    let job = client.send_string_answer(&exercise, "return 0;").await.unwrap();
    client.get_job_report(&job, &fast()).await.unwrap();
    let fetches = service.route_count(MockRoute::Report);

    client.get_job_report(&job, &fast()).await.unwrap();
    assert_eq!(service.route_count(MockRoute::Report), fetches);
}

#[tokio::test]
async fn test_undeployed_exercise_sends_nothing() {
    let (service, client, _) = setup();

    let err = client
        .send_string_answer(&Exercise::new("min"), "return 0;")
        .await
        .unwrap_err();

    assert!(matches!(err, GradingError::NotDeployed { ref exercise } if exercise == "min"));
    assert_eq!(err.to_string(), "Non deployed exercise min");
    assert_eq!(service.request_count(), 0);
}

#[tokio::test]
async fn test_missing_file_is_read_error() {
    let (service, client, exercise) = setup();

    let err = client
        .send_file_answer(&exercise, "/nonexistent/min.c")
        .await
        .unwrap_err();

    assert!(matches!(err, GradingError::Read { .. }));
    assert_eq!(service.request_count(), 0);
}

#[tokio::test]
async fn test_rejected_submission_is_protocol_error() {
    let (service, client, exercise) = setup();
    service.inject_failure(MockRoute::SubmitJob, FailureConfig::status(500));

    let err = client.send_string_answer(&exercise, "x").await.unwrap_err();
    assert!(matches!(err, GradingError::Protocol(ref m) if m.contains("500")));
    assert_eq!(service.request_count(), 1, "uploads are never retried");
}

#[tokio::test]
async fn test_problem_report_is_remote_failure() {
    let service = MockGradingService::new();
    let exercise = service.deploy("min", "C2", |_, _| Grade::problem("compilation failed"));
    let client = GradingClient::new(Arc::new(MockTransport::with_service(service)));

    let job = client.send_string_answer(&exercise, "x").await.unwrap();
    let err = client.get_job_report(&job, &fast()).await.unwrap_err();

    match err {
        GradingError::RemoteFailure { jobid, message } => {
            assert_eq!(jobid, job.jobid());
            assert!(message.contains("compilation failed"));
        }
        other => panic!("expected RemoteFailure, got {:?}", other),
    }
    assert_eq!(job.state(), PollState::Failed);
    assert_eq!(job.mark(), None);
}
