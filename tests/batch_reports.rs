//! Batch submission and progressive batch reports.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gradx_client::mock::{FailureConfig, Grade, MockGradingService, MockRoute};
use gradx_client::{GradingClient, GradingError, MockTransport, PollOptions, PollState, PollTarget};
use tempfile::TempDir;

fn setup() -> (MockGradingService, GradingClient, gradx_client::Exercise) {
    let service = MockGradingService::new();
    let exercise = service.deploy("min", "C00KIE", |name, _| match name {
        "carol" => Grade::problem("no main"),
        "bob" => Grade::mark(0.6),
        _ => Grade::mark(1.0),
    });
    let transport = MockTransport::with_service(service.clone());
    (service, GradingClient::new(Arc::new(transport)), exercise)
}

fn archive(dir: &TempDir, files: &[(&str, &str)]) -> PathBuf {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_bytes()).unwrap();
    }
    let path = dir.path().join("answers.tgz");
    std::fs::write(&path, builder.into_inner().unwrap()).unwrap();
    path
}

fn three_students(dir: &TempDir) -> PathBuf {
    archive(
        dir,
        &[("alice/min.c", "return a;"), ("bob.c", "int x;"), ("carol/min.c", "oops")],
    )
}

fn fast() -> PollOptions {
    PollOptions::new().with_step(Duration::ZERO)
}

#[tokio::test]
async fn test_batch_report_returns_once_a_job_is_known() {
    let (service, client, exercise) = setup();
    let dir = TempDir::new().unwrap();

    let batch = client.send_batch(&exercise, three_students(&dir)).await.unwrap();
    assert_eq!(batch.finishedjobs(), 0);
    assert!(batch.jobs().is_empty());

    let partial = client.get_batch_report(&batch, &fast()).await.unwrap();
    assert!(partial.ptr_eq(&batch));
    assert_eq!(service.route_count(MockRoute::Report), 1);
    assert_eq!(batch.state(), PollState::Partial);
    assert_eq!(batch.totaljobs(), Some(3));
    assert_eq!(batch.jobs().keys(), vec!["alice".to_string()]);
}

#[tokio::test]
async fn test_final_batch_report_grades_every_job() {
    let (_service, client, exercise) = setup();
    let dir = TempDir::new().unwrap();
    let batch = client.send_batch(&exercise, three_students(&dir)).await.unwrap();

    client.get_final_batch_report(&batch, &fast()).await.unwrap();

    assert_eq!(batch.state(), PollState::Final);
    assert!(batch.is_complete());
    assert_eq!(batch.finishedjobs(), 3);
    assert_eq!(batch.seen(), 3);
    assert_eq!(batch.job("alice").unwrap().mark(), Some(1.0));
    assert_eq!(batch.job("bob").unwrap().mark(), Some(0.6));

    let carol = batch.job("carol").unwrap();
    assert_eq!(carol.state(), PollState::Failed);
    assert_eq!(carol.problem().as_deref(), Some("no main"));
    assert_eq!(carol.personid(), Some("45"));
}

#[tokio::test]
async fn test_sub_job_identity_is_stable() {
    let (_service, client, exercise) = setup();
    let dir = TempDir::new().unwrap();
    let batch = client.send_batch(&exercise, three_students(&dir)).await.unwrap();

    client.get_batch_report(&batch, &fast()).await.unwrap();
    let alice = batch.job("alice").unwrap();
    assert_eq!(alice.mark(), None);

    client.get_final_batch_report(&batch, &fast()).await.unwrap();
    let again = batch.job("alice").unwrap();
    assert!(again.ptr_eq(&alice));
    assert_eq!(alice.mark(), Some(1.0), "earlier clones see later reports");
}

#[tokio::test]
async fn test_finishedjobs_never_decreases() {
    let (_service, client, exercise) = setup();
    let dir = TempDir::new().unwrap();
    let batch = client.send_batch(&exercise, three_students(&dir)).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let options = fast().with_progress(move |_, target| {
        if let PollTarget::Batch(batch) = target {
            record.lock().unwrap().push(batch.finishedjobs());
        }
    });
    client.get_final_batch_report(&batch, &options).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_complete_batch_is_not_polled_again() {
    let (service, client, exercise) = setup();
    let dir = TempDir::new().unwrap();
    let batch = client.send_batch(&exercise, three_students(&dir)).await.unwrap();
    client.get_final_batch_report(&batch, &fast()).await.unwrap();
    let fetches = service.route_count(MockRoute::Report);

    client.get_batch_report(&batch, &fast()).await.unwrap();
    client.get_final_batch_report(&batch, &fast()).await.unwrap();
    assert_eq!(service.route_count(MockRoute::Report), fetches);
}

#[tokio::test]
async fn test_final_batch_uses_retry_budget() {
    let (_service, client, exercise) = setup();
    let dir = TempDir::new().unwrap();
    let batch = client.send_batch(&exercise, three_students(&dir)).await.unwrap();

    let options = fast().with_attempts(1).with_retry(2);
    let err = client.get_final_batch_report(&batch, &options).await.unwrap_err();

    assert!(matches!(err, GradingError::Timeout { attempts: 2 }));
    assert_eq!(batch.state(), PollState::Exhausted);
    assert_eq!(batch.finishedjobs(), 1);

    client.get_final_batch_report(&batch, &fast().with_retry(5)).await.unwrap();
    assert_eq!(batch.state(), PollState::Final);
}

#[tokio::test]
async fn test_empty_archive_is_rejected() {
    let (_service, client, exercise) = setup();
    let dir = TempDir::new().unwrap();
    let path = archive(&dir, &[]);

    let err = client.send_batch(&exercise, path).await.unwrap_err();
    assert!(matches!(err, GradingError::Protocol(ref m) if m.contains("400")));
}

#[tokio::test]
async fn test_rejected_report_fetch_stops_the_poll() {
    let (service, client, exercise) = setup();
    let dir = TempDir::new().unwrap();
    let batch = client.send_batch(&exercise, three_students(&dir)).await.unwrap();
    service.inject_failure(MockRoute::Report, FailureConfig::status(410));

    let err = client.get_final_batch_report(&batch, &fast()).await.unwrap_err();
    assert!(matches!(err, GradingError::Protocol(_)));
    assert_eq!(service.route_count(MockRoute::Report), 1);
}

#[tokio::test]
async fn test_final_batch_poll_reveals_partial_reports() {
    let (_service, client, exercise) = setup();
    let dir = TempDir::new().unwrap();
    let batch = client.send_batch(&exercise, three_students(&dir)).await.unwrap();

    let partials = Arc::new(Mutex::new(Vec::new()));
    let record = partials.clone();
    let options = fast().with_progress(move |_, target| {
        if let PollTarget::Batch(batch) = target {
            record
                .lock()
                .unwrap()
                .push((batch.finishedjobs(), batch.seen(), batch.is_complete()));
        }
    });
    client.get_final_batch_report(&batch, &options).await.unwrap();

    assert_eq!(
        *partials.lock().unwrap(),
        vec![(0, 1, false), (1, 2, false), (2, 3, false), (3, 3, true)]
    );
}
