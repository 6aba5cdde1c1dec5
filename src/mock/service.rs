//! Mock grading service implementation.

use std::io::Read;
use std::path::Component;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gradx_protocol::{ServiceRequest, ServiceResponse};
use serde_json::{json, Value};

use super::failure::{FailureConfig, FailureInjector, FailureMode, MockRoute};
use super::state::{BatchEntry, DeployedExercise, Grade, MockBatch, MockState, ReportContent};
use crate::handle::Exercise;
use crate::host::TransportError;

/// Configurable mock grading service. Clones share state.
#[derive(Clone, Default)]
pub struct MockGradingService {
    state: Arc<Mutex<MockState>>,
    failures: Arc<Mutex<FailureInjector>>,
    requests: Arc<Mutex<Vec<ServiceRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn document(value: Value) -> ServiceResponse {
    ServiceResponse::ok(value.to_string().into_bytes())
}

fn bad_request(message: impl Into<String>) -> ServiceResponse {
    ServiceResponse::with_status(400, message.into().into_bytes())
}

fn archived_now() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl MockGradingService {
    pub fn new() -> Self {
        Self::default()
    }

    // === Public API for test configuration ===

    /// Deploy an exercise graded by `grader`, returning a deployed reference.
    pub fn deploy<F>(&self, name: &str, safecookie: &str, grader: F) -> Exercise
    where
        F: Fn(&str, &[u8]) -> Grade + Send + Sync + 'static,
    {
        let mut state = lock(&self.state);
        state.exercises.insert(
            safecookie.to_string(),
            DeployedExercise {
                name: name.to_string(),
                grader: Arc::new(grader),
            },
        );
        Exercise::new(name).with_safecookie(safecookie)
    }

    /// Answer this many fetches of every newly published report with 404.
    pub fn set_report_delay(&self, fetches: u32) {
        lock(&self.state).report_delay = fetches;
    }

    pub fn set_personid(&self, personid: &str) {
        lock(&self.state).personid = personid.to_string();
    }

    pub fn inject_failure(&self, route: MockRoute, config: FailureConfig) {
        lock(&self.failures).inject(route, config);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ServiceRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of requests received on `route`.
    pub fn route_count(&self, route: MockRoute) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| MockRoute::classify(r) == Some(route))
            .count()
    }

    // === Request handling ===

    pub fn handle(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError> {
        lock(&self.requests).push(request.clone());

        let Some(route) = MockRoute::classify(request) else {
            return Ok(bad_request(format!("no route for {}", request.path)));
        };

        if let Some(failure) = lock(&self.failures).check(route) {
            return match failure {
                FailureMode::Status(status) => Ok(ServiceResponse::with_status(status, Vec::new())),
                FailureMode::Unreachable => Err(TransportError::ConnectionFailed(
                    "injected: connection refused".to_string(),
                )),
            };
        }

        let mut state = lock(&self.state);
        let response = match route {
            MockRoute::SubmitJob => self.submit_job(&mut state, request),
            MockRoute::SubmitBatch => self.submit_batch(&mut state, request),
            MockRoute::SubmitExercise => self.submit_exercise(&mut state, request),
            MockRoute::ExercisesSet => self.exercises_set(request),
            MockRoute::Report => match state.fetch(&request.path) {
                Some(report) => document(report),
                None => ServiceResponse::not_found(),
            },
        };
        Ok(response)
    }

    fn deployed(state: &MockState, request: &ServiceRequest) -> Option<DeployedExercise> {
        let cookie = request.path.strip_prefix("/exercise/")?.split('/').next()?;
        state.exercises.get(cookie).cloned()
    }

    fn submit_job(&self, state: &mut MockState, request: &ServiceRequest) -> ServiceResponse {
        let Some(exercise) = Self::deployed(state, request) else {
            return bad_request("unknown exercise");
        };
        let name = filename(request).unwrap_or_else(|| "file".to_string());
        let grade = (exercise.grader)(&name, &request.body);

        let jobid = state.next_id("J");
        let location = format!("/s/job/{}", jobid);
        let archived = archived_now();
        state.publish(
            format!("{}/{}.xml", location, jobid),
            ReportContent::Document(grade.job_report(&jobid, None, &archived)),
        );

        document(json!({"fw4ex": {"jobSubmittedReport": {
            "$": {"location": location},
            "person": {"$": {"personid": state.personid}},
            "exercise": {"$": {"exerciseid": exercise.name}},
            "job": {"$": {"jobid": jobid, "archived": archived}}
        }}}))
    }

    fn submit_batch(&self, state: &mut MockState, request: &ServiceRequest) -> ServiceResponse {
        let Some(exercise) = Self::deployed(state, request) else {
            return bad_request("unknown exercise");
        };
        let answers = match unpack(&request.body) {
            Ok(answers) if !answers.is_empty() => answers,
            Ok(_) => return bad_request("empty batch archive"),
            Err(e) => return bad_request(format!("invalid batch archive: {}", e)),
        };

        let batchid = state.next_id("B");
        let entries = answers
            .into_iter()
            .map(|(name, content)| BatchEntry {
                grade: (exercise.grader)(&name, &content),
                jobid: state.next_id("J"),
                name,
            })
            .collect();

        let location = format!("/s/batch/{}", batchid);
        state.publish(
            format!("{}/{}.xml", location, batchid),
            ReportContent::Batch(MockBatch {
                batchid: batchid.clone(),
                entries,
                fetches: 0,
            }),
        );

        document(json!({"fw4ex": {"multiJobSubmittedReport": {
            "$": {"location": location},
            "person": {"$": {"personid": state.personid}},
            "exercise": {"$": {"exerciseid": exercise.name}},
            "batch": {"$": {"batchid": batchid, "archived": archived_now(), "finishedjobs": "0"}}
        }}}))
    }

    fn submit_exercise(&self, state: &mut MockState, request: &ServiceRequest) -> ServiceResponse {
        let exerciseid = state.next_id("X");
        let location = format!("/e/{}", exerciseid);

        let report = if request.body.is_empty() {
            json!({"fw4ex": {"exerciseAuthorReport": {
                "$": {"exerciseid": exerciseid},
                "message": "empty exercise archive"
            }}})
        } else {
            let safecookie = state.next_id("cookie-");
            state.exercises.insert(
                safecookie.clone(),
                DeployedExercise {
                    name: exerciseid.clone(),
                    grader: Arc::new(|_: &str, _: &[u8]| Grade::mark(1.0)),
                },
            );

            let archived = archived_now();
            let mut pseudojobs = Vec::new();
            for (name, grade) in [
                ("perfect", Grade::out_of(100.0, 100.0)),
                ("half", Grade::out_of(45.0, 100.0)),
            ] {
                let jobid = state.next_id("P");
                let pseudo_location = format!("/s/pseudo/{}", jobid);
                state.publish(
                    format!("{}/{}.xml", pseudo_location, jobid),
                    ReportContent::Document(grade.job_report(&jobid, Some(name), &archived)),
                );
                pseudojobs.push(json!({"$": {"name": name, "jobid": jobid, "location": pseudo_location}}));
            }

            json!({"fw4ex": {"exerciseAuthorReport": {
                "$": {"exerciseid": exerciseid, "safecookie": safecookie},
                "pseudojobs": {"pseudojob": pseudojobs}
            }}})
        };
        state.publish(
            format!("{}/exerciseAuthorReport.xml", location),
            ReportContent::Document(report),
        );

        document(json!({"fw4ex": {"exerciseSubmittedReport": {
            "$": {"location": location},
            "person": {"$": {"personid": state.personid}},
            "exercise": {"$": {"exerciseid": exerciseid}}
        }}}))
    }

    fn exercises_set(&self, request: &ServiceRequest) -> ServiceResponse {
        let campaign = request
            .path
            .trim_start_matches("/exercisesset/yml2json/")
            .to_string();
        let description = String::from_utf8_lossy(&request.body);
        let lines: Vec<&str> = description.lines().filter(|l| !l.trim().is_empty()).collect();

        document(json!({
            "campaign": campaign,
            "description": lines
        }))
    }
}

/// File name from a `Content-Disposition: inline; filename=<name>` header.
fn filename(request: &ServiceRequest) -> Option<String> {
    let disposition = request.header("Content-Disposition")?;
    disposition
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .next()
}

/// Answers of a batch archive, keyed by the first path component with its
/// extension removed. Files under the same key are concatenated.
fn unpack(body: &[u8]) -> std::io::Result<Vec<(String, Vec<u8>)>> {
    let mut archive = tar::Archive::new(body);
    let mut answers: Vec<(String, Vec<u8>)> = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.into_owned();
        let Some(first) = path.components().find_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        }) else {
            continue;
        };
        let key = match first.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => first,
        };

        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        match answers.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.extend(content),
            None => answers.push((key, content)),
        }
    }
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradx_protocol::{Endpoint, Method};

    fn post(endpoint: Endpoint, path: &str, body: &[u8]) -> ServiceRequest {
        ServiceRequest {
            request_id: "req-test".to_string(),
            endpoint,
            method: Method::Post,
            path: path.to_string(),
            headers: vec![("Content-Disposition".to_string(), "inline; filename=min.c".to_string())],
            body: body.to_vec(),
        }
    }

    fn tar_of(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_job_submission_publishes_report() {
        let service = MockGradingService::new();
        service.deploy("min", "C1", |name, _| {
            assert_eq!(name, "min.c");
            Grade::mark(1.0)
        });

        let response = service.handle(&post(Endpoint::Acceptance, "/exercise/C1/job", b"x")).unwrap();
        assert_eq!(response.status, 200);
        let accepted: Value = serde_json::from_slice(&response.entity).unwrap();
        let report = &accepted["fw4ex"]["jobSubmittedReport"];
        let location = report["$"]["location"].as_str().unwrap();
        let jobid = report["job"]["$"]["jobid"].as_str().unwrap();
        assert_eq!(report["person"]["$"]["personid"], "45");

        let fetch = ServiceRequest::get("r", Endpoint::Storage, format!("{}/{}.xml", location, jobid));
        let response = service.handle(&fetch).unwrap();
        assert_eq!(response.status, 200);
    }

    #[test]
    fn test_unknown_cookie_is_rejected() {
        let service = MockGradingService::new();
        let response = service.handle(&post(Endpoint::Acceptance, "/exercise/nope/job", b"x")).unwrap();
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_unpack_keys() {
        let archive = tar_of(&[("one.c", "a"), ("two/main.c", "b"), ("two/util.c", "c")]);
        let answers = unpack(&archive).unwrap();

        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0], ("one".to_string(), b"a".to_vec()));
        assert_eq!(answers[1], ("two".to_string(), b"bc".to_vec()));
    }

    #[test]
    fn test_injected_unreachable() {
        let service = MockGradingService::new();
        service.inject_failure(MockRoute::Report, FailureConfig::unreachable().with_fail_count(1));

        let fetch = ServiceRequest::get("r", Endpoint::Storage, "/s/x/x.xml");
        assert!(service.handle(&fetch).is_err());
        assert_eq!(service.handle(&fetch).unwrap().status, 404);
        assert_eq!(service.route_count(MockRoute::Report), 2);
    }
}
