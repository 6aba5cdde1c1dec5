//! Failure injection for the mock service.

use std::collections::HashMap;

use gradx_protocol::{Endpoint, Method, ServiceRequest};

/// Route of a request to the mock service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockRoute {
    SubmitJob,
    SubmitBatch,
    SubmitExercise,
    ExercisesSet,
    Report,
}

impl MockRoute {
    pub fn classify(request: &ServiceRequest) -> Option<Self> {
        match (request.method, request.endpoint) {
            (Method::Get, Endpoint::Storage) => Some(MockRoute::Report),
            (Method::Post, Endpoint::Acceptance) if request.path.starts_with("/exercise/") => {
                if request.path.ends_with("/job") {
                    Some(MockRoute::SubmitJob)
                } else if request.path.ends_with("/batch") {
                    Some(MockRoute::SubmitBatch)
                } else {
                    None
                }
            }
            (Method::Post, Endpoint::Exercise) if request.path == "/exercises/" => {
                Some(MockRoute::SubmitExercise)
            }
            (Method::Post, Endpoint::Extra) if request.path.starts_with("/exercisesset/yml2json/") => {
                Some(MockRoute::ExercisesSet)
            }
            _ => None,
        }
    }
}

/// How an injected failure manifests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureMode {
    /// Answer with this HTTP status and an empty entity
    Status(u16),
    /// Fail at the connection level
    Unreachable,
}

#[derive(Debug, Clone)]
pub struct FailureConfig {
    pub mode: FailureMode,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    pub fn status(status: u16) -> Self {
        Self {
            mode: FailureMode::Status(status),
            fail_count: None,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            mode: FailureMode::Unreachable,
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<MockRoute, FailureConfig>,
    call_counts: HashMap<MockRoute, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, route: MockRoute, config: FailureConfig) {
        self.configs.insert(route, config);
        self.call_counts.insert(route, 0);
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// The failure to apply to this call, if any.
    pub fn check(&mut self, route: MockRoute) -> Option<FailureMode> {
        let config = self.configs.get(&route)?;
        let count = self.call_counts.entry(route).or_insert(0);
        *count += 1;

        match config.fail_count {
            Some(limit) if *count > limit => None,
            _ => Some(config.mode.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_classification() {
        let job = ServiceRequest::get("r", Endpoint::Acceptance, "/exercise/C1/job");
        assert_eq!(MockRoute::classify(&job), None, "GET is not a submission");

        let mut post = job.clone();
        post.method = Method::Post;
        assert_eq!(MockRoute::classify(&post), Some(MockRoute::SubmitJob));

        post.path = "/exercise/C1/batch".to_string();
        assert_eq!(MockRoute::classify(&post), Some(MockRoute::SubmitBatch));

        let report = ServiceRequest::get("r", Endpoint::Storage, "/s/x/x.xml");
        assert_eq!(MockRoute::classify(&report), Some(MockRoute::Report));
    }

    #[test]
    fn test_fail_count() {
        let mut injector = FailureInjector::new();
        injector.inject(MockRoute::Report, FailureConfig::status(503).with_fail_count(2));

        assert_eq!(injector.check(MockRoute::Report), Some(FailureMode::Status(503)));
        assert_eq!(injector.check(MockRoute::Report), Some(FailureMode::Status(503)));
        assert_eq!(injector.check(MockRoute::Report), None);
        assert_eq!(injector.check(MockRoute::SubmitJob), None);
    }

    #[test]
    fn test_clear() {
        let mut injector = FailureInjector::new();
        injector.inject(MockRoute::SubmitJob, FailureConfig::unreachable());
        assert!(injector.check(MockRoute::SubmitJob).is_some());

        injector.clear();
        assert!(injector.check(MockRoute::SubmitJob).is_none());
    }
}
