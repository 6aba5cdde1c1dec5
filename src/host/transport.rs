//! Transport layer
//!
//! Abstracts the HTTP exchange with the grading service for testability:
//! - `Transport` trait: executes one `ServiceRequest`
//! - `MockTransport`: in-process mock grading service for tests
//! - `HttpTransport`: reqwest client for production

use std::time::Duration;

use async_trait::async_trait;
use gradx_protocol::{Endpoint, Method, ServiceRequest, ServiceResponse};
use tokio::sync::Mutex;

use crate::mock::MockGradingService;

/// Executes requests against the grading service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request and return the response, whatever its status.
    async fn execute(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("No server configured for endpoint family '{0}'")]
    NoServer(Endpoint),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl TransportError {
    /// Whether a later attempt may succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionFailed(_) | TransportError::ConnectionTimeout
        )
    }
}

/// Mock transport for testing - connects directly to the mock service in-process
#[derive(Clone, Default)]
pub struct MockTransport {
    service: MockGradingService,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(service: MockGradingService) -> Self {
        Self { service }
    }

    /// The underlying mock service, for test configuration
    pub fn service(&self) -> &MockGradingService {
        &self.service
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError> {
        self.service.handle(request)
    }
}

/// Base URLs of each server family
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub acceptance: Vec<String>,
    pub exercise: Vec<String>,
    pub extra: Vec<String>,
    pub storage: Vec<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            acceptance: Vec::new(),
            exercise: Vec::new(),
            extra: Vec::new(),
            storage: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl EndpointConfig {
    pub fn servers(&self, endpoint: Endpoint) -> &[String] {
        match endpoint {
            Endpoint::Acceptance => &self.acceptance,
            Endpoint::Exercise => &self.exercise,
            Endpoint::Extra => &self.extra,
            Endpoint::Storage => &self.storage,
        }
    }
}

/// HTTP transport for production use
///
/// Servers of a family are tried in configuration order; the first one that
/// answers at all (whatever the status) wins. Exercise submissions are
/// serialized because the exercise servers process them one at a time.
pub struct HttpTransport {
    client: reqwest::Client,
    config: EndpointConfig,
    exercise_lane: Mutex<()>,
}

impl HttpTransport {
    pub fn new(config: EndpointConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self {
            client,
            config,
            exercise_lane: Mutex::new(()),
        })
    }

    async fn send_to(&self, base: &str, request: &ServiceRequest) -> Result<ServiceResponse, TransportError> {
        let url = format!("{}{}", base, request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            // reqwest computes the length from the body itself
            if name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.method == Method::Post {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let entity = response.bytes().await.map_err(classify)?.to_vec();

        Ok(ServiceResponse {
            status,
            headers,
            entity,
        })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::ConnectionTimeout
    } else if err.is_connect() {
        TransportError::ConnectionFailed(err.to_string())
    } else {
        TransportError::Http(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError> {
        let servers = self.config.servers(request.endpoint);
        if servers.is_empty() {
            return Err(TransportError::NoServer(request.endpoint));
        }

        let _lane = match request.endpoint {
            Endpoint::Exercise => Some(self.exercise_lane.lock().await),
            _ => None,
        };

        let mut last_error = TransportError::NoServer(request.endpoint);
        for base in servers {
            match self.send_to(base, request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => {
                    tracing::warn!(server = %base, request_id = %request.request_id, error = %e, "server unreachable");
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_unknown_report_is_not_found() {
        let transport = MockTransport::new();
        let request = ServiceRequest::get("req-1", Endpoint::Storage, "/s/none/none.xml");

        let response = transport.execute(&request).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(transport.service().request_count(), 1);
    }

    #[tokio::test]
    async fn test_http_transport_without_servers() {
        let transport = HttpTransport::new(EndpointConfig::default()).unwrap();
        let request = ServiceRequest::get("req-1", Endpoint::Storage, "/s/x.xml");

        let err = transport.execute(&request).await.unwrap_err();
        assert!(matches!(err, TransportError::NoServer(Endpoint::Storage)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::ConnectionTimeout.is_transient());
        assert!(TransportError::ConnectionFailed("refused".into()).is_transient());
        assert!(!TransportError::Http("bad header".into()).is_transient());
    }
}
