//! Service request types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Endpoint family a request is addressed to.
///
/// The grading service is spread over several server families; a transport
/// maps each family to concrete base URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Answer and batch submission ("a" servers).
    Acceptance,
    /// Exercise submission ("e" servers). Requests are sent sequentially.
    Exercise,
    /// Auxiliary services such as exercises-set conversion ("x" servers).
    Extra,
    /// Static storage of reports ("s" servers).
    Storage,
}

impl Endpoint {
    /// One-letter server family name.
    pub fn letter(&self) -> char {
        match self {
            Endpoint::Acceptance => 'a',
            Endpoint::Exercise => 'e',
            Endpoint::Extra => 'x',
            Endpoint::Storage => 's',
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// HTTP method of a service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A request to the grading service.
///
/// Built fresh for every call and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Client-chosen identifier, unique per client instance.
    pub request_id: String,
    pub endpoint: Endpoint,
    pub method: Method,
    /// Absolute path on the endpoint, e.g. `/exercise/<cookie>/job`.
    pub path: String,
    /// Header name/value pairs in insertion order.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<u8>,
}

impl ServiceRequest {
    /// Status fetch against the storage endpoint.
    pub fn get(request_id: impl Into<String>, endpoint: Endpoint, path: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            endpoint,
            method: Method::Get,
            path: path.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Look up a header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = ServiceRequest::get("req-1", Endpoint::Storage, "/s/report.xml")
            .with_header("Accept", "text/xml");
        assert_eq!(request.header("accept"), Some("text/xml"));
        assert_eq!(request.header("Content-Length"), None);
        assert_eq!(request.method, Method::Get);
    }

    #[test]
    fn test_endpoint_letters() {
        assert_eq!(Endpoint::Acceptance.to_string(), "a");
        assert_eq!(Endpoint::Storage.letter(), 's');
    }
}
