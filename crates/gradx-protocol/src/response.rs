//! Service response types.

use serde::{Deserialize, Serialize};

/// A response from the grading service, as handed back by a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse {
    /// HTTP status code.
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Raw response entity.
    #[serde(default)]
    pub entity: Vec<u8>,
}

impl ServiceResponse {
    /// A 200 response carrying `entity`.
    pub fn ok(entity: impl Into<Vec<u8>>) -> Self {
        Self::with_status(200, entity)
    }

    /// A 404 response: the requested report does not exist yet.
    pub fn not_found() -> Self {
        Self::with_status(404, Vec::new())
    }

    pub fn with_status(status: u16, entity: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            entity: entity.into(),
        }
    }

    /// Whether an upload was taken in. Unlike report fetches, an upload
    /// answered with 202 is accepted.
    pub fn is_accepted(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && self.status != 202
    }

    /// Whether the status means "come back later" for a report fetch.
    ///
    /// Reports are static files written once grading ends, so a missing file
    /// (404), an accepted-but-pending marker (202) and server-side trouble
    /// (5xx) all leave the report possibly available on a later attempt.
    pub fn is_not_ready(&self) -> bool {
        matches!(self.status, 202 | 404) || (500..600).contains(&self.status)
    }

    /// Entity as (lossy) UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.entity).into_owned()
    }
}
