//! Grading Service Protocol Types
//!
//! Defines the request/response envelopes exchanged with the grading
//! service and the typed shapes of its acceptance and report documents.
//!
//! Documents are handled as a generic tree (`serde_json::Value`) that
//! mirrors the service's XML: element attributes live under the `$` key,
//! child elements under their tag name, and the root element is `fw4ex`.

pub mod attr;
pub mod decode;
pub mod envelope;
pub mod error;
pub mod ops;
pub mod request;
pub mod response;

pub use decode::{EntityDecoder, JsonEntityDecoder};
pub use envelope::{Element, OneOrMany, ROOT_ELEMENT};
pub use error::EnvelopeError;
pub use request::{Endpoint, Method, ServiceRequest};
pub use response::ServiceResponse;

/// Media type of answer, batch and exercise uploads.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Media type of exercises-set descriptions.
pub const TEXT_PLAIN: &str = "text/plain";

/// Media type of acceptance and report documents.
pub const TEXT_XML: &str = "text/xml";
