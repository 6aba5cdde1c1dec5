//! Error types for envelope decoding.

use thiserror::Error;

/// Errors raised while interpreting a service document.
///
/// Any of these means the client and the service disagree on the document
/// contract; callers treat them as fatal, never as "not ready yet".
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The entity could not be decoded into a document tree.
    #[error("undecodable entity: {0}")]
    Undecodable(String),

    /// The `fw4ex` root element is absent.
    #[error("missing root element '{0}'")]
    MissingRoot(&'static str),

    /// None of the expected report elements is present under the root.
    #[error("expected one of [{expected}] under the root, found [{found}]")]
    UnexpectedElement { expected: String, found: String },

    /// An element did not match its expected shape.
    #[error("malformed '{element}': {message}")]
    Malformed { element: String, message: String },

    /// A required attribute is absent or empty.
    #[error("missing attribute '{attribute}' on '{element}'")]
    MissingAttribute { element: String, attribute: String },

    /// An attribute is present but cannot be interpreted.
    #[error("invalid attribute '{attribute}' = {value:?}: {reason}")]
    InvalidAttribute {
        attribute: String,
        value: String,
        reason: String,
    },
}

impl EnvelopeError {
    pub fn malformed(element: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Malformed {
            element: element.into(),
            message: source.to_string(),
        }
    }

    pub fn missing_attribute(element: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            element: element.into(),
            attribute: attribute.into(),
        }
    }
}

/// Result type for envelope decoding.
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;
