//! Entity decoding.
//!
//! The service answers with XML; turning XML into a document tree is left to
//! an `EntityDecoder` implementation. The bundled decoder accepts the tree
//! already serialized as JSON.

use serde_json::Value;

use crate::error::{EnvelopeError, EnvelopeResult};

/// Converts a raw response entity into a document tree.
pub trait EntityDecoder: Send + Sync {
    fn decode(&self, entity: &[u8]) -> EnvelopeResult<Value>;
}

/// Decoder for entities that carry the document tree as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEntityDecoder;

impl EntityDecoder for JsonEntityDecoder {
    fn decode(&self, entity: &[u8]) -> EnvelopeResult<Value> {
        if entity.iter().all(u8::is_ascii_whitespace) {
            return Err(EnvelopeError::Undecodable("empty entity".to_string()));
        }
        serde_json::from_slice(entity).map_err(|e| EnvelopeError::Undecodable(e.to_string()))
    }
}
