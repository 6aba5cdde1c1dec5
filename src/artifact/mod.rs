//! Content loading
//!
//! An [`Artifact`] is the byte payload of a submission together with the
//! display name the service will see. Only the final path segment is ever
//! exposed, never the local directory layout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{GradingError, GradingResult};

/// Immutable payload of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    name: String,
    bytes: Arc<[u8]>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    /// Artifact for an answer typed in rather than read from a file.
    pub fn from_string(name: impl Into<String>, text: &str) -> Self {
        Self::new(name, text.as_bytes().to_vec())
    }

    /// Display name (final path segment of the source file).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex SHA-256 of the payload, used in logs to tell uploads apart.
    pub fn sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Reads local files into artifacts.
pub struct ContentLoader;

impl ContentLoader {
    /// Load `path`; failures are reported once and never retried.
    pub async fn load(path: impl AsRef<Path>) -> GradingResult<Artifact> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|source| GradingError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact = Artifact::new(display_name(path), bytes);
        tracing::debug!(path = %path.display(), size = artifact.len(), sha256 = %artifact.sha256(), "artifact loaded");
        Ok(artifact)
    }
}

/// Final path segment, falling back to the whole path when there is none.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).to_string_lossy().into_owned())
}
