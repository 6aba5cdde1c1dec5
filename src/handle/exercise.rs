use serde::{Deserialize, Serialize};
use serde_json::Value;

/// File name under which string answers are submitted.
pub const DEFAULT_INLINE_FILE_NAME: &str = "file";

/// Reference to an exercise hosted by the grading service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    safecookie: Option<String>,
    #[serde(default = "default_inline_file_name")]
    inline_file_name: String,
}

fn default_inline_file_name() -> String {
    DEFAULT_INLINE_FILE_NAME.to_string()
}

impl Exercise {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            safecookie: None,
            inline_file_name: default_inline_file_name(),
        }
    }

    /// Attach the deployment token.
    pub fn with_safecookie(mut self, safecookie: impl Into<String>) -> Self {
        self.safecookie = Some(safecookie.into());
        self
    }

    pub fn with_inline_file_name(mut self, name: impl Into<String>) -> Self {
        self.inline_file_name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deployment token; blank tokens count as absent.
    pub fn safecookie(&self) -> Option<&str> {
        self.safecookie
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn is_deployed(&self) -> bool {
        self.safecookie().is_some()
    }

    pub fn inline_file_name(&self) -> &str {
        &self.inline_file_name
    }
}

/// Decoded description returned by an exercises-set upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExercisesSet {
    pub campaign: String,
    pub document: Value,
}
