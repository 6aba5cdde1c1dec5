//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Wait between two report fetches, in milliseconds (default: 3000)
    pub poll_step_ms: u64,

    /// Fetch budget of a single-report poll (default: 30)
    pub poll_attempts: u32,

    /// Fetch budget of a full batch poll (default: 100)
    pub poll_retry: u32,

    /// Per-request HTTP timeout in seconds (default: 30)
    pub http_timeout_seconds: u64,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            poll_step_ms: 3000,
            poll_attempts: 30,
            poll_retry: 100,
            http_timeout_seconds: 30,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "poll": {
                "step_ms": self.poll_step_ms,
                "attempts": self.poll_attempts,
                "retry": self.poll_retry
            },
            "http": {
                "timeout_seconds": self.http_timeout_seconds
            },
            "endpoints": {
                "a": [],
                "e": [],
                "x": [],
                "s": []
            }
        })
    }
}
