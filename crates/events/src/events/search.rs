use serde::{Deserialize, Serialize};

/// Search stream lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SearchEvent {
    /// A results stream was opened against one backend call.
    StreamStarted { name: String },

    /// A stream exceeded the configured slow threshold without finishing.
    StreamSlow { name: String, elapsed_ms: u64 },

    /// A stream finished; `results` counts everything it delivered.
    StreamFinished { name: String, results: usize },
}
