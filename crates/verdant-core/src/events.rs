//! Journal event classification.
//!
//! Every entry appended to a run's journal carries one of these kinds.
//! The serde tag doubles as the stored `kind` column, so the wire names
//! here are load-bearing: changing one invalidates existing journals.

use serde::{Deserialize, Serialize};

/// Classification of a journaled workflow event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// The workflow entered a named stage.
    StageEntered { stage: String },

    /// A journaled step produced a successful output.
    StepCompleted { step: String },

    /// A journaled step settled with a failure.
    StepFailed { step: String },
}

/// Extract the snake_case kind string from an [`EventKind`] via its serde tag.
pub fn event_kind_str(kind: &EventKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v["type"].as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}
