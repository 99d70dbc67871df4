//! Normalized event types for streaming LLM responses.
//!
//! Drivers translate provider-specific stream frames into [`NormalizedEvent`]s
//! so the session's tool loop does not depend on the wire format.

use serde::{Deserialize, Serialize};

/// Normalized streaming events emitted by an LLM driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum NormalizedEvent {
    /// Incremental text delta from the assistant's response.
    #[serde(rename = "message.delta")]
    MessageDelta {
        /// The text fragment to append.
        text: String,
    },

    /// Incremental tool call data.
    #[serde(rename = "tool_call.delta")]
    ToolCallDelta {
        /// Index of the tool call within the response.
        call_index: usize,
        /// Tool call ID (present in the first delta).
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Function name (present in the first delta).
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Incremental JSON arguments fragment.
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments_delta: Option<String>,
    },

    /// A fully assembled tool call.
    #[serde(rename = "tool_call.complete")]
    ToolCallComplete {
        /// Index of the tool call within the response.
        call_index: usize,
        /// Unique tool call identifier.
        id: String,
        /// Function name.
        name: String,
        /// Complete JSON arguments string.
        arguments_json: String,
    },

    /// Stream completed.
    #[serde(rename = "done")]
    Done,
}
