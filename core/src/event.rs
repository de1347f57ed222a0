use serde::Serialize;
use serde_json::Value;

/// Why a run stopped producing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// The model answered without requesting more tools.
    Stop,
    /// The step cap was reached while the model still wanted tools.
    StepLimit,
}

/// Streamed unit of a chat run, delivered in generation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChatEvent {
    TextDelta {
        text: String,
    },
    ToolCall {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        arguments: Value,
    },
    ToolResult {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        result: Value,
    },
    ToolError {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        error: String,
    },
    StepFinish {
        step: usize,
    },
    Finish {
        reason: FinishReason,
        steps: usize,
    },
    Error {
        message: String,
    },
}

impl ChatEvent {
    /// Event name used by the transport framing.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::TextDelta { .. } => "text-delta",
            ChatEvent::ToolCall { .. } => "tool-call",
            ChatEvent::ToolResult { .. } => "tool-result",
            ChatEvent::ToolError { .. } => "tool-error",
            ChatEvent::StepFinish { .. } => "step-finish",
            ChatEvent::Finish { .. } => "finish",
            ChatEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_matches_serialized_tag() {
        let events = [
            ChatEvent::TextDelta { text: "hi".into() },
            ChatEvent::ToolError {
                tool_call_id: "c1".into(),
                tool_name: "listMeals".into(),
                error: "nope".into(),
            },
            ChatEvent::Finish {
                reason: FinishReason::StepLimit,
                steps: 20,
            },
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.kind());
        }
    }

    #[test]
    fn finish_serializes_reason_in_kebab_case() {
        let event = ChatEvent::Finish {
            reason: FinishReason::StepLimit,
            steps: 20,
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "finish", "reason": "step-limit", "steps": 20 })
        );
    }
}
