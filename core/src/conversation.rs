use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// What a tool invocation produced: a value, or the reason it could not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolOutcome {
    Result(Value),
    Error(String),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Error(_))
    }

    /// Text handed back to the model. Formatted cards are already strings
    /// and go through untouched so the model sees plain Markdown.
    pub fn to_model_content(&self) -> String {
        match self {
            ToolOutcome::Result(Value::String(text)) => text.clone(),
            ToolOutcome::Result(value) => value.to_string(),
            ToolOutcome::Error(reason) => json!({ "error": reason }).to_string(),
        }
    }
}

/// One message of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ConversationTurn {
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: String,
        #[serde(default, rename = "toolCalls", skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        outcome: ToolOutcome,
    },
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        ConversationTurn::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        ConversationTurn::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        outcome: ToolOutcome,
    ) -> Self {
        ConversationTurn::Tool {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            outcome,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("tool turn '{0}' does not answer any pending invocation")]
    OrphanToolTurn(String),

    #[error("invocation '{0}' was already answered")]
    DuplicateAnswer(String),

    #[error("invocation id '{0}' is used more than once")]
    DuplicateInvocation(String),

    #[error("invocation '{0}' has no tool turn answering it")]
    Unanswered(String),
}

/// Append-only history in which every tool turn answers exactly one
/// earlier assistant invocation.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
    pending: Vec<String>,
    answered: HashSet<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a conversation from caller-supplied turns, rejecting histories
    /// that break request/response pairing.
    pub fn from_turns(
        turns: impl IntoIterator<Item = ConversationTurn>,
    ) -> Result<Self, ConversationError> {
        let mut conversation = Self::new();
        for turn in turns {
            conversation.push(turn)?;
        }
        if let Some(id) = conversation.pending.first() {
            return Err(ConversationError::Unanswered(id.clone()));
        }
        Ok(conversation)
    }

    pub fn push(&mut self, turn: ConversationTurn) -> Result<(), ConversationError> {
        match &turn {
            ConversationTurn::Tool { tool_call_id, .. } => {
                match self.pending.iter().position(|id| id == tool_call_id) {
                    Some(index) => {
                        let id = self.pending.remove(index);
                        self.answered.insert(id);
                    }
                    None if self.answered.contains(tool_call_id) => {
                        return Err(ConversationError::DuplicateAnswer(tool_call_id.clone()));
                    }
                    None => return Err(ConversationError::OrphanToolTurn(tool_call_id.clone())),
                }
            }
            other => {
                if let Some(id) = self.pending.first() {
                    return Err(ConversationError::Unanswered(id.clone()));
                }
                if let ConversationTurn::Assistant { tool_calls, .. } = other {
                    for call in tool_calls {
                        if self.knows_invocation(&call.id) {
                            return Err(ConversationError::DuplicateInvocation(call.id.clone()));
                        }
                        self.pending.push(call.id.clone());
                    }
                }
            }
        }
        self.turns.push(turn);
        Ok(())
    }

    pub fn knows_invocation(&self, id: &str) -> bool {
        self.answered.contains(id) || self.pending.iter().any(|pending| pending == id)
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: "getAreas".to_string(),
            arguments: json!({}),
        }
    }

    #[test]
    fn parses_inbound_turns() {
        let raw = json!([
            { "role": "user", "content": "what cuisines do you have?" },
            { "role": "assistant", "content": "", "toolCalls": [
                { "id": "c1", "name": "getAreas", "arguments": {} }
            ]},
            { "role": "tool", "toolCallId": "c1", "toolName": "getAreas",
              "outcome": { "result": [{ "areaId": "a1", "name": "Italian" }] } },
            { "role": "assistant", "content": "We have Italian dishes." }
        ]);

        let turns: Vec<ConversationTurn> = serde_json::from_value(raw).unwrap();
        let conversation = Conversation::from_turns(turns).unwrap();

        assert_eq!(conversation.len(), 4);
        assert!(conversation.knows_invocation("c1"));
    }

    #[test]
    fn rejects_orphan_tool_turn() {
        let turns = vec![
            ConversationTurn::user("hi"),
            ConversationTurn::tool("ghost", "getAreas", ToolOutcome::Result(json!([]))),
        ];

        assert_eq!(
            Conversation::from_turns(turns).unwrap_err(),
            ConversationError::OrphanToolTurn("ghost".to_string())
        );
    }

    #[test]
    fn rejects_second_answer_for_same_invocation() {
        let turns = vec![
            ConversationTurn::assistant("", vec![call("c1")]),
            ConversationTurn::tool("c1", "getAreas", ToolOutcome::Result(json!([]))),
            ConversationTurn::tool("c1", "getAreas", ToolOutcome::Result(json!([]))),
        ];

        assert_eq!(
            Conversation::from_turns(turns).unwrap_err(),
            ConversationError::DuplicateAnswer("c1".to_string())
        );
    }

    #[test]
    fn rejects_unanswered_invocation() {
        let turns = vec![
            ConversationTurn::assistant("", vec![call("c1"), call("c2")]),
            ConversationTurn::tool("c2", "getAreas", ToolOutcome::Result(json!([]))),
        ];

        assert_eq!(
            Conversation::from_turns(turns).unwrap_err(),
            ConversationError::Unanswered("c1".to_string())
        );
    }

    #[test]
    fn rejects_reused_invocation_id() {
        let mut conversation = Conversation::new();
        conversation
            .push(ConversationTurn::assistant("", vec![call("c1")]))
            .unwrap();
        conversation
            .push(ConversationTurn::tool("c1", "getAreas", ToolOutcome::Result(json!([]))))
            .unwrap();

        let err = conversation
            .push(ConversationTurn::assistant("", vec![call("c1")]))
            .unwrap_err();
        assert_eq!(err, ConversationError::DuplicateInvocation("c1".to_string()));
    }

    #[test]
    fn model_content_keeps_markdown_cards_verbatim() {
        let card = ToolOutcome::Result(json!("### Tomato Soup"));
        let error = ToolOutcome::Error("boom".to_string());

        assert_eq!(card.to_model_content(), "### Tomato Soup");
        assert_eq!(error.to_model_content(), r#"{"error":"boom"}"#);
    }
}
