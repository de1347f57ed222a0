use chef_core::ConversationTurn;
use serde::Deserialize;

/// Body of `POST /api/chat`: the whole history, oldest turn first.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ConversationTurn>,
}
