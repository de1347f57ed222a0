use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chef_core::ConversationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Conversation is empty")]
    EmptyConversation,

    #[error("Malformed conversation: {0}")]
    MalformedConversation(#[from] ConversationError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::EmptyConversation | AppError::MalformedConversation(_) => {
                StatusCode::BAD_REQUEST
            }
        };

        (status, self.to_string()).into_response()
    }
}
