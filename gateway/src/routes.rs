use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chef_core::{ChatEvent, Conversation, OrchestratorError, ToolSpec};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{api::ChatRequest, error::AppError, AppState};

/// Buffered events per chat before the orchestrator waits on the client.
const EVENT_BUFFER: usize = 64;

pub async fn health_check() -> &'static str {
    "SmartChef Gateway: Operational"
}

pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSpec>> {
    Json(state.orchestrator.registry().specs())
}

/// Runs the assistant over the posted history and streams its events as
/// SSE. The run stops once the client goes away and the stream is dropped.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    if request.messages.is_empty() {
        return Err(AppError::EmptyConversation);
    }
    let conversation = Conversation::from_turns(request.messages)?;
    info!(turns = conversation.len(), "chat requested");

    let (tx, rx) = mpsc::channel::<ChatEvent>(EVENT_BUFFER);
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        match orchestrator.run(conversation, tx).await {
            Ok(summary) => info!(steps = summary.steps, reason = ?summary.reason, "chat finished"),
            Err(OrchestratorError::Cancelled) => info!("client disconnected, chat stopped"),
            Err(e) => warn!("chat failed: {e}"),
        }
    });

    let stream = ReceiverStream::new(rx)
        .map(|event| Event::default().event(event.kind()).json_data(&event));

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
