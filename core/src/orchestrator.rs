//! The assistant turn loop.
//!
//! A run alternates between asking the model for its next step and
//! dispatching the tools it requested, until the model answers without
//! tools or the step cap is reached. Everything produced along the way is
//! pushed onto the caller's channel in generation order; if the caller goes
//! away the channel closes and the run stops at its next suspension point.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::conversation::{
    Conversation, ConversationError, ConversationTurn, ToolCallRequest, ToolOutcome,
};
use crate::event::{ChatEvent, FinishReason};
use crate::llm::{LanguageModel, ModelChunk, ModelRequest};
use crate::registry::{ToolRegistry, ToolSpec};

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub system_prompt: String,
    /// Maximum number of model calls in one run.
    pub max_steps: usize,
    pub tool_timeout: Duration,
}

impl AssistantConfig {
    pub const DEFAULT_MAX_STEPS: usize = 20;
    pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            max_steps: Self::DEFAULT_MAX_STEPS,
            tool_timeout: Self::DEFAULT_TOOL_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("language model failed: {0:#}")]
    Model(anyhow::Error),

    #[error("caller disconnected")]
    Cancelled,

    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

#[derive(Debug)]
pub struct RunSummary {
    pub steps: usize,
    pub reason: FinishReason,
    pub conversation: Conversation,
}

pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    registry: Arc<ToolRegistry>,
    config: AssistantConfig,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        registry: Arc<ToolRegistry>,
        config: AssistantConfig,
    ) -> Self {
        Self {
            model,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub async fn run(
        &self,
        mut conversation: Conversation,
        events: mpsc::Sender<ChatEvent>,
    ) -> Result<RunSummary, OrchestratorError> {
        let tools = self.registry.specs();

        for step in 1..=self.config.max_steps {
            if events.is_closed() {
                return Err(OrchestratorError::Cancelled);
            }

            let (text, calls) = match self.model_step(&conversation, &tools, step, &events).await {
                Ok(turn) => turn,
                Err(OrchestratorError::Model(e)) => {
                    error!("model failed at step {step}: {e:#}");
                    // Best effort: the caller may already be gone.
                    let _ = events
                        .send(ChatEvent::Error {
                            message: format!("{e:#}"),
                        })
                        .await;
                    return Err(OrchestratorError::Model(e));
                }
                Err(other) => return Err(other),
            };

            conversation.push(ConversationTurn::assistant(text, calls.clone()))?;

            if calls.is_empty() {
                emit(&events, ChatEvent::Finish {
                    reason: FinishReason::Stop,
                    steps: step,
                })
                .await?;
                info!(steps = step, "assistant answered");
                return Ok(RunSummary {
                    steps: step,
                    reason: FinishReason::Stop,
                    conversation,
                });
            }

            for call in calls {
                let outcome = tokio::select! {
                    biased;
                    _ = events.closed() => return Err(OrchestratorError::Cancelled),
                    outcome = self.dispatch(&call) => outcome,
                };

                let event = match &outcome {
                    ToolOutcome::Result(value) => ChatEvent::ToolResult {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        result: value.clone(),
                    },
                    ToolOutcome::Error(reason) => ChatEvent::ToolError {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        error: reason.clone(),
                    },
                };
                emit(&events, event).await?;
                conversation.push(ConversationTurn::tool(call.id, call.name, outcome))?;
            }

            emit(&events, ChatEvent::StepFinish { step }).await?;
        }

        let steps = self.config.max_steps;
        info!(steps, "step limit reached");
        emit(&events, ChatEvent::Finish {
            reason: FinishReason::StepLimit,
            steps,
        })
        .await?;
        Ok(RunSummary {
            steps,
            reason: FinishReason::StepLimit,
            conversation,
        })
    }

    /// Streams one model response, forwarding text as it arrives and
    /// collecting the tool invocations it requests.
    async fn model_step(
        &self,
        conversation: &Conversation,
        tools: &[ToolSpec],
        step: usize,
        events: &mpsc::Sender<ChatEvent>,
    ) -> Result<(String, Vec<ToolCallRequest>), OrchestratorError> {
        let request = ModelRequest {
            system: &self.config.system_prompt,
            turns: conversation.turns(),
            tools,
        };

        debug!(step, turns = conversation.len(), "awaiting model");
        let mut stream = tokio::select! {
            biased;
            _ = events.closed() => return Err(OrchestratorError::Cancelled),
            opened = self.model.stream_turn(request) => opened.map_err(OrchestratorError::Model)?,
        };

        let mut text = String::new();
        let mut calls: Vec<ToolCallRequest> = Vec::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = events.closed() => return Err(OrchestratorError::Cancelled),
                chunk = stream.next() => chunk,
            };

            match chunk {
                None => break,
                Some(Err(e)) => return Err(OrchestratorError::Model(e)),
                Some(Ok(ModelChunk::Text(fragment))) => {
                    text.push_str(&fragment);
                    emit(events, ChatEvent::TextDelta { text: fragment }).await?;
                }
                Some(Ok(ModelChunk::ToolCall(mut call))) => {
                    if call.id.is_empty() || id_taken(&call.id, conversation, &calls) {
                        call.id = fresh_id(step, conversation, &calls);
                    }
                    emit(events, ChatEvent::ToolCall {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    })
                    .await?;
                    calls.push(call);
                }
            }
        }

        Ok((text, calls))
    }

    async fn dispatch(&self, call: &ToolCallRequest) -> ToolOutcome {
        match self
            .registry
            .invoke(&call.name, call.arguments.clone(), self.config.tool_timeout)
            .await
        {
            Ok(value) => ToolOutcome::Result(value),
            Err(e) => ToolOutcome::Error(e.to_string()),
        }
    }
}

fn id_taken(id: &str, conversation: &Conversation, calls: &[ToolCallRequest]) -> bool {
    conversation.knows_invocation(id) || calls.iter().any(|c| c.id == id)
}

/// First `call-{step}-{n}` not already used in this run, counting from the
/// position of the call within its step.
fn fresh_id(step: usize, conversation: &Conversation, calls: &[ToolCallRequest]) -> String {
    let mut n = calls.len();
    loop {
        let id = format!("call-{step}-{n}");
        if !id_taken(&id, conversation, calls) {
            return id;
        }
        n += 1;
    }
}

async fn emit(events: &mpsc::Sender<ChatEvent>, event: ChatEvent) -> Result<(), OrchestratorError> {
    events
        .send(event)
        .await
        .map_err(|_| OrchestratorError::Cancelled)
}
