use std::collections::{BTreeMap, VecDeque};
use std::pin::Pin;

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionResponseStream, ChatCompletionTool, ChatCompletionToolArgs,
        ChatCompletionToolType, CreateChatCompletionRequestArgs,
        CreateChatCompletionStreamResponse, FunctionCall, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::conversation::{ConversationTurn, ToolCallRequest};
use crate::registry::ToolSpec;

/// One piece of a model response: a text fragment as soon as it is
/// generated, or a complete tool invocation request.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChunk {
    Text(String),
    ToolCall(ToolCallRequest),
}

pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelChunk>> + Send>>;

/// Everything the model sees for one step.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system: &'a str,
    pub turns: &'a [ConversationTurn],
    pub tools: &'a [ToolSpec],
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn stream_turn(&self, request: ModelRequest<'_>) -> Result<ModelStream>;
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    /// OpenAI-compatible endpoint; `None` keeps the provider default.
    pub api_base: Option<String>,
}

/// Chat-completions client for any OpenAI-compatible provider.
pub struct Brain {
    client: Client<OpenAIConfig>,
    model: String,
}

impl Brain {
    pub fn new(config: &LlmConfig) -> Self {
        let mut openai = OpenAIConfig::new().with_api_key(&config.api_key);
        if let Some(base) = &config.api_base {
            openai = openai.with_api_base(base);
        }

        info!("Brain connected. Model: {}", config.model);
        Self {
            client: Client::with_config(openai),
            model: config.model.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One-shot connectivity probe used at startup.
    pub async fn say_hello(&self) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content("Hello! Reply with 'System Online'.")
                    .build()?,
            )])
            .build()?;

        let response = self.client.chat().create(request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .context("model returned no choices")?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl LanguageModel for Brain {
    async fn stream_turn(&self, request: ModelRequest<'_>) -> Result<ModelStream> {
        let messages = to_openai_messages(request.system, request.turns)?;
        let tools = to_openai_tools(request.tools)?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages);
        if !tools.is_empty() {
            args.tools(tools);
        }

        debug!(turns = request.turns.len(), "requesting model turn");
        let upstream = self
            .client
            .chat()
            .create_stream(args.build()?)
            .await
            .context("failed to open model stream")?;

        Ok(Box::pin(reassemble(upstream)))
    }
}

fn to_openai_messages(
    system: &str,
    turns: &[ConversationTurn],
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()?
            .into(),
    );

    for turn in turns {
        let message = match turn {
            ConversationTurn::User { content } => ChatCompletionRequestUserMessageArgs::default()
                .content(content.as_str())
                .build()?
                .into(),
            ConversationTurn::Assistant {
                content,
                tool_calls,
            } => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if !content.is_empty() {
                    builder.content(content.as_str());
                }
                if !tool_calls.is_empty() {
                    builder.tool_calls(
                        tool_calls
                            .iter()
                            .map(|call| ChatCompletionMessageToolCall {
                                id: call.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: call.name.clone(),
                                    arguments: arguments_text(&call.arguments),
                                },
                            })
                            .collect::<Vec<_>>(),
                    );
                }
                builder.build()?.into()
            }
            ConversationTurn::Tool {
                tool_call_id,
                outcome,
                ..
            } => ChatCompletionRequestToolMessageArgs::default()
                .content(outcome.to_model_content())
                .tool_call_id(tool_call_id.as_str())
                .build()?
                .into(),
        };
        messages.push(message);
    }

    Ok(messages)
}

fn to_openai_tools(tools: &[ToolSpec]) -> Result<Vec<ChatCompletionTool>> {
    tools
        .iter()
        .map(|tool| {
            let function = FunctionObjectArgs::default()
                .name(&tool.name)
                .description(&tool.description)
                .parameters(tool.parameters.clone())
                .build()?;
            Ok(ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(function)
                .build()?)
        })
        .collect()
}

/// Arguments the model produced that were not valid JSON are kept as the
/// raw string, so they are echoed back unchanged.
fn arguments_text(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

impl PartialCall {
    fn finish(self) -> ToolCallRequest {
        let arguments = if self.arguments.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&self.arguments).unwrap_or(Value::String(self.arguments))
        };
        ToolCallRequest {
            id: self.id,
            name: self.name,
            arguments,
        }
    }
}

/// Turns provider deltas into [`ModelChunk`]s. Text is forwarded as it
/// arrives; tool-call fragments are stitched together by index and released
/// once the choice finishes.
struct Reassembly {
    upstream: ChatCompletionResponseStream,
    partial: BTreeMap<u32, PartialCall>,
    ready: VecDeque<Result<ModelChunk>>,
    exhausted: bool,
}

impl Reassembly {
    fn absorb(&mut self, response: CreateChatCompletionStreamResponse) {
        for choice in response.choices.into_iter().filter(|c| c.index == 0) {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                self.ready.push_back(Ok(ModelChunk::Text(text)));
            }

            for fragment in choice.delta.tool_calls.unwrap_or_default() {
                let call = self.partial.entry(fragment.index).or_default();
                if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
                    call.id = id;
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name.filter(|n| !n.is_empty()) {
                        call.name = name;
                    }
                    if let Some(arguments) = function.arguments {
                        call.arguments.push_str(&arguments);
                    }
                }
            }

            if choice.finish_reason.is_some() {
                self.flush_calls();
            }
        }
    }

    fn flush_calls(&mut self) {
        let calls = std::mem::take(&mut self.partial);
        self.ready.extend(
            calls
                .into_values()
                .map(|call| Ok(ModelChunk::ToolCall(call.finish()))),
        );
    }
}

fn reassemble(upstream: ChatCompletionResponseStream) -> impl Stream<Item = Result<ModelChunk>> {
    let state = Reassembly {
        upstream,
        partial: BTreeMap::new(),
        ready: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.exhausted {
                return None;
            }
            match state.upstream.next().await {
                Some(Ok(response)) => state.absorb(response),
                Some(Err(e)) => {
                    state.exhausted = true;
                    state
                        .ready
                        .push_back(Err(anyhow::Error::new(e).context("model stream failed")));
                }
                None => {
                    state.exhausted = true;
                    state.flush_calls();
                }
            }
        }
    })
}
