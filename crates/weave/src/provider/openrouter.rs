//! OpenRouter chat completions.
//!
//! Chat completion deltas carry no block index, so one is assigned per kind of content:
//! reasoning, answer text, and each tool call get their own block.

mod input;
mod output;

use config::ConverseConfig;

pub use input::to_chat_messages;
pub use output::from_chat_message;

use crate::{
    enrich::RawChunk,
    messages::Message,
    protocol::openrouter::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse},
    provider::{CallOptions, Provider},
};

/// Chat completions adapter for one model.
#[derive(Debug, Clone)]
pub struct OpenRouter {
    model: String,
    config: ConverseConfig,
}

impl OpenRouter {
    pub fn new(model: impl Into<String>, config: ConverseConfig) -> Self {
        Self {
            model: model.into(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Provider for OpenRouter {
    const NAME: &'static str = "openrouter";

    type Request = ChatCompletionRequest;
    type Response = ChatCompletionResponse;
    type StreamEvent = ChatCompletionChunk;

    fn build_request(
        &self,
        messages: Vec<Message>,
        options: &CallOptions,
        stream: bool,
    ) -> crate::Result<ChatCompletionRequest> {
        input::build_request(&self.model, &self.config, messages, options, stream)
    }

    fn decode_response(&self, response: ChatCompletionResponse) -> Message {
        output::response_to_message(response)
    }

    fn decode_event(&self, event: ChatCompletionChunk, options: &CallOptions) -> Vec<RawChunk> {
        output::chunk_to_raw_chunks(event, options.usage_options(&self.config))
    }
}
