//! Provider adapters.
//!
//! A provider turns canonical messages into its request body, and its responses and stream
//! events back into canonical messages and chunks. Transport is left to the caller: request
//! bodies are plain serde values and decoding starts from already received JSON text.

pub mod bedrock;
pub mod openrouter;

use config::{ConverseConfig, ServiceTier};
use futures::Stream;
use serde::{Serialize, de::DeserializeOwned};

pub use bedrock::Bedrock;
pub use openrouter::OpenRouter;

use crate::{
    enrich::{BlockIndexSet, RawChunk, enrich},
    messages::{Message, StreamChunk, ToolChoice, ToolDefinition},
    stream::EnrichedStream,
    usage::UsageOptions,
};

/// Per-call settings. Values set here win over the provider's configured defaults.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub stream_usage: Option<bool>,
    pub service_tier: Option<ServiceTier>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<ToolChoice>,
}

impl CallOptions {
    pub fn usage_options(&self, config: &ConverseConfig) -> UsageOptions {
        UsageOptions {
            stream_usage: self.stream_usage.unwrap_or(config.stream_usage),
        }
    }

    pub fn service_tier(&self, config: &ConverseConfig) -> Option<ServiceTier> {
        self.service_tier.or(config.service_tier)
    }

    /// A tool choice naming a specific tool must name one of the offered tools.
    pub fn check_tool_choice(&self) -> crate::Result<()> {
        if let Some(ToolChoice::Tool(name)) = &self.tool_choice
            && !self.tools.iter().any(|tool| &tool.name == name)
        {
            return Err(crate::Error::InvalidRequest(format!(
                "Tool choice names '{name}', which is not among the offered tools"
            )));
        }

        Ok(())
    }
}

pub trait Provider {
    /// Name used in logs and errors.
    const NAME: &'static str;

    type Request: Serialize;
    type Response: DeserializeOwned;
    type StreamEvent: DeserializeOwned;

    /// Builds the request body for a conversation.
    fn build_request(&self, messages: Vec<Message>, options: &CallOptions, stream: bool) -> crate::Result<Self::Request>;

    /// Converts a non-streamed response into an assistant message. Usage is always extracted.
    fn decode_response(&self, response: Self::Response) -> Message;

    /// Decodes one stream event into raw chunks, in order. Most events yield at most one.
    fn decode_event(&self, event: Self::StreamEvent, options: &CallOptions) -> Vec<RawChunk>;

    fn parse_response(&self, body: &str) -> crate::Result<Self::Response> {
        sonic_rs::from_str(body).map_err(|source| crate::Error::ResponseDecode {
            provider: Self::NAME,
            source,
        })
    }

    fn parse_event(&self, data: &str) -> crate::Result<Self::StreamEvent> {
        sonic_rs::from_str(data).map_err(|source| crate::Error::EventDecode {
            provider: Self::NAME,
            source,
        })
    }

    /// Decodes and enriches one stream event against the stream's index set.
    fn stream_chunks(
        &self,
        event: Self::StreamEvent,
        blocks: &mut BlockIndexSet,
        options: &CallOptions,
    ) -> Vec<StreamChunk> {
        self.decode_event(event, options)
            .into_iter()
            .map(|raw| enrich(raw, blocks))
            .collect()
    }

    /// Wraps a stream of provider events into a stream of canonical chunks.
    fn enrich_stream<S>(&self, events: S, options: CallOptions) -> EnrichedStream<'_, Self, S>
    where
        Self: Sized,
        S: Stream<Item = Self::StreamEvent>,
    {
        EnrichedStream::new(self, events, options)
    }
}
