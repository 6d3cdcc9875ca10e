//! Bedrock Converse API.
//!
//! Stream events carry a `contentBlockIndex` for every block delta, which drives the
//! single-block/multi-block shaping of streamed content.

mod input;
mod output;

use config::ConverseConfig;

pub use input::{ProviderMessages, to_provider_messages};
pub use output::from_provider_message;

use crate::{
    enrich::RawChunk,
    messages::Message,
    protocol::bedrock::{ConverseRequest, ConverseResponse, ConverseStreamEvent},
    provider::{CallOptions, Provider},
};

/// Converse adapter for one model.
#[derive(Debug, Clone)]
pub struct Bedrock {
    model_id: String,
    config: ConverseConfig,
}

impl Bedrock {
    pub fn new(model_id: impl Into<String>, config: ConverseConfig) -> Self {
        Self {
            model_id: model_id.into(),
            config,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl Provider for Bedrock {
    const NAME: &'static str = "bedrock";

    type Request = ConverseRequest;
    type Response = ConverseResponse;
    type StreamEvent = ConverseStreamEvent;

    fn build_request(
        &self,
        messages: Vec<Message>,
        options: &CallOptions,
        _stream: bool,
    ) -> crate::Result<ConverseRequest> {
        input::build_request(&self.model_id, &self.config, messages, options)
    }

    fn decode_response(&self, response: ConverseResponse) -> Message {
        output::response_to_message(response)
    }

    fn decode_event(&self, event: ConverseStreamEvent, options: &CallOptions) -> Vec<RawChunk> {
        output::event_to_chunks(event, options.usage_options(&self.config))
    }
}
