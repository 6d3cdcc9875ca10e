//! Converse responses and stream events to canonical messages and chunks.

use serde_json::{Map, Value, json};

use crate::{
    enrich::RawChunk,
    messages::{Content, ContentBlock, Message, ReasoningBlock, Role, ToolCall, ToolCallChunk, ToolResultBlock},
    protocol::bedrock::{
        self, ContentBlockDelta, ContentBlockStart, ConversationRole, ConverseMessage, ConverseMetrics, ConverseOutput,
        ConverseResponse, ConverseStreamEvent, ReasoningContentBlock, ReasoningContentBlockDelta, StopReason,
        ToolResultContentBlock, ToolResultStatus,
    },
    usage::{UsageOptions, extract_usage},
};

/// Converts a Converse message back into a canonical message.
///
/// Block order and tool call ids are preserved. Tool use blocks also populate `tool_calls`.
pub fn from_provider_message(message: ConverseMessage) -> Message {
    let role = match message.role {
        ConversationRole::User => Role::User,
        ConversationRole::Assistant => Role::Assistant,
    };

    let mut tool_calls = Vec::new();
    let mut blocks = Vec::with_capacity(message.content.len());

    for block in message.content {
        match block {
            bedrock::ContentBlock::Text(text) => blocks.push(ContentBlock::text(text)),
            bedrock::ContentBlock::ToolUse(tool_use) => {
                tool_calls.push(ToolCall::new(&tool_use.tool_use_id, &tool_use.name, tool_use.input.clone()));
                blocks.push(ContentBlock::tool_call(tool_use.tool_use_id, tool_use.name, tool_use.input));
            }
            bedrock::ContentBlock::ToolResult(result) => {
                blocks.push(ContentBlock::ToolResult(ToolResultBlock {
                    tool_call_id: result.tool_use_id,
                    content: Content::Text(tool_result_text(result.content)),
                    is_error: result.status.map(|status| status == ToolResultStatus::Error),
                    index: None,
                }));
            }
            bedrock::ContentBlock::ReasoningContent(ReasoningContentBlock::ReasoningText(reasoning)) => {
                blocks.push(ContentBlock::Reasoning(ReasoningBlock {
                    text: reasoning.text,
                    signature: reasoning.signature,
                    index: None,
                }));
            }
            bedrock::ContentBlock::ReasoningContent(ReasoningContentBlock::RedactedContent(data)) => {
                blocks.push(redacted_reasoning(data));
            }
            bedrock::ContentBlock::Other(value) => {
                log::debug!("Keeping unmodelled Converse content block as is");
                blocks.push(ContentBlock::Unknown(value));
            }
        }
    }

    Message {
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        ..Message::new(role, Content::Blocks(blocks))
    }
}

pub(super) fn response_to_message(response: ConverseResponse) -> Message {
    let ConverseResponse {
        output,
        stop_reason,
        usage,
        metrics,
    } = response;

    let mut message = match output {
        ConverseOutput::Message(message) => from_provider_message(message),
        ConverseOutput::Other(other) => {
            log::warn!("Unexpected output type in Converse response: {other}");
            Message::assistant(Vec::new())
        }
    };

    if message.content.is_empty() {
        log::debug!("Converse API returned empty content");
    }

    let mut metadata = Map::new();
    metadata.insert("stopReason".to_string(), stop_reason_value(&stop_reason));

    if let Some(metrics) = metrics {
        metadata.insert("metrics".to_string(), metrics_value(metrics));
    }

    message.id = Some(message_id());
    message.response_metadata = Some(metadata);
    message.usage_metadata = usage.and_then(|usage| extract_usage(&usage, UsageOptions { stream_usage: true }));

    message
}

/// Decodes one stream event. Block deltas carry their index in the transient metadata key.
pub(super) fn event_to_chunks(event: ConverseStreamEvent, usage_options: UsageOptions) -> Vec<RawChunk> {
    let chunk = match event {
        ConverseStreamEvent::MessageStart(_) => RawChunk {
            id: Some(message_id()),
            ..Default::default()
        },
        ConverseStreamEvent::ContentBlockStart(start) => match start.start {
            ContentBlockStart::ToolUse(tool_use) => RawChunk {
                tool_call_chunks: vec![ToolCallChunk {
                    id: Some(tool_use.tool_use_id),
                    name: Some(tool_use.name),
                    args: String::new(),
                    index: Some(start.content_block_index),
                }],
                ..Default::default()
            }
            .with_block_index(start.content_block_index),
            // text and reasoning blocks only start with their first delta
            ContentBlockStart::Other(_) => return Vec::new(),
        },
        ConverseStreamEvent::ContentBlockDelta(delta) => {
            let index = delta.content_block_index;

            let chunk = match delta.delta {
                ContentBlockDelta::Text(text) => RawChunk {
                    content: Some(Content::Text(text)),
                    ..Default::default()
                },
                ContentBlockDelta::ToolUse(tool_use) => RawChunk {
                    tool_call_chunks: vec![ToolCallChunk {
                        args: tool_use.input,
                        index: Some(index),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                ContentBlockDelta::ReasoningContent(reasoning) => {
                    let block = match reasoning {
                        ReasoningContentBlockDelta::Text(text) => ContentBlock::reasoning(text),
                        ReasoningContentBlockDelta::Signature(signature) => ContentBlock::Reasoning(ReasoningBlock {
                            text: String::new(),
                            signature: Some(signature),
                            index: None,
                        }),
                        ReasoningContentBlockDelta::RedactedContent(data) => redacted_reasoning(data),
                    };

                    RawChunk {
                        content: Some(Content::Blocks(vec![block])),
                        ..Default::default()
                    }
                }
                ContentBlockDelta::Other(other) => {
                    log::warn!("Unknown Converse content block delta: {other}");
                    return Vec::new();
                }
            };

            chunk.with_block_index(index)
        }
        ConverseStreamEvent::ContentBlockStop(_) => return Vec::new(),
        ConverseStreamEvent::MessageStop(stop) => {
            let mut response_metadata = Map::new();
            response_metadata.insert("stopReason".to_string(), stop_reason_value(&stop.stop_reason));

            if let Some(fields) = stop.additional_model_response_fields {
                response_metadata.insert("additionalModelResponseFields".to_string(), fields);
            }

            RawChunk {
                response_metadata,
                ..Default::default()
            }
        }
        ConverseStreamEvent::Metadata(metadata) => {
            let usage_metadata = metadata
                .usage
                .and_then(|usage| extract_usage(&usage, usage_options));

            let mut response_metadata = Map::new();

            if let Some(metrics) = metadata.metrics {
                response_metadata.insert("metrics".to_string(), metrics_value(metrics));
            }

            if usage_metadata.is_none() && response_metadata.is_empty() {
                return Vec::new();
            }

            RawChunk {
                response_metadata,
                usage_metadata,
                ..Default::default()
            }
        }
        ConverseStreamEvent::Unknown(other) => {
            log::warn!("Unknown Converse stream event: {other}");
            return Vec::new();
        }
    };

    vec![chunk]
}

fn message_id() -> String {
    format!("bedrock-{}", uuid::Uuid::new_v4())
}

fn stop_reason_value(reason: &StopReason) -> Value {
    if let StopReason::Unknown(reason) = reason {
        log::warn!("Unknown Converse stop reason: {reason}");
    }

    serde_json::to_value(reason).unwrap_or_default()
}

fn metrics_value(metrics: ConverseMetrics) -> Value {
    json!({ "latencyMs": metrics.latency_ms })
}

fn redacted_reasoning(data: String) -> ContentBlock {
    ContentBlock::Unknown(json!({ "type": "redacted_reasoning", "data": data }))
}

fn tool_result_text(content: Vec<ToolResultContentBlock>) -> String {
    let pieces: Vec<String> = content
        .into_iter()
        .map(|item| match item {
            ToolResultContentBlock::Text(text) => text,
            ToolResultContentBlock::Json(value) => value.to_string(),
            ToolResultContentBlock::Other(_) => "[Unsupported tool result]".to_string(),
        })
        .collect();

    pieces.join("\n")
}
