//! Chat completion responses and stream chunks to canonical messages and chunks.

use serde_json::{Map, Value};

use crate::{
    enrich::RawChunk,
    messages::{Content, ContentBlock, Message, Role, ToolCall, ToolCallChunk, parse_tool_args},
    protocol::openrouter::{ChatCompletionChunk, ChatCompletionResponse, ChatMessage, ChatRole, FinishReason},
    usage::{UsageOptions, extract_usage},
};

const REASONING_BLOCK: u32 = 0;
const TEXT_BLOCK: u32 = 1;
const FIRST_TOOL_CALL_BLOCK: u32 = 2;

/// Converts a chat message into a canonical message.
///
/// Text-only messages keep string content. Reasoning or tool calls switch to block form,
/// ordered reasoning, text, tool calls.
pub fn from_chat_message(message: ChatMessage) -> Message {
    let ChatMessage {
        role,
        content,
        tool_calls,
        tool_call_id,
        reasoning,
    } = message;

    let role = match role {
        ChatRole::System => Role::System,
        ChatRole::User => Role::User,
        ChatRole::Assistant => Role::Assistant,
        ChatRole::Tool => Role::Tool,
        ChatRole::Other(other) => {
            log::warn!("Unknown chat role '{other}', treating it as assistant");
            Role::Assistant
        }
    };

    let text = content.unwrap_or_default();
    let reasoning = reasoning.filter(|reasoning| !reasoning.is_empty());

    let tool_calls: Vec<ToolCall> = tool_calls
        .into_iter()
        .flatten()
        .map(|call| ToolCall::new(call.id, call.function.name, parse_tool_args(&call.function.arguments)))
        .collect();

    let content = if reasoning.is_none() && tool_calls.is_empty() {
        Content::Text(text)
    } else {
        let mut blocks = Vec::with_capacity(tool_calls.len() + 2);
        blocks.extend(reasoning.map(ContentBlock::reasoning));

        if !text.is_empty() {
            blocks.push(ContentBlock::text(text));
        }

        blocks.extend(
            tool_calls
                .iter()
                .map(|call| ContentBlock::tool_call(&call.id, &call.name, call.args.clone())),
        );

        Content::Blocks(blocks)
    };

    Message {
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id,
        ..Message::new(role, content)
    }
}

pub(super) fn response_to_message(response: ChatCompletionResponse) -> Message {
    let ChatCompletionResponse {
        id,
        model,
        choices,
        usage,
    } = response;

    let Some(choice) = choices.into_iter().next() else {
        log::warn!("Chat completion response without choices");

        return Message {
            id: Some(id),
            ..Message::assistant(Vec::new())
        };
    };

    let mut message = from_chat_message(choice.message);

    let mut metadata = Map::new();
    metadata.insert("model".to_string(), Value::String(model));

    if let Some(reason) = choice.finish_reason {
        metadata.insert("finish_reason".to_string(), finish_reason_value(&reason));
    }

    message.id = Some(id);
    message.response_metadata = Some(metadata);
    message.usage_metadata = usage.and_then(|usage| extract_usage(&usage, UsageOptions { stream_usage: true }));

    message
}

/// Decodes one stream chunk, splitting reasoning, text and tool call deltas into separate
/// raw chunks tagged with their block index.
pub(super) fn chunk_to_raw_chunks(chunk: ChatCompletionChunk, usage_options: UsageOptions) -> Vec<RawChunk> {
    let ChatCompletionChunk {
        id,
        model,
        choices,
        usage,
    } = chunk;

    let mut raw_chunks = Vec::new();
    let base = || RawChunk {
        id: Some(id.clone()),
        ..Default::default()
    };

    for choice in choices {
        if choice.index != 0 {
            log::debug!("Ignoring delta of choice {}", choice.index);
            continue;
        }

        let delta = choice.delta;

        if let Some(reasoning) = delta.reasoning.filter(|reasoning| !reasoning.is_empty()) {
            raw_chunks.push(
                RawChunk {
                    content: Some(Content::Blocks(vec![ContentBlock::reasoning(reasoning)])),
                    ..base()
                }
                .with_block_index(REASONING_BLOCK),
            );
        }

        if let Some(text) = delta.content.filter(|text| !text.is_empty()) {
            raw_chunks.push(
                RawChunk {
                    content: Some(Content::Text(text)),
                    ..base()
                }
                .with_block_index(TEXT_BLOCK),
            );
        }

        for call in delta.tool_calls.into_iter().flatten() {
            let function = call.function.unwrap_or_default();

            raw_chunks.push(
                RawChunk {
                    tool_call_chunks: vec![ToolCallChunk {
                        id: call.id,
                        name: function.name,
                        args: function.arguments.unwrap_or_default(),
                        index: None,
                    }],
                    ..base()
                }
                .with_block_index(FIRST_TOOL_CALL_BLOCK.saturating_add(call.index)),
            );
        }

        if let Some(reason) = choice.finish_reason {
            let mut response_metadata = Map::new();
            response_metadata.insert("finish_reason".to_string(), finish_reason_value(&reason));
            response_metadata.insert("model".to_string(), Value::String(model.clone()));

            raw_chunks.push(RawChunk {
                response_metadata,
                ..base()
            });
        }
    }

    if let Some(usage_metadata) = usage.and_then(|usage| extract_usage(&usage, usage_options)) {
        raw_chunks.push(RawChunk {
            usage_metadata: Some(usage_metadata),
            ..base()
        });
    }

    raw_chunks
}

fn finish_reason_value(reason: &FinishReason) -> Value {
    serde_json::to_value(reason).unwrap_or_default()
}
