//! Canonical messages to chat completion requests.

use config::ConverseConfig;
use serde_json::Value;

use crate::{
    messages::{Content, ContentBlock, Message, Role, ToolCall as CanonicalToolCall, ToolChoice as CanonicalToolChoice},
    protocol::openrouter::{
        ChatCompletionRequest, ChatMessage, ChatRole, FunctionCall, FunctionDefinition, FunctionName, StreamOptions,
        Tool, ToolCall, ToolCallType, ToolChoice, ToolChoiceMode,
    },
    provider::CallOptions,
};

pub(super) fn build_request(
    model: &str,
    config: &ConverseConfig,
    messages: Vec<Message>,
    options: &CallOptions,
    stream: bool,
) -> crate::Result<ChatCompletionRequest> {
    let messages = to_chat_messages(messages);

    if messages.is_empty() {
        return Err(crate::Error::InvalidRequest(
            "Chat completions require at least one message".to_string(),
        ));
    }

    options.check_tool_choice()?;

    let (tools, tool_choice) = if options.tools.is_empty() {
        (None, None)
    } else {
        let tools = options
            .tools
            .iter()
            .map(|tool| Tool {
                tool_type: ToolCallType::Function,
                function: FunctionDefinition {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect();

        (Some(tools), options.tool_choice.as_ref().map(convert_tool_choice))
    };

    let include_usage = stream && options.usage_options(config).stream_usage;

    Ok(ChatCompletionRequest {
        model: model.to_string(),
        messages,
        stream: stream.then_some(true),
        stream_options: include_usage.then_some(StreamOptions { include_usage: true }),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        top_p: config.top_p,
        stop: (!config.stop_sequences.is_empty()).then(|| config.stop_sequences.clone()),
        tools,
        tool_choice,
        service_tier: options.service_tier(config),
    })
}

/// Converts canonical messages into chat messages.
///
/// System messages stay inline. Every tool result becomes its own `tool` message, and
/// reasoning blocks are not sent back.
pub fn to_chat_messages(messages: Vec<Message>) -> Vec<ChatMessage> {
    let mut converted = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            Role::System => {
                let text = outbound_text(&message.content);

                if !text.is_empty() {
                    converted.push(ChatMessage::new(ChatRole::System, text));
                }
            }
            Role::Assistant => converted.push(assistant_message(message)),
            Role::Tool | Role::User => {
                let tool_call_id = message.tool_call_id.clone();
                let mut text_blocks = Vec::new();
                let mut tagged_results = false;

                for block in message.content.into_blocks() {
                    match block {
                        ContentBlock::ToolResult(result) => {
                            tagged_results = true;
                            converted.push(ChatMessage {
                                tool_call_id: Some(result.tool_call_id),
                                ..ChatMessage::new(ChatRole::Tool, result.content.text())
                            });
                        }
                        other => text_blocks.push(other),
                    }
                }

                let text = outbound_text(&Content::Blocks(text_blocks));

                match tool_call_id {
                    // the tagged results already answered the call
                    Some(_) if tagged_results && text.is_empty() => (),
                    Some(tool_call_id) => converted.push(ChatMessage {
                        tool_call_id: Some(tool_call_id),
                        ..ChatMessage::new(ChatRole::Tool, text)
                    }),
                    None if text.is_empty() => (),
                    None if message.role == Role::Tool => {
                        log::warn!("Tool message without a tool call id, sending its content as user text");
                        converted.push(ChatMessage::new(ChatRole::User, text));
                    }
                    None => converted.push(ChatMessage::new(ChatRole::User, text)),
                }
            }
        }
    }

    converted
}

fn assistant_message(message: Message) -> ChatMessage {
    let tool_calls: Vec<ToolCall> = message.collect_tool_calls().into_iter().map(convert_tool_call).collect();
    let text = outbound_text(&message.content);

    ChatMessage {
        role: ChatRole::Assistant,
        content: (!text.is_empty() || tool_calls.is_empty()).then_some(text),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
        reasoning: None,
    }
}

/// Text sent for a message: its text blocks, plus the `text` of unknown blocks.
fn outbound_text(content: &Content) -> String {
    let blocks = match content {
        Content::Text(text) => return text.clone(),
        Content::Blocks(blocks) => blocks,
    };

    let mut text = String::new();

    for block in blocks {
        match block {
            ContentBlock::Text(block) => text.push_str(&block.text),
            ContentBlock::Unknown(value) => {
                let kind = value.get("type").and_then(Value::as_str).unwrap_or("untyped");
                log::warn!("Dropping content block of unsupported type '{kind}' from chat message");

                if let Some(fallback) = value.get("text").and_then(Value::as_str) {
                    text.push_str(fallback);
                }
            }
            ContentBlock::Reasoning(_) | ContentBlock::ToolCall(_) | ContentBlock::ToolResult(_) => (),
        }
    }

    text
}

fn convert_tool_call(call: CanonicalToolCall) -> ToolCall {
    let arguments = match call.args {
        Value::String(arguments) => arguments,
        args => sonic_rs::to_string(&args).unwrap_or_else(|_| "{}".to_string()),
    };

    ToolCall {
        id: call.id,
        tool_type: ToolCallType::Function,
        function: FunctionCall {
            name: call.name,
            arguments,
        },
    }
}

fn convert_tool_choice(choice: &CanonicalToolChoice) -> ToolChoice {
    match choice {
        CanonicalToolChoice::Auto => ToolChoice::Mode(ToolChoiceMode::Auto),
        CanonicalToolChoice::Required => ToolChoice::Mode(ToolChoiceMode::Required),
        CanonicalToolChoice::Tool(name) => ToolChoice::Specific {
            tool_type: ToolCallType::Function,
            function: FunctionName { name: name.clone() },
        },
    }
}
