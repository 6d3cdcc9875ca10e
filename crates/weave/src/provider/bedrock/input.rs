//! Canonical messages to Converse requests.

use std::collections::HashSet;

use config::ConverseConfig;
use itertools::Itertools;
use serde_json::{Map, Value};

use crate::{
    messages::{Content, ContentBlock, Message, Role, ToolCall, ToolChoice, ToolDefinition, ToolResultBlock},
    protocol::bedrock::{
        self, ConversationRole, ConverseMessage, ConverseRequest, EmptyChoice, InferenceConfiguration, ReasoningContentBlock,
        ReasoningText, SpecificToolChoice, SystemContentBlock, Tool, ToolConfiguration, ToolInputSchema,
        ToolResultContentBlock, ToolResultStatus, ToolSpecification, ToolUseBlock,
    },
    provider::CallOptions,
};

/// A conversation split the way Converse expects it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderMessages {
    pub messages: Vec<ConverseMessage>,
    pub system: Vec<SystemContentBlock>,
}

pub(super) fn build_request(
    model_id: &str,
    config: &ConverseConfig,
    messages: Vec<Message>,
    options: &CallOptions,
) -> crate::Result<ConverseRequest> {
    let ProviderMessages { messages, system } = to_provider_messages(messages);

    if messages.is_empty() {
        return Err(crate::Error::InvalidRequest(
            "Converse requires at least one user or assistant message".to_string(),
        ));
    }

    options.check_tool_choice()?;

    let tool_config = build_tool_config(&options.tools, options.tool_choice.as_ref(), model_id);

    Ok(ConverseRequest {
        messages,
        system,
        inference_config: build_inference_config(config, options),
        tool_config,
    })
}

/// Converts canonical messages into Converse turns and system blocks.
///
/// Consecutive tool results are merged into a single user turn, as Converse expects all
/// results of one assistant turn together. Any other message ends such a run.
pub fn to_provider_messages(messages: Vec<Message>) -> ProviderMessages {
    let mut converted = ProviderMessages::default();
    let runs = messages.into_iter().chunk_by(Message::is_tool_result);

    for (is_tool_result, run) in &runs {
        if is_tool_result {
            let content: Vec<bedrock::ContentBlock> = run.flat_map(tool_result_blocks).collect();

            if !content.is_empty() {
                converted.messages.push(ConverseMessage {
                    role: ConversationRole::User,
                    content,
                });
            }

            continue;
        }

        for message in run {
            if message.role == Role::System {
                converted.system.extend(system_blocks(message.content));
            } else if let Some(message) = convert_message(message) {
                converted.messages.push(message);
            }
        }
    }

    converted
}

fn system_blocks(content: Content) -> Vec<SystemContentBlock> {
    match content {
        Content::Text(text) if text.is_empty() => Vec::new(),
        Content::Text(text) => vec![SystemContentBlock::Text(text)],
        Content::Blocks(blocks) => blocks
            .iter()
            .filter_map(ContentBlock::fallback_text)
            .filter(|text| !text.is_empty())
            .map(SystemContentBlock::Text)
            .collect(),
    }
}

/// Tool result blocks of a message that answers tool calls.
fn tool_result_blocks(message: Message) -> Vec<bedrock::ContentBlock> {
    let Message {
        content, tool_call_id, ..
    } = message;

    let tagged = match &content {
        Content::Blocks(blocks) => !blocks.is_empty() && blocks.iter().all(|b| matches!(b, ContentBlock::ToolResult(_))),
        Content::Text(_) => false,
    };

    if tagged {
        return content
            .into_blocks()
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult(result) => Some(convert_tool_result(result)),
                _ => None,
            })
            .collect();
    }

    match tool_call_id {
        Some(tool_use_id) => vec![bedrock::ContentBlock::ToolResult(bedrock::ToolResultBlock {
            tool_use_id,
            content: tool_result_content(content),
            status: None,
        })],
        None => {
            log::warn!("Tool message without a tool call id, sending its content as text");

            let text = content.text();

            if text.is_empty() {
                Vec::new()
            } else {
                vec![bedrock::ContentBlock::Text(text)]
            }
        }
    }
}

fn convert_tool_result(result: ToolResultBlock) -> bedrock::ContentBlock {
    let ToolResultBlock {
        tool_call_id,
        content,
        is_error,
        index: _,
    } = result;

    bedrock::ContentBlock::ToolResult(bedrock::ToolResultBlock {
        tool_use_id: tool_call_id,
        content: tool_result_content(content),
        status: is_error.map(|is_error| {
            if is_error {
                ToolResultStatus::Error
            } else {
                ToolResultStatus::Success
            }
        }),
    })
}

fn tool_result_content(content: Content) -> Vec<ToolResultContentBlock> {
    let parts: Vec<ToolResultContentBlock> = match content {
        Content::Text(text) => vec![ToolResultContentBlock::Text(text)],
        Content::Blocks(blocks) => blocks
            .iter()
            .filter_map(ContentBlock::fallback_text)
            .map(ToolResultContentBlock::Text)
            .collect(),
    };

    if parts.is_empty() {
        vec![ToolResultContentBlock::Text(String::new())]
    } else {
        parts
    }
}

/// Converts a user or assistant message into one Converse turn.
///
/// Returns `None` for a message that ends up without any content.
fn convert_message(message: Message) -> Option<ConverseMessage> {
    let Message {
        role,
        content,
        tool_calls,
        ..
    } = message;

    let role = match role {
        Role::Assistant => ConversationRole::Assistant,
        Role::User | Role::Tool | Role::System => ConversationRole::User,
    };

    let mut blocks = Vec::new();
    let mut tool_use_ids = HashSet::new();
    let mut fallback = Vec::new();

    for block in content.into_blocks() {
        match block {
            ContentBlock::Text(text) => {
                if !text.text.is_empty() {
                    blocks.push(bedrock::ContentBlock::Text(text.text));
                }
            }
            ContentBlock::ToolCall(call) => {
                tool_use_ids.insert(call.id.clone());
                blocks.push(tool_use_block(ToolCall::new(call.id, call.name, call.args)));
            }
            ContentBlock::ToolResult(result) => blocks.push(convert_tool_result(result)),
            ContentBlock::Reasoning(reasoning) => {
                blocks.push(bedrock::ContentBlock::ReasoningContent(ReasoningContentBlock::ReasoningText(
                    ReasoningText {
                        text: reasoning.text,
                        signature: reasoning.signature,
                    },
                )))
            }
            ContentBlock::Unknown(value) => {
                let kind = value.get("type").and_then(Value::as_str).unwrap_or("untyped");
                log::warn!("Dropping content block of unsupported type '{kind}' from Converse message");

                if let Some(text) = value.get("text").and_then(Value::as_str) {
                    fallback.push(text.to_string());
                }
            }
        }
    }

    for call in tool_calls.into_iter().flatten() {
        if tool_use_ids.insert(call.id.clone()) {
            blocks.push(tool_use_block(call));
        }
    }

    if blocks.is_empty() {
        let text = fallback.concat();

        if text.is_empty() {
            log::debug!("Skipping {role:?} message without convertible content");
            return None;
        }

        blocks.push(bedrock::ContentBlock::Text(text));
    }

    Some(ConverseMessage { role, content: blocks })
}

fn tool_use_block(call: ToolCall) -> bedrock::ContentBlock {
    let ToolCall { id, name, args } = call;
    let input = normalize_tool_input(args);

    log::debug!("Converse tool_use input normalized: id={id} name={name} kind={}", value_kind(&input));

    bedrock::ContentBlock::ToolUse(ToolUseBlock {
        tool_use_id: id,
        name,
        input,
    })
}

/// Converse expects tool input as an object. Strings holding a JSON object are parsed,
/// other non-object values are sent as their JSON text.
fn normalize_tool_input(args: Value) -> Value {
    match args {
        Value::Object(_) => args,
        Value::Null => Value::Object(Map::new()),
        Value::String(text) => match sonic_rs::from_str::<Value>(&text) {
            Ok(parsed @ Value::Object(_)) => parsed,
            Ok(_) => Value::String(text),
            Err(e) => {
                log::debug!("Converse tool_use input is not JSON, keeping it as a string: {e}");
                Value::String(text)
            }
        },
        other => Value::String(other.to_string()),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::Null => "null",
    }
}

fn build_inference_config(config: &ConverseConfig, options: &CallOptions) -> Option<InferenceConfiguration> {
    let inference = InferenceConfiguration {
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        top_p: config.top_p,
        stop_sequences: (!config.stop_sequences.is_empty()).then(|| config.stop_sequences.clone()),
        service_tier: options.service_tier(config),
    };

    (!inference.is_empty()).then_some(inference)
}

fn build_tool_config(
    tools: &[ToolDefinition],
    tool_choice: Option<&ToolChoice>,
    model_id: &str,
) -> Option<ToolConfiguration> {
    if tools.is_empty() {
        if tool_choice.is_some() {
            log::debug!("Ignoring tool choice for a call without tools");
        }

        return None;
    }

    let tools = tools
        .iter()
        .map(|tool| {
            Tool::ToolSpec(ToolSpecification {
                name: tool.name.clone(),
                description: (!tool.description.is_empty()).then(|| tool.description.clone()),
                input_schema: ToolInputSchema::Json(tool.parameters.clone()),
            })
        })
        .collect();

    let family = ModelFamily::from_model_id(model_id);

    Some(ToolConfiguration {
        tools,
        tool_choice: tool_choice.map(|choice| family.convert_tool_choice(choice)),
    })
}

/// Model families reachable through Converse, by their tool choice support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelFamily {
    Anthropic,
    AmazonNova,
    AmazonTitan,
    Cohere,
    MetaLlama,
    Mistral,
    DeepSeek,
    Unknown,
}

impl ModelFamily {
    fn from_model_id(model_id: &str) -> Self {
        // cross-region inference profiles prefix the id with a geography
        let model_id = ["us.", "eu.", "apac.", "global."]
            .iter()
            .find_map(|prefix| model_id.strip_prefix(prefix))
            .unwrap_or(model_id);

        if model_id.starts_with("anthropic.") {
            ModelFamily::Anthropic
        } else if model_id.starts_with("amazon.nova") {
            ModelFamily::AmazonNova
        } else if model_id.starts_with("amazon.titan") {
            ModelFamily::AmazonTitan
        } else if model_id.starts_with("cohere.") {
            ModelFamily::Cohere
        } else if model_id.starts_with("meta.") {
            ModelFamily::MetaLlama
        } else if model_id.starts_with("mistral.") {
            ModelFamily::Mistral
        } else if model_id.starts_with("deepseek.") {
            ModelFamily::DeepSeek
        } else {
            ModelFamily::Unknown
        }
    }

    /// Whether the family accepts `any`, forcing at least one tool call.
    fn supports_tool_choice_any(self) -> bool {
        matches!(
            self,
            ModelFamily::Anthropic | ModelFamily::AmazonNova | ModelFamily::MetaLlama | ModelFamily::DeepSeek
        )
    }

    /// Whether the family accepts a specific tool to call.
    fn supports_tool_choice_specific(self) -> bool {
        matches!(
            self,
            ModelFamily::Anthropic
                | ModelFamily::AmazonNova
                | ModelFamily::Cohere
                | ModelFamily::MetaLlama
                | ModelFamily::Mistral
                | ModelFamily::DeepSeek
        )
    }

    /// Unsupported choices fall back to `auto`.
    fn convert_tool_choice(self, choice: &ToolChoice) -> bedrock::ToolChoice {
        match choice {
            ToolChoice::Auto => bedrock::ToolChoice::Auto(EmptyChoice {}),
            ToolChoice::Required if self.supports_tool_choice_any() => bedrock::ToolChoice::Any(EmptyChoice {}),
            ToolChoice::Tool(name) if self.supports_tool_choice_specific() => {
                bedrock::ToolChoice::Tool(SpecificToolChoice { name: name.clone() })
            }
            ToolChoice::Required | ToolChoice::Tool(_) => {
                log::debug!("Model family {self:?} does not support {choice:?}, falling back to auto");
                bedrock::ToolChoice::Auto(EmptyChoice {})
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]

    use config::ServiceTier;
    use insta::assert_json_snapshot;
    use serde_json::json;

    use super::*;
    use crate::messages::TextBlock;

    #[test]
    fn consecutive_tool_results_coalesce_in_call_order() {
        let messages = vec![
            Message::user("What's the weather in Oslo and Bergen?"),
            Message::assistant("").with_tool_calls(vec![
                ToolCall::new("call_1", "weather", json!({ "city": "Oslo" })),
                ToolCall::new("call_2", "weather", json!({ "city": "Bergen" })),
            ]),
            Message::tool("call_1", "-3°C"),
            Message::tool("call_2", "4°C"),
        ];

        let converted = to_provider_messages(messages);

        assert_eq!(converted.messages.len(), 3);
        assert_json_snapshot!(converted.messages[2], @r#"
        {
          "role": "user",
          "content": [
            {
              "toolResult": {
                "toolUseId": "call_1",
                "content": [
                  {
                    "text": "-3°C"
                  }
                ]
              }
            },
            {
              "toolResult": {
                "toolUseId": "call_2",
                "content": [
                  {
                    "text": "4°C"
                  }
                ]
              }
            }
          ]
        }
        "#);
    }

    #[test]
    fn tagged_and_flat_tool_results_coalesce_together() {
        let messages = vec![
            Message::tool("call_1", "one"),
            Message::user(vec![ContentBlock::tool_result("call_2", "two")]),
        ];

        let converted = to_provider_messages(messages);

        assert_eq!(converted.messages.len(), 1);
        assert_eq!(converted.messages[0].content.len(), 2);
    }

    #[test]
    fn non_tool_message_ends_the_run() {
        let messages = vec![
            Message::tool("call_1", "one"),
            Message::user("interjection"),
            Message::tool("call_2", "two"),
        ];

        let block_counts: Vec<_> = to_provider_messages(messages)
            .messages
            .into_iter()
            .map(|message| message.content.len())
            .collect();

        assert_eq!(block_counts, [1, 1, 1]);
    }

    #[test]
    fn system_messages_are_collected_in_order() {
        let messages = vec![
            Message::system("You are terse."),
            Message::user("hi"),
            Message::system(vec![ContentBlock::text("Answer in English.")]),
        ];

        let converted = to_provider_messages(messages);

        assert_eq!(
            converted.system,
            [
                SystemContentBlock::Text("You are terse.".to_string()),
                SystemContentBlock::Text("Answer in English.".to_string()),
            ]
        );
        assert_eq!(converted.messages.len(), 1);
    }

    #[test]
    fn plain_string_matches_single_text_block() {
        let legacy = to_provider_messages(vec![Message::user("hello")]);
        let tagged = to_provider_messages(vec![Message::user(vec![ContentBlock::Text(TextBlock {
            text: "hello".to_string(),
            index: None,
        })])]);

        assert_eq!(legacy, tagged);
    }

    #[test]
    fn dual_format_tool_calls_are_emitted_once() {
        let message = Message::assistant(vec![
            ContentBlock::text("Searching"),
            ContentBlock::tool_call("call_1", "search", json!({ "q": "a" })),
        ])
        .with_tool_calls(vec![
            ToolCall::new("call_1", "search", json!({ "q": "a" })),
            ToolCall::new("call_2", "search", json!({ "q": "b" })),
        ]);

        let converted = to_provider_messages(vec![message]);

        let ids: Vec<_> = converted.messages[0]
            .content
            .iter()
            .filter_map(|block| match block {
                bedrock::ContentBlock::ToolUse(tool_use) => Some(tool_use.tool_use_id.as_str()),
                _ => None,
            })
            .collect();

        assert_eq!(ids, ["call_1", "call_2"]);
    }

    #[test]
    fn unknown_blocks_are_dropped() {
        let message = Message::user(vec![
            ContentBlock::Unknown(json!({ "type": "image_url", "image_url": { "url": "https://example.com" } })),
            ContentBlock::text("describe it"),
        ]);

        let converted = to_provider_messages(vec![message]);

        assert_eq!(
            converted.messages[0].content,
            [bedrock::ContentBlock::Text("describe it".to_string())]
        );
    }

    #[test]
    fn message_of_only_unknown_blocks_falls_back_to_their_text() {
        let message = Message::user(vec![ContentBlock::Unknown(
            json!({ "type": "citation", "text": "quoted", "source": "doc" }),
        )]);

        let converted = to_provider_messages(vec![message]);

        assert_eq!(
            converted.messages[0].content,
            [bedrock::ContentBlock::Text("quoted".to_string())]
        );
    }

    #[test]
    fn message_without_text_is_skipped() {
        let message = Message::user(vec![ContentBlock::Unknown(json!({ "type": "image", "data": "AA==" }))]);

        assert!(to_provider_messages(vec![message]).messages.is_empty());
    }

    #[test]
    fn string_tool_input_parses_as_object() {
        assert_eq!(normalize_tool_input(json!("{\"command\":\"ls\"}")), json!({ "command": "ls" }));
        assert_eq!(normalize_tool_input(Value::Null), json!({}));
    }

    #[test]
    fn invalid_tool_input_stays_a_string() {
        let raw = r#"{"command": "echo "hello""}"#;

        assert_eq!(normalize_tool_input(json!(raw)), json!(raw));
    }

    #[test]
    fn service_tier_call_option_overrides_config() {
        let config = ConverseConfig {
            service_tier: Some(ServiceTier::Default),
            ..Default::default()
        };

        let options = CallOptions {
            service_tier: Some(ServiceTier::Priority),
            ..Default::default()
        };

        let request = build_request("anthropic.claude-3-haiku", &config, vec![Message::user("hi")], &options).unwrap();

        assert_eq!(
            request.inference_config.and_then(|inference| inference.service_tier),
            Some(ServiceTier::Priority)
        );
    }

    #[test]
    fn configured_service_tier_applies_without_override() {
        let config = ConverseConfig {
            service_tier: Some(ServiceTier::Flex),
            ..Default::default()
        };

        let request = build_request("anthropic.claude-3-haiku", &config, vec![Message::user("hi")], &CallOptions::default()).unwrap();

        assert_json_snapshot!(request, @r#"
        {
          "messages": [
            {
              "role": "user",
              "content": [
                {
                  "text": "hi"
                }
              ]
            }
          ],
          "inferenceConfig": {
            "serviceTier": "flex"
          }
        }
        "#);
    }

    #[test]
    fn unset_service_tier_is_omitted() {
        let request = build_request(
            "anthropic.claude-3-haiku",
            &ConverseConfig::default(),
            vec![Message::user("hi")],
            &CallOptions::default(),
        )
        .unwrap();

        assert!(request.inference_config.is_none());
    }

    #[test]
    fn system_only_conversation_is_rejected() {
        let result = build_request(
            "anthropic.claude-3-haiku",
            &ConverseConfig::default(),
            vec![Message::system("alone")],
            &CallOptions::default(),
        );

        assert!(matches!(result, Err(crate::Error::InvalidRequest(_))));
    }

    #[test]
    fn tool_choice_follows_model_family() {
        let options = CallOptions {
            tools: vec![ToolDefinition {
                name: "search".to_string(),
                description: "Search the web".to_string(),
                parameters: json!({ "type": "object" }),
            }],
            tool_choice: Some(ToolChoice::Required),
            ..Default::default()
        };

        let config = ConverseConfig::default();

        let claude = build_request("us.anthropic.claude-3-7-sonnet", &config, vec![Message::user("hi")], &options).unwrap();
        let titan = build_request("amazon.titan-text-express-v1", &config, vec![Message::user("hi")], &options).unwrap();

        let choice = |request: ConverseRequest| request.tool_config.and_then(|tools| tools.tool_choice);

        assert_eq!(choice(claude), Some(bedrock::ToolChoice::Any(EmptyChoice {})));
        assert_eq!(choice(titan), Some(bedrock::ToolChoice::Auto(EmptyChoice {})));
    }

    #[test]
    fn tool_choice_for_unknown_tool_is_rejected() {
        let options = CallOptions {
            tools: vec![ToolDefinition {
                name: "search".to_string(),
                description: String::new(),
                parameters: json!({ "type": "object" }),
            }],
            tool_choice: Some(ToolChoice::Tool("delete_everything".to_string())),
            ..Default::default()
        };

        let result = build_request(
            "anthropic.claude-3-haiku",
            &ConverseConfig::default(),
            vec![Message::user("hi")],
            &options,
        );

        let Err(crate::Error::InvalidRequest(message)) = result else {
            panic!("expected an invalid request");
        };

        assert_eq!(message, "Tool choice names 'delete_everything', which is not among the offered tools");
    }
}
