//! Provider-agnostic conversation types.
//!
//! Every provider format converts into and out of these types. Content is either a plain
//! string (the legacy, non-tagged form) or an ordered list of tagged blocks; both forms are
//! accepted everywhere and a plain string behaves exactly like a one-element list holding a
//! single text block.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::usage::UsageMetadata;

/// Sender of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Flat-field tool calls. Tagged `tool_call` blocks in `content` carry the same
    /// information; converters accept either form and merge them by call id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Flat-field form of a tool result: the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_metadata: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
            id: None,
            tool_calls: None,
            tool_call_id: None,
            response_metadata: None,
            usage_metadata: None,
        }
    }

    pub fn system(content: impl Into<Content>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// A tool result in flat-field form.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<Content>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    /// Whether this message answers tool calls.
    ///
    /// True for the `tool` role, and for any message whose content consists solely of
    /// `tool_result` blocks.
    pub fn is_tool_result(&self) -> bool {
        if self.role == Role::Tool {
            return true;
        }

        match &self.content {
            Content::Blocks(blocks) => {
                !blocks.is_empty() && blocks.iter().all(|block| matches!(block, ContentBlock::ToolResult(_)))
            }
            Content::Text(_) => false,
        }
    }

    /// Tool calls from both tagged blocks and the flat field, block order first, each id once.
    pub fn collect_tool_calls(&self) -> Vec<ToolCall> {
        let mut calls: Vec<ToolCall> = self
            .content
            .blocks()
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolCall(call) => Some(ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    args: call.args.clone(),
                }),
                _ => None,
            })
            .collect();

        for call in self.tool_calls.iter().flatten() {
            if !calls.iter().any(|existing| existing.id == call.id) {
                calls.push(call.clone());
            }
        }

        calls
    }
}

/// Message content: the legacy plain string or an ordered list of tagged blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl Content {
    /// Concatenation of the textual parts: the string itself, or every `text` block in order.
    pub fn text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Blocks(blocks) => blocks.iter().filter_map(ContentBlock::as_text).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.is_empty(),
            Content::Blocks(blocks) => blocks.is_empty(),
        }
    }

    /// Block view of the content. A plain string has no blocks.
    pub fn blocks(&self) -> &[ContentBlock] {
        match self {
            Content::Text(_) => &[],
            Content::Blocks(blocks) => blocks,
        }
    }

    /// Array form of the content. A non-empty string becomes a single unindexed text block.
    pub fn into_blocks(self) -> Vec<ContentBlock> {
        match self {
            Content::Text(text) if text.is_empty() => Vec::new(),
            Content::Text(text) => vec![ContentBlock::text(text)],
            Content::Blocks(blocks) => blocks,
        }
    }

    /// Adds `text` as a further segment of this content.
    ///
    /// Strings are extended with `separator` between the old and new text, block lists gain
    /// a new text block.
    pub fn append_text(&mut self, text: &str, separator: &str) {
        match self {
            Content::Text(existing) if existing.is_empty() => existing.push_str(text),
            Content::Text(existing) => {
                existing.push_str(separator);
                existing.push_str(text);
            }
            Content::Blocks(blocks) => blocks.push(ContentBlock::text(text)),
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<Vec<ContentBlock>> for Content {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Content::Blocks(blocks)
    }
}

/// A semantically distinct unit of message content.
///
/// Blocks in array form may carry `index`, the position of the block in the provider's
/// content-block stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(TextBlock),
    ToolCall(ToolCallBlock),
    ToolResult(ToolResultBlock),
    Reasoning(ReasoningBlock),
    /// A block whose tag is not recognised, preserved as received.
    #[serde(untagged)]
    Unknown(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallBlock {
    pub id: String,
    pub name: String,
    /// Parsed arguments, or a JSON string fragment while the call is still streaming.
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_call_id: String,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningBlock {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text(TextBlock {
            text: text.into(),
            index: None,
        })
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        ContentBlock::ToolCall(ToolCallBlock {
            id: id.into(),
            name: name.into(),
            args,
            index: None,
        })
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<Content>) -> Self {
        ContentBlock::ToolResult(ToolResultBlock {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: None,
            index: None,
        })
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        ContentBlock::Reasoning(ReasoningBlock {
            text: text.into(),
            signature: None,
            index: None,
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(block) => Some(&block.text),
            _ => None,
        }
    }

    /// Block index. Unknown object blocks carry it as an `index` property.
    pub fn index(&self) -> Option<u32> {
        match self {
            ContentBlock::Text(block) => block.index,
            ContentBlock::ToolCall(block) => block.index,
            ContentBlock::ToolResult(block) => block.index,
            ContentBlock::Reasoning(block) => block.index,
            ContentBlock::Unknown(value) => value
                .get("index")
                .and_then(Value::as_u64)
                .and_then(|index| u32::try_from(index).ok()),
        }
    }

    /// Sets `index` on blocks that do not carry one yet.
    ///
    /// Unknown blocks gain an `index` property when they are JSON objects; other unknown
    /// values are left alone.
    pub fn with_default_index(mut self, index: Option<u32>) -> Self {
        let Some(index) = index else {
            return self;
        };

        match &mut self {
            ContentBlock::Text(block) => {
                block.index.get_or_insert(index);
            }
            ContentBlock::ToolCall(block) => {
                block.index.get_or_insert(index);
            }
            ContentBlock::ToolResult(block) => {
                block.index.get_or_insert(index);
            }
            ContentBlock::Reasoning(block) => {
                block.index.get_or_insert(index);
            }
            ContentBlock::Unknown(Value::Object(map)) => {
                map.entry("index").or_insert_with(|| Value::from(index));
            }
            ContentBlock::Unknown(_) => (),
        }

        self
    }

    /// Best-effort text for a block that cannot be represented natively.
    ///
    /// Known blocks yield their text; unknown blocks yield a `text` property when they have one.
    pub fn fallback_text(&self) -> Option<String> {
        match self {
            ContentBlock::Text(block) => Some(block.text.clone()),
            ContentBlock::Reasoning(block) => Some(block.text.clone()),
            ContentBlock::ToolResult(block) => Some(block.content.text()),
            ContentBlock::ToolCall(_) => None,
            ContentBlock::Unknown(value) => value.get("text").and_then(Value::as_str).map(str::to_string),
        }
    }
}

/// A completed tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: Value,
}

/// How the model should use the offered tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    /// At least one tool call is required.
    Required,
    /// This specific tool must be called.
    Tool(String),
}
