//! Incremental message fragments and their concatenation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::canonical::{Content, ContentBlock, Message, Role, ToolCall};
use crate::usage::UsageMetadata;

/// A streamed fragment of a tool call. `args` is a raw JSON text fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub args: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// The fields of an assistant message populated by one stream increment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_call_chunks: Vec<ToolCallChunk>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub response_metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

impl MessageChunk {
    /// Appends `other` to this chunk.
    ///
    /// String content concatenates. Block content merges blocks sharing an index and kind,
    /// so text deltas of one block grow that block instead of adding new ones. Once either side
    /// is in block form the result is in block form. Tool call fragments merge by index,
    /// metadata merges recursively with later scalars winning, and usage is summed.
    pub fn concat(mut self, other: MessageChunk) -> MessageChunk {
        self.id = self.id.or(other.id);

        self.content = match (self.content, other.content) {
            (None, right) => right,
            (left, None) => left,
            (Some(left), Some(right)) => Some(concat_content(left, right)),
        };

        for chunk in other.tool_call_chunks {
            merge_tool_call_chunk(&mut self.tool_call_chunks, chunk);
        }

        merge_metadata(&mut self.response_metadata, other.response_metadata);

        self.usage_metadata = match (self.usage_metadata, other.usage_metadata) {
            (Some(left), Some(right)) => Some(left.merge(right)),
            (left, right) => left.or(right),
        };

        self
    }

    /// Finalises the accumulated fragments into an assistant message.
    ///
    /// Tool call argument fragments are parsed as JSON. Arguments that do not parse are kept
    /// as a JSON string, and empty arguments become an empty object.
    pub fn into_message(self) -> Message {
        let tool_calls: Vec<ToolCall> = self
            .tool_call_chunks
            .iter()
            .map(|chunk| ToolCall {
                id: chunk.id.clone().unwrap_or_default(),
                name: chunk.name.clone().unwrap_or_default(),
                args: parse_tool_args(&chunk.args),
            })
            .collect();

        let content = self.content.unwrap_or_default();

        let content = if tool_calls.is_empty() {
            content
        } else {
            let mut blocks = content.into_blocks();

            blocks.extend(
                self.tool_call_chunks
                    .iter()
                    .zip(&tool_calls)
                    .map(|(chunk, call)| {
                        ContentBlock::tool_call(&call.id, &call.name, call.args.clone()).with_default_index(chunk.index)
                    }),
            );

            // unindexed blocks sort first, matching the single block fast path where text
            // arrives as a plain string before any tool call starts
            blocks.sort_by_key(ContentBlock::index);

            Content::Blocks(blocks)
        };

        Message {
            role: Role::Assistant,
            content,
            id: self.id,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id: None,
            response_metadata: (!self.response_metadata.is_empty()).then_some(self.response_metadata),
            usage_metadata: self.usage_metadata,
        }
    }
}

/// One canonical stream increment: the newly generated text plus the message fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub text_delta: String,
    pub message: MessageChunk,
}

impl StreamChunk {
    pub fn concat(mut self, other: StreamChunk) -> StreamChunk {
        self.text_delta.push_str(&other.text_delta);
        self.message = self.message.concat(other.message);
        self
    }
}

/// Folds stream chunks in arrival order.
#[derive(Debug, Default)]
pub struct ChunkAccumulator {
    accumulated: Option<StreamChunk>,
}

impl ChunkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: StreamChunk) {
        self.accumulated = Some(match self.accumulated.take() {
            Some(accumulated) => accumulated.concat(chunk),
            None => chunk,
        });
    }

    /// All text generated so far.
    pub fn text(&self) -> &str {
        self.accumulated
            .as_ref()
            .map(|chunk| chunk.text_delta.as_str())
            .unwrap_or_default()
    }

    pub fn chunk(&self) -> Option<&StreamChunk> {
        self.accumulated.as_ref()
    }

    /// The final message. A stream that produced nothing yields an empty assistant message.
    pub fn finish(self) -> Message {
        self.accumulated.unwrap_or_default().message.into_message()
    }
}

fn concat_content(left: Content, right: Content) -> Content {
    match (left, right) {
        (Content::Text(mut left), Content::Text(right)) => {
            left.push_str(&right);
            Content::Text(left)
        }
        (left, right) => {
            let mut blocks = left.into_blocks();

            for block in right.into_blocks() {
                merge_block(&mut blocks, block);
            }

            Content::Blocks(blocks)
        }
    }
}

fn merge_block(blocks: &mut Vec<ContentBlock>, block: ContentBlock) {
    let target = match block.index() {
        Some(index) => blocks
            .iter_mut()
            .rev()
            .find(|existing| existing.index() == Some(index) && same_kind(existing, &block)),
        None => blocks
            .last_mut()
            .filter(|last| last.index().is_none() && same_kind(last, &block)),
    };

    let Some(target) = target else {
        blocks.push(block);
        return;
    };

    match (target, block) {
        (ContentBlock::Text(target), ContentBlock::Text(block)) => target.text.push_str(&block.text),
        (ContentBlock::Reasoning(target), ContentBlock::Reasoning(block)) => {
            target.text.push_str(&block.text);

            if block.signature.is_some() {
                target.signature = block.signature;
            }
        }
        (ContentBlock::ToolCall(target), ContentBlock::ToolCall(block)) => {
            if target.id.is_empty() {
                target.id = block.id;
            }

            if target.name.is_empty() {
                target.name = block.name;
            }

            match (&mut target.args, block.args) {
                (Value::String(existing), Value::String(fragment)) => existing.push_str(&fragment),
                (_, Value::Null) => (),
                (existing, args) => *existing = args,
            }
        }
        // same_kind only matches blocks of one variant
        _ => (),
    }
}

fn same_kind(left: &ContentBlock, right: &ContentBlock) -> bool {
    matches!(
        (left, right),
        (ContentBlock::Text(_), ContentBlock::Text(_))
            | (ContentBlock::Reasoning(_), ContentBlock::Reasoning(_))
            | (ContentBlock::ToolCall(_), ContentBlock::ToolCall(_))
    )
}

fn merge_tool_call_chunk(chunks: &mut Vec<ToolCallChunk>, chunk: ToolCallChunk) {
    let target = match chunk.index {
        Some(index) => chunks.iter_mut().find(|existing| existing.index == Some(index)),
        // fragments without an index continue the previous call unless they start a new one
        None if chunk.id.is_none() => chunks.last_mut(),
        None => None,
    };

    match target {
        Some(target) => {
            target.id = target.id.take().or(chunk.id);
            target.name = target.name.take().or(chunk.name);
            target.args.push_str(&chunk.args);
        }
        None => chunks.push(chunk),
    }
}

fn merge_metadata(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge_metadata(existing, incoming),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Parses streamed or complete tool-call arguments, keeping unparsable input as a string.
pub(crate) fn parse_tool_args(args: &str) -> Value {
    if args.trim().is_empty() {
        return Value::Object(Map::new());
    }

    match sonic_rs::from_str::<Value>(args) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("Tool call arguments are not valid JSON, keeping them as a string: {e}");
            Value::String(args.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;
    use serde_json::json;

    use super::*;
    use crate::messages::TextBlock;

    fn text_chunk(text: &str) -> MessageChunk {
        MessageChunk {
            content: Some(Content::from(text)),
            ..Default::default()
        }
    }

    fn block_chunk(blocks: Vec<ContentBlock>) -> MessageChunk {
        MessageChunk {
            content: Some(Content::Blocks(blocks)),
            ..Default::default()
        }
    }

    fn indexed_text(text: &str, index: u32) -> ContentBlock {
        ContentBlock::Text(TextBlock {
            text: text.to_string(),
            index: Some(index),
        })
    }

    #[test]
    fn string_content_concatenates() {
        let chunk = text_chunk("Hel").concat(text_chunk("lo"));

        assert_eq!(chunk.content, Some(Content::from("Hello")));
    }

    #[test]
    fn blocks_with_same_index_grow_in_place() {
        let chunk = block_chunk(vec![ContentBlock::reasoning("Let me").with_default_index(Some(0))])
            .concat(block_chunk(vec![ContentBlock::reasoning(" think").with_default_index(Some(0))]))
            .concat(block_chunk(vec![indexed_text("Hello", 1)]))
            .concat(block_chunk(vec![indexed_text(" world", 1)]));

        assert_json_snapshot!(chunk, @r#"
        {
          "content": [
            {
              "type": "reasoning",
              "text": "Let me think",
              "index": 0
            },
            {
              "type": "text",
              "text": "Hello world",
              "index": 1
            }
          ]
        }
        "#);
    }

    #[test]
    fn string_then_blocks_keeps_order() {
        let chunk = text_chunk("first").concat(block_chunk(vec![indexed_text("second", 1)]));

        assert_eq!(
            chunk.content,
            Some(Content::Blocks(vec![ContentBlock::text("first"), indexed_text("second", 1)]))
        );
    }

    #[test]
    fn absent_content_is_neutral() {
        let chunk = MessageChunk::default().concat(text_chunk("a")).concat(MessageChunk::default());

        assert_eq!(chunk.content, Some(Content::from("a")));
    }

    #[test]
    fn tool_call_fragments_merge_by_index() {
        let start = MessageChunk {
            tool_call_chunks: vec![ToolCallChunk {
                id: Some("call_1".into()),
                name: Some("search".into()),
                args: String::new(),
                index: Some(1),
            }],
            ..Default::default()
        };

        let fragment = |args: &str| MessageChunk {
            tool_call_chunks: vec![ToolCallChunk {
                args: args.to_string(),
                index: Some(1),
                ..Default::default()
            }],
            ..Default::default()
        };

        let message = text_chunk("Looking it up")
            .concat(start)
            .concat(fragment("{\"q\":"))
            .concat(fragment("\"rust\"}"))
            .into_message();

        assert_json_snapshot!(message, @r#"
        {
          "role": "assistant",
          "content": [
            {
              "type": "text",
              "text": "Looking it up"
            },
            {
              "type": "tool_call",
              "id": "call_1",
              "name": "search",
              "args": {
                "q": "rust"
              },
              "index": 1
            }
          ],
          "tool_calls": [
            {
              "id": "call_1",
              "name": "search",
              "args": {
                "q": "rust"
              }
            }
          ]
        }
        "#);
    }

    #[test]
    fn unparsable_arguments_stay_strings() {
        let chunk = MessageChunk {
            tool_call_chunks: vec![ToolCallChunk {
                id: Some("call_1".into()),
                name: Some("search".into()),
                args: "{\"q\":".into(),
                index: None,
            }],
            ..Default::default()
        };

        let calls = chunk.into_message().tool_calls.unwrap();

        assert_eq!(calls[0].args, json!("{\"q\":"));
    }

    #[test]
    fn empty_arguments_become_an_object() {
        assert_eq!(parse_tool_args(""), json!({}));
    }

    #[test]
    fn metadata_merges_recursively() {
        let first = MessageChunk {
            response_metadata: json!({ "bedrock": { "latencyMs": 10 }, "model": "a" })
                .as_object()
                .cloned()
                .unwrap(),
            ..Default::default()
        };

        let second = MessageChunk {
            response_metadata: json!({ "bedrock": { "stopReason": "end_turn" }, "model": "b" })
                .as_object()
                .cloned()
                .unwrap(),
            ..Default::default()
        };

        let merged = first.concat(second);

        assert_eq!(
            Value::Object(merged.response_metadata),
            json!({ "bedrock": { "latencyMs": 10, "stopReason": "end_turn" }, "model": "b" })
        );
    }

    #[test]
    fn accumulator_tracks_text_and_finishes() {
        let mut accumulator = ChunkAccumulator::new();

        for delta in ["Hel", "lo"] {
            accumulator.push(StreamChunk {
                text_delta: delta.to_string(),
                message: text_chunk(delta),
            });
        }

        assert_eq!(accumulator.text(), "Hello");

        let message = accumulator.finish();

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, Content::from("Hello"));
        assert_eq!(message.tool_calls, None);
    }

    #[test]
    fn empty_stream_finishes_with_empty_message() {
        let message = ChunkAccumulator::new().finish();

        assert!(message.content.is_empty());
    }
}
