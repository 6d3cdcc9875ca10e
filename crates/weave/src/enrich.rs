//! Turns raw provider stream fragments into canonical, appendable chunks.
//!
//! Providers tag every streamed delta with the index of the content block it belongs to.
//! While a stream only ever shows one block, string content is passed along untouched and
//! callers can concatenate it as plain text. As soon as a second distinct index is seen the
//! stream switches to block form for good, so deltas from different blocks can no longer be
//! interleaved into one string. Chunks emitted before the switch are never rewritten.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::{
    messages::{Content, ContentBlock, MessageChunk, StreamChunk, ToolCallChunk},
    scrub::scrub_object,
    usage::UsageMetadata,
};

/// Transient metadata key carrying a delta's content-block index.
pub const CONTENT_BLOCK_INDEX: &str = "contentBlockIndex";

/// The content-block indices seen so far on one stream.
///
/// Owned by the caller, one per in-flight stream. Feeding chunks of two unrelated streams
/// into the same set groups their blocks incorrectly and is not detected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockIndexSet {
    indices: BTreeSet<u32>,
}

/// Content shape of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    /// At most one distinct block index seen; string content stays a string.
    SingleBlock,
    /// Two or more distinct block indices seen; content is always in block form.
    MultiBlock,
}

impl BlockIndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an index. Returns true when the index was not seen before.
    pub fn observe(&mut self, index: u32) -> bool {
        self.indices.insert(index)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.indices.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn mode(&self) -> BlockMode {
        if self.indices.len() >= 2 {
            BlockMode::MultiBlock
        } else {
            BlockMode::SingleBlock
        }
    }
}

/// A provider delta decoded into canonical fields, before enrichment.
///
/// The block index travels as [`CONTENT_BLOCK_INDEX`] inside `response_metadata`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawChunk {
    pub id: Option<String>,
    pub content: Option<Content>,
    pub tool_call_chunks: Vec<ToolCallChunk>,
    pub response_metadata: Map<String, Value>,
    pub usage_metadata: Option<UsageMetadata>,
}

impl RawChunk {
    pub fn block_index(&self) -> Option<u32> {
        self.response_metadata
            .get(CONTENT_BLOCK_INDEX)
            .and_then(Value::as_u64)
            .and_then(|index| u32::try_from(index).ok())
    }

    pub(crate) fn with_block_index(mut self, index: u32) -> Self {
        self.response_metadata
            .insert(CONTENT_BLOCK_INDEX.to_string(), Value::from(index));

        self
    }
}

/// Enriches one raw chunk. Chunks must be fed in arrival order.
pub fn enrich(raw: RawChunk, blocks: &mut BlockIndexSet) -> StreamChunk {
    let index = raw.block_index();

    if let Some(index) = index {
        blocks.observe(index);
    }

    let response_metadata = scrub_object(&raw.response_metadata, CONTENT_BLOCK_INDEX);
    let content = raw.content.map(|content| shape_content(content, index, blocks.mode()));

    let tool_call_chunks = raw
        .tool_call_chunks
        .into_iter()
        .map(|chunk| ToolCallChunk {
            index: chunk.index.or(index),
            ..chunk
        })
        .collect();

    let text_delta = content.as_ref().map(Content::text).unwrap_or_default();

    StreamChunk {
        text_delta,
        message: MessageChunk {
            id: raw.id,
            content,
            tool_call_chunks,
            response_metadata,
            usage_metadata: raw.usage_metadata,
        },
    }
}

fn shape_content(content: Content, index: Option<u32>, mode: BlockMode) -> Content {
    match (content, mode) {
        (Content::Text(text), BlockMode::SingleBlock) => Content::Text(text),
        (Content::Text(text), BlockMode::MultiBlock) => {
            Content::Blocks(vec![ContentBlock::text(text).with_default_index(index)])
        }
        (Content::Blocks(blocks), _) => Content::Blocks(
            blocks
                .into_iter()
                .map(|block| block.with_default_index(index))
                .collect(),
        ),
    }
}
