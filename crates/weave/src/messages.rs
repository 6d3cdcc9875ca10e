//! Canonical conversation messages and their streaming fragments.

mod canonical;
mod chunk;

pub use canonical::{
    Content, ContentBlock, Message, ReasoningBlock, Role, TextBlock, ToolCall, ToolCallBlock, ToolChoice,
    ToolDefinition, ToolResultBlock,
};
pub(crate) use chunk::parse_tool_args;
pub use chunk::{ChunkAccumulator, MessageChunk, StreamChunk, ToolCallChunk};
