//! Provider-neutral conversation messages, with adapters for Amazon Bedrock Converse and
//! OpenRouter chat completions.
//!
//! Streams are normalized chunk by chunk: a stream that only ever carries one content block
//! keeps plain string content, and one that reveals several indices switches to indexed
//! blocks so the accumulated message keeps reasoning, text and tool calls apart.

mod enrich;
mod error;
mod handoff;
pub mod messages;
pub mod protocol;
pub mod provider;
mod scrub;
mod stream;
mod usage;

pub use enrich::{BlockIndexSet, BlockMode, CONTENT_BLOCK_INDEX, RawChunk, enrich};
pub use error::{Error, Result};
pub use handoff::{Handoff, prepare_handoff};
pub use provider::{CallOptions, Provider};
pub use scrub::{scrub, scrub_object, scrub_value};
pub use stream::EnrichedStream;
pub use usage::{InputTokenDetails, OutputTokenDetails, ProviderUsage, UsageMetadata, UsageOptions, extract_usage};
