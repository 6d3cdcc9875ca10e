//! Token accounting extracted from provider usage payloads.
//!
//! Cache details are reported as a pair: present when the provider reported at least one
//! cache counter, absent when it reported neither. A provider that never attempted caching
//! and one that attempted it with zero hits therefore stay distinguishable.

use serde::{Deserialize, Serialize};

/// Canonical token usage attached to a message or stream chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token_details: Option<InputTokenDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_token_details: Option<OutputTokenDetails>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTokenDetails {
    /// Prompt tokens served from the provider's cache.
    pub cache_read: u32,
    /// Prompt tokens written to the provider's cache.
    pub cache_creation: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTokenDetails {
    pub reasoning: u32,
}

impl UsageMetadata {
    /// Sums two usage reports, as emitted by consecutive chunks of one stream.
    pub fn merge(self, other: UsageMetadata) -> UsageMetadata {
        let input_token_details = match (self.input_token_details, other.input_token_details) {
            (Some(left), Some(right)) => Some(InputTokenDetails {
                cache_read: left.cache_read.saturating_add(right.cache_read),
                cache_creation: left.cache_creation.saturating_add(right.cache_creation),
            }),
            (left, right) => left.or(right),
        };

        let output_token_details = match (self.output_token_details, other.output_token_details) {
            (Some(left), Some(right)) => Some(OutputTokenDetails {
                reasoning: left.reasoning.saturating_add(right.reasoning),
            }),
            (left, right) => left.or(right),
        };

        UsageMetadata {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
            input_token_details,
            output_token_details,
        }
    }
}

/// Per-call switches for usage extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageOptions {
    /// Usage accounting is opt-in per call. When false nothing is extracted.
    pub stream_usage: bool,
}

/// A provider's raw usage payload.
pub trait ProviderUsage {
    fn input_tokens(&self) -> u32;

    fn output_tokens(&self) -> u32;

    fn total_tokens(&self) -> u32;

    /// Cache-hit prompt tokens, `None` when the provider did not report the field.
    fn cache_read_tokens(&self) -> Option<u32>;

    /// Cache-write prompt tokens, `None` when the provider did not report the field.
    fn cache_write_tokens(&self) -> Option<u32>;

    fn reasoning_tokens(&self) -> Option<u32> {
        None
    }
}

/// Maps a provider usage payload into [`UsageMetadata`].
pub fn extract_usage<U>(raw: &U, options: UsageOptions) -> Option<UsageMetadata>
where
    U: ProviderUsage + ?Sized,
{
    if !options.stream_usage {
        return None;
    }

    let input_token_details = match (raw.cache_read_tokens(), raw.cache_write_tokens()) {
        (None, None) => None,
        (read, write) => Some(InputTokenDetails {
            cache_read: read.unwrap_or(0),
            cache_creation: write.unwrap_or(0),
        }),
    };

    let output_token_details = raw
        .reasoning_tokens()
        .map(|reasoning| OutputTokenDetails { reasoning });

    Some(UsageMetadata {
        input_tokens: raw.input_tokens(),
        output_tokens: raw.output_tokens(),
        total_tokens: raw.total_tokens(),
        input_token_details,
        output_token_details,
    })
}
