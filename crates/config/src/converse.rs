//! Request and stream defaults shared by every provider format.

use serde::{Deserialize, Serialize};

/// Provider-side processing tier.
///
/// Forwarded verbatim into the provider request when set, omitted otherwise.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceTier {
    Priority,
    Default,
    Flex,
    Reserved,
}

/// Defaults for converse-style calls. Every field can be overridden per call.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverseConfig {
    /// Whether streamed chunks carry usage metadata.
    pub stream_usage: bool,
    /// Service tier sent with every request unless the call sets its own.
    pub service_tier: Option<ServiceTier>,
    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop_sequences: Vec<String>,
}

impl Default for ConverseConfig {
    fn default() -> Self {
        Self {
            stream_usage: true,
            service_tier: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop_sequences: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::ServiceTier;

    #[test]
    fn service_tier_parses_lowercase_names() {
        assert_eq!(ServiceTier::from_str("flex").unwrap(), ServiceTier::Flex);
        assert_eq!(ServiceTier::from_str("priority").unwrap(), ServiceTier::Priority);
        assert!(ServiceTier::from_str("turbo").is_err());
    }

    #[test]
    fn service_tier_displays_wire_name() {
        assert_eq!(ServiceTier::Reserved.to_string(), "reserved");
        assert_eq!(ServiceTier::Default.as_ref(), "default");
    }
}
