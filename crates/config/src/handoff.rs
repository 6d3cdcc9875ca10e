use serde::Deserialize;

/// Role given to the message that carries handoff instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceRole {
    #[default]
    User,
    System,
}

/// Settings for handing a conversation from one agent to another.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandoffConfig {
    /// Role of the appended guidance message when the history does not end in a tool result.
    pub guidance_role: GuidanceRole,
    /// Inserted between existing tool output and the appended instructions.
    pub separator: String,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            guidance_role: GuidanceRole::User,
            separator: "\n\n".to_string(),
        }
    }
}
