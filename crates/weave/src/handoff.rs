//! Handing a conversation from one agent to the next.
//!
//! Several providers reject a user turn directly after a tool result. When the filtered
//! history ends in a tool result, the handoff instructions are therefore folded into that
//! message instead of being appended as a new one.

use config::{GuidanceRole, HandoffConfig};

use crate::messages::{Content, ContentBlock, Message, Role};

/// How handoff instructions are injected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    /// Role of the appended guidance message.
    pub guidance_role: Role,
    /// Placed between existing tool output and the instructions.
    pub separator: String,
}

impl Default for Handoff {
    fn default() -> Self {
        Self::from_config(&HandoffConfig::default())
    }
}

impl Handoff {
    pub fn from_config(config: &HandoffConfig) -> Self {
        let guidance_role = match config.guidance_role {
            GuidanceRole::User => Role::User,
            GuidanceRole::System => Role::System,
        };

        Self {
            guidance_role,
            separator: config.separator.clone(),
        }
    }

    /// Adds `instructions` to the end of `messages`.
    ///
    /// A trailing tool result gains the instructions as an extra text segment and the message
    /// count stays the same. Otherwise a guidance message is appended. Empty instructions
    /// leave the sequence untouched.
    pub fn prepare(&self, mut messages: Vec<Message>, instructions: &str) -> Vec<Message> {
        if instructions.is_empty() {
            return messages;
        }

        match messages.last_mut() {
            Some(last) if last.is_tool_result() => {
                log::debug!("Folding handoff instructions into the trailing tool result");
                append_to_tool_result(last, instructions, &self.separator);
            }
            _ => messages.push(Message::new(self.guidance_role, instructions)),
        }

        messages
    }
}

/// [`Handoff::prepare`] with the default settings.
pub fn prepare_handoff(messages: Vec<Message>, instructions: &str) -> Vec<Message> {
    Handoff::default().prepare(messages, instructions)
}

fn append_to_tool_result(message: &mut Message, instructions: &str, separator: &str) {
    // a trailing tagged result takes the text, whatever the role, so no bare text block follows it
    if let Content::Blocks(blocks) = &mut message.content
        && let Some(ContentBlock::ToolResult(result)) = blocks.last_mut()
    {
        result.content.append_text(instructions, separator);
        return;
    }

    message.content.append_text(instructions, separator);
}
