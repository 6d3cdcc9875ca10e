//! Provider wire formats, as serde types.

pub mod bedrock;
pub mod openrouter;
