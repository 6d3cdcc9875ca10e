use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use config::ServiceTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    Bedrock,
    Openrouter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Input holds stream events, one JSON object per line
    Stream,
    /// Input is one non-streamed response body
    Response,
    /// Input is a JSON array of canonical messages; prints the request body
    Request,
}

/// Replays recorded provider output through the weave engine.
#[derive(Debug, Parser)]
#[command(name = "weave-replay", version)]
pub struct Args {
    /// Recorded provider output, or canonical messages in request mode
    pub input: PathBuf,

    /// What the input file holds
    #[arg(long, value_enum, default_value_t = Mode::Stream)]
    pub mode: Mode,

    /// Format of the recorded events
    #[arg(short, long, value_enum, default_value_t = ProviderKind::Bedrock)]
    pub provider: ProviderKind,

    /// Model identifier the recording was made with
    #[arg(short, long, default_value = "unknown")]
    pub model: String,

    /// Path to the TOML configuration file
    #[arg(short, long, env = "WEAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "weave=debug"
    #[arg(long, env = "WEAVE_LOG", default_value = "info")]
    pub log: String,

    /// Overrides `converse.stream_usage` from the configuration
    #[arg(long)]
    pub stream_usage: Option<bool>,

    /// Overrides `converse.service_tier` from the configuration
    #[arg(long)]
    pub service_tier: Option<ServiceTier>,

    /// Handoff instructions appended to the messages in request mode
    #[arg(long)]
    pub handoff: Option<String>,
}
