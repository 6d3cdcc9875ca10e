use anyhow::Context;
use args::{Args, Mode, ProviderKind};
use clap::Parser;
use config::Config;
use futures::{StreamExt, stream};
use weave::{
    CallOptions, Handoff, Provider,
    messages::{ChunkAccumulator, Message},
    provider::{Bedrock, OpenRouter},
};

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init(&args.log)?;

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    let input = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let options = CallOptions {
        stream_usage: args.stream_usage,
        service_tier: args.service_tier,
        ..Default::default()
    };

    match args.provider {
        ProviderKind::Bedrock => {
            let provider = Bedrock::new(&args.model, config.converse.clone());
            run(&provider, &args, &config, &input, options).await
        }
        ProviderKind::Openrouter => {
            let provider = OpenRouter::new(&args.model, config.converse.clone());
            run(&provider, &args, &config, &input, options).await
        }
    }
}

async fn run<P: Provider>(
    provider: &P,
    args: &Args,
    config: &Config,
    input: &str,
    options: CallOptions,
) -> anyhow::Result<()> {
    match args.mode {
        Mode::Stream => replay_stream(provider, input, options).await,
        Mode::Response => {
            let response = provider.parse_response(input)?;
            let message = provider.decode_response(response);

            println!("{}", sonic_rs::to_string_pretty(&message)?);

            Ok(())
        }
        Mode::Request => {
            let messages: Vec<Message> = sonic_rs::from_str(input).context("Input is not a list of messages")?;

            let messages = match &args.handoff {
                Some(instructions) => Handoff::from_config(&config.handoff).prepare(messages, instructions),
                None => messages,
            };

            let request = provider.build_request(messages, &options, true)?;

            println!("{}", sonic_rs::to_string_pretty(&request)?);

            Ok(())
        }
    }
}

async fn replay_stream<P: Provider>(provider: &P, input: &str, options: CallOptions) -> anyhow::Result<()> {
    let mut events = Vec::new();

    for (number, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match provider.parse_event(line) {
            Ok(event) => events.push(event),
            Err(e) => log::warn!("Skipping line {}: {e}", number + 1),
        }
    }

    log::info!("Replaying {} {} stream events", events.len(), P::NAME);

    let mut chunks = provider.enrich_stream(stream::iter(events), options);
    let mut accumulator = ChunkAccumulator::new();

    while let Some(chunk) = chunks.next().await {
        println!("{}", sonic_rs::to_string(&chunk)?);
        accumulator.push(chunk);
    }

    log::debug!(
        "Stream used {} block indices, ending in {:?} mode",
        chunks.blocks().len(),
        chunks.blocks().mode()
    );

    println!("{}", sonic_rs::to_string_pretty(&accumulator.finish())?);

    Ok(())
}
