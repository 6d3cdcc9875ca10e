#![allow(clippy::panic)]

use config::ConverseConfig;
use futures::{StreamExt, stream};
use indoc::indoc;
use weave::{
    BlockMode, CallOptions, Provider,
    messages::{ChunkAccumulator, Content, ContentBlock, Message},
    provider::{Bedrock, OpenRouter},
};

fn without_indices(message: &Message) -> Vec<ContentBlock> {
    message
        .content
        .blocks()
        .iter()
        .cloned()
        .map(|block| match block {
            ContentBlock::Text(mut block) => {
                block.index = None;
                ContentBlock::Text(block)
            }
            ContentBlock::ToolCall(mut block) => {
                block.index = None;
                ContentBlock::ToolCall(block)
            }
            ContentBlock::ToolResult(mut block) => {
                block.index = None;
                ContentBlock::ToolResult(block)
            }
            ContentBlock::Reasoning(mut block) => {
                block.index = None;
                ContentBlock::Reasoning(block)
            }
            unknown => unknown,
        })
        .collect()
}

async fn accumulate<P: Provider>(provider: &P, lines: &str) -> (Message, String, BlockMode) {
    let events: Vec<P::StreamEvent> = lines
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| provider.parse_event(line).unwrap())
        .collect();

    let mut stream = provider.enrich_stream(stream::iter(events), CallOptions::default());
    let mut accumulator = ChunkAccumulator::new();

    while let Some(chunk) = stream.next().await {
        accumulator.push(chunk);
    }

    let mode = stream.blocks().mode();
    let text = accumulator.text().to_string();

    (accumulator.finish(), text, mode)
}

#[tokio::test]
async fn bedrock_stream_matches_the_response() {
    let bedrock = Bedrock::new("us.anthropic.claude-sonnet-4-20250514-v1:0", ConverseConfig::default());

    let events = indoc! {r#"
        {"messageStart":{"role":"assistant"}}
        {"contentBlockDelta":{"contentBlockIndex":0,"delta":{"reasoningContent":{"text":"The user wants "}}}}
        {"contentBlockDelta":{"contentBlockIndex":0,"delta":{"reasoningContent":{"text":"a search."}}}}
        {"contentBlockDelta":{"contentBlockIndex":0,"delta":{"reasoningContent":{"signature":"c2lnbmF0dXJl"}}}}
        {"contentBlockStop":{"contentBlockIndex":0}}
        {"contentBlockDelta":{"contentBlockIndex":1,"delta":{"text":"Searching"}}}
        {"contentBlockDelta":{"contentBlockIndex":1,"delta":{"text":" now."}}}
        {"contentBlockStop":{"contentBlockIndex":1}}
        {"contentBlockStart":{"contentBlockIndex":2,"start":{"toolUse":{"toolUseId":"tooluse_1","name":"search"}}}}
        {"contentBlockDelta":{"contentBlockIndex":2,"delta":{"toolUse":{"input":"{\"q\":"}}}}
        {"contentBlockDelta":{"contentBlockIndex":2,"delta":{"toolUse":{"input":"\"rust\"}"}}}}
        {"contentBlockStop":{"contentBlockIndex":2}}
        {"messageStop":{"stopReason":"tool_use"}}
        {"metadata":{"usage":{"inputTokens":20,"outputTokens":15,"totalTokens":35},"metrics":{"latencyMs":900}}}
    "#};

    let response = indoc! {r#"
        {
          "output": {
            "message": {
              "role": "assistant",
              "content": [
                { "reasoningContent": { "reasoningText": { "text": "The user wants a search.", "signature": "c2lnbmF0dXJl" } } },
                { "text": "Searching now." },
                { "toolUse": { "toolUseId": "tooluse_1", "name": "search", "input": { "q": "rust" } } }
              ]
            }
          },
          "stopReason": "tool_use",
          "usage": { "inputTokens": 20, "outputTokens": 15, "totalTokens": 35 }
        }
    "#};

    let (streamed, text, mode) = accumulate(&bedrock, events).await;
    let expected = bedrock.decode_response(bedrock.parse_response(response).unwrap());

    assert_eq!(mode, BlockMode::MultiBlock);
    assert_eq!(text, "Searching now.");
    assert_eq!(without_indices(&streamed), without_indices(&expected));
    assert_eq!(streamed.tool_calls, expected.tool_calls);
    assert_eq!(streamed.usage_metadata, expected.usage_metadata);

    let indices: Vec<_> = streamed.content.blocks().iter().map(ContentBlock::index).collect();
    assert_eq!(indices, [Some(0), Some(1), Some(2)]);

    let metadata = streamed.response_metadata.unwrap_or_default();
    assert!(!metadata.contains_key(weave::CONTENT_BLOCK_INDEX));
    assert_eq!(metadata.get("stopReason"), Some(&serde_json::json!("tool_use")));
}

#[tokio::test]
async fn bedrock_single_block_stream_stays_text() {
    let bedrock = Bedrock::new("amazon.nova-pro-v1:0", ConverseConfig::default());

    let events = indoc! {r#"
        {"messageStart":{"role":"assistant"}}
        {"contentBlockDelta":{"contentBlockIndex":0,"delta":{"text":"Hello"}}}
        {"contentBlockDelta":{"contentBlockIndex":0,"delta":{"text":" world"}}}
        {"contentBlockStop":{"contentBlockIndex":0}}
        {"messageStop":{"stopReason":"end_turn"}}
    "#};

    let (streamed, text, mode) = accumulate(&bedrock, events).await;

    assert_eq!(mode, BlockMode::SingleBlock);
    assert_eq!(text, "Hello world");
    assert_eq!(streamed.content, Content::from("Hello world"));
    assert!(streamed.id.is_some_and(|id| id.starts_with("bedrock-")));
}

#[tokio::test]
async fn openrouter_stream_matches_the_response() {
    let openrouter = OpenRouter::new("deepseek/deepseek-r1", ConverseConfig::default());

    let events = indoc! {r#"
        {"id":"gen-1","model":"deepseek/deepseek-r1","choices":[{"index":0,"delta":{"role":"assistant","reasoning":"Needs "}}]}
        {"id":"gen-1","model":"deepseek/deepseek-r1","choices":[{"index":0,"delta":{"reasoning":"a lookup."}}]}
        {"id":"gen-1","model":"deepseek/deepseek-r1","choices":[{"index":0,"delta":{"content":"Looking it up."}}]}
        {"id":"gen-1","model":"deepseek/deepseek-r1","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"search","arguments":"{\"q\":"}}]}}]}
        {"id":"gen-1","model":"deepseek/deepseek-r1","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"rust\"}"}}]}}]}
        {"id":"gen-1","model":"deepseek/deepseek-r1","choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}
        {"id":"gen-1","model":"deepseek/deepseek-r1","choices":[],"usage":{"prompt_tokens":9,"completion_tokens":11,"total_tokens":20}}
    "#};

    let response = indoc! {r#"
        {
          "id": "gen-1",
          "model": "deepseek/deepseek-r1",
          "choices": [{
            "index": 0,
            "message": {
              "role": "assistant",
              "content": "Looking it up.",
              "reasoning": "Needs a lookup.",
              "tool_calls": [{ "id": "call_1", "type": "function", "function": { "name": "search", "arguments": "{\"q\":\"rust\"}" } }]
            },
            "finish_reason": "tool_calls"
          }],
          "usage": { "prompt_tokens": 9, "completion_tokens": 11, "total_tokens": 20 }
        }
    "#};

    let (streamed, text, mode) = accumulate(&openrouter, events).await;
    let expected = openrouter.decode_response(openrouter.parse_response(response).unwrap());

    assert_eq!(mode, BlockMode::MultiBlock);
    assert_eq!(text, "Looking it up.");
    assert_eq!(streamed.id, expected.id);
    assert_eq!(without_indices(&streamed), without_indices(&expected));
    assert_eq!(streamed.tool_calls, expected.tool_calls);
    assert_eq!(streamed.usage_metadata, expected.usage_metadata);
    assert_eq!(streamed.response_metadata, expected.response_metadata);
}

#[tokio::test]
async fn disabled_stream_usage_leaves_usage_empty() {
    let openrouter = OpenRouter::new(
        "openai/gpt-4o-mini",
        ConverseConfig {
            stream_usage: false,
            ..Default::default()
        },
    );

    let events = indoc! {r#"
        {"id":"gen-2","choices":[{"index":0,"delta":{"content":"Hi"}}]}
        {"id":"gen-2","choices":[],"usage":{"prompt_tokens":1,"completion_tokens":1,"total_tokens":2}}
    "#};

    let (streamed, _, _) = accumulate(&openrouter, events).await;

    assert_eq!(streamed.content, Content::from("Hi"));
    assert_eq!(streamed.usage_metadata, None);
}

#[test]
fn malformed_event_is_a_decode_error() {
    let bedrock = Bedrock::new("amazon.nova-lite-v1:0", ConverseConfig::default());

    let error = bedrock.parse_event("{not json").unwrap_err();

    assert!(error.to_string().starts_with("Failed to decode bedrock stream event"));
}
