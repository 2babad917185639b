//! Built-in vendor pipelines.
//!
//! One pipeline per vendor/model family, each pairing a prefix
//! predicate with a single invocation task and the payload shaping the
//! vendor's invoke body expects. The registration order here is the
//! routing order.

use anyhow::anyhow;
use serde_json::{Value, json};

use crate::dispatch::RetryPolicy;
use crate::pipeline::Pipeline;
use crate::router::RoutePredicate;
use crate::task::InvocationTask;

/// The ordered default pipeline set, one per vendor family.
pub fn default_pipelines(retry: RetryPolicy) -> Vec<Pipeline> {
    vec![
        Pipeline::new("anthropic", RoutePredicate::Prefix("anthropic.".into()))
            .pre(anthropic_request)
            .post(anthropic_completion)
            .task(InvocationTask::new("model/{model}/invoke").with_retry(retry.clone())),
        Pipeline::new("titan", RoutePredicate::Prefix("amazon.titan".into()))
            .pre(titan_request)
            .post(titan_completion)
            .task(InvocationTask::new("model/{model}/invoke").with_retry(retry.clone())),
        Pipeline::new("stability", RoutePredicate::Prefix("stability.".into()))
            .pre(stability_request)
            .post(stability_image)
            .task(InvocationTask::new("model/{model}/invoke").with_retry(retry)),
    ]
}

fn prompt_of(payload: &Value) -> anyhow::Result<&str> {
    payload
        .get("prompt")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("payload is missing string field 'prompt'"))
}

fn max_tokens_of(payload: &Value) -> u64 {
    payload
        .get("max_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(1024)
}

fn anthropic_request(payload: &Value) -> anyhow::Result<Value> {
    let prompt = prompt_of(payload)?;
    Ok(json!({
        "prompt": format!("\n\nHuman: {prompt}\n\nAssistant:"),
        "max_tokens_to_sample": max_tokens_of(payload),
    }))
}

fn anthropic_completion(raw: &Value) -> anyhow::Result<Value> {
    let completion = raw
        .get("completion")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("response is missing field 'completion'"))?;
    Ok(json!({"completion": completion.trim()}))
}

fn titan_request(payload: &Value) -> anyhow::Result<Value> {
    let prompt = prompt_of(payload)?;
    Ok(json!({
        "inputText": prompt,
        "textGenerationConfig": {"maxTokenCount": max_tokens_of(payload)},
    }))
}

fn titan_completion(raw: &Value) -> anyhow::Result<Value> {
    let text = raw
        .get("results")
        .and_then(|results| results.get(0))
        .and_then(|first| first.get("outputText"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("response is missing 'results[0].outputText'"))?;
    Ok(json!({"completion": text.trim()}))
}

fn stability_request(payload: &Value) -> anyhow::Result<Value> {
    let prompt = prompt_of(payload)?;
    Ok(json!({
        "text_prompts": [{"text": prompt}],
        "cfg_scale": payload.get("cfg_scale").and_then(Value::as_u64).unwrap_or(7),
    }))
}

fn stability_image(raw: &Value) -> anyhow::Result<Value> {
    let image = raw
        .get("artifacts")
        .and_then(|artifacts| artifacts.get(0))
        .and_then(|first| first.get("base64"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("response is missing 'artifacts[0].base64'"))?;
    Ok(json!({"image_base64": image}))
}
