use std::sync::Arc;

use clap::Parser;
use serde_json::{Value, json};

use rumo::catalog;
use rumo::cli::{Cli, Command};
use rumo::compute::{ComputeError, ComputeService, HttpComputeClient};
use rumo::config::RumoConfig;
use rumo::dispatch::{AuditRecord, Job, Outcome};
use rumo::engine::DispatchEngine;
use rumo::error::RumoError;
use rumo::status::MemorySink;
use rumo::ui::DispatchProgress;

const FALLBACK_MESSAGE: &str = "no pipeline registered for model '{model}'";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = RumoConfig::load()?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.max_attempts = max_attempts;
    }

    match cli.command {
        Command::Dispatch {
            model,
            prompt,
            file,
            job_id,
            item_id,
        } => {
            let payload = load_payload(prompt, file)?;
            let client = HttpComputeClient::new(config.endpoint.clone(), config.api_key.clone());
            let engine =
                DispatchEngine::new(catalog::default_pipelines(config.retry_policy()), client)
                    .with_fallback_message(FALLBACK_MESSAGE);

            let mut job = Job::new(model, payload);
            if let Some(id) = job_id {
                job.id = id;
            }
            if let Some(id) = item_id {
                job.item_id = id;
            }

            let progress = DispatchProgress::start(&job.model_id);
            let outcome = engine.dispatch(&mut job).await;
            progress.complete(&outcome);
            if let Outcome::Success(result) = &outcome {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
            if cli.verbose {
                progress.print_audit(&AuditRecord::from_job(&job));
            }
            if matches!(outcome, Outcome::Failure(_)) {
                std::process::exit(1);
            }
        }

        Command::Routes => {
            let client = HttpComputeClient::new(config.endpoint.clone(), config.api_key.clone());
            let engine =
                DispatchEngine::new(catalog::default_pipelines(config.retry_policy()), client);
            println!("Routing table (first match wins):");
            for (position, pipeline) in engine.pipelines().iter().enumerate() {
                let operations: Vec<&str> = pipeline
                    .tasks
                    .iter()
                    .map(|task| task.operation.as_str())
                    .collect();
                println!(
                    "  {}. {:<12} {} → {}",
                    position + 1,
                    pipeline.name,
                    pipeline.predicate,
                    operations.join(" → ")
                );
            }
            println!("  *. fallback     {FALLBACK_MESSAGE}");
        }

        Command::Demo => run_demo(&config).await?,
    }

    Ok(())
}

fn load_payload(prompt: Option<String>, file: Option<String>) -> Result<Value, RumoError> {
    match (prompt, file) {
        (Some(prompt), _) => Ok(json!({"prompt": prompt})),
        (None, Some(path)) => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        (None, None) => Err(RumoError::Payload(
            "provide --prompt or --file with the job payload".into(),
        )),
    }
}

/// Offline stand-in for the compute service, returning vendor-shaped
/// canned responses.
struct EchoCompute;

impl ComputeService for EchoCompute {
    async fn invoke(&self, operation: &str, _payload: &Value) -> Result<Value, ComputeError> {
        if operation.contains("amazon.titan") {
            Ok(json!({"results": [{"outputText": "echo from the titan pipeline"}]}))
        } else if operation.contains("stability.") {
            Ok(json!({"artifacts": [{"base64": "ZGVtbw=="}]}))
        } else {
            Ok(json!({"completion": "echo from the anthropic pipeline"}))
        }
    }
}

/// Walk three jobs through the state machine without touching the
/// network: two routed vendor families and one unrecognized model.
async fn run_demo(config: &RumoConfig) -> anyhow::Result<()> {
    let sink = Arc::new(MemorySink::new());
    let engine =
        DispatchEngine::new(catalog::default_pipelines(config.retry_policy()), EchoCompute)
            .with_fallback_message(FALLBACK_MESSAGE)
            .with_status_sink(sink.clone());

    for model in [
        "anthropic.claude-3-sonnet",
        "amazon.titan-text-express-v1",
        "unknown.modelX",
    ] {
        let mut job = Job::new(model, json!({"prompt": "say hello"}));
        let progress = DispatchProgress::start(model);
        let outcome = engine.dispatch(&mut job).await;
        progress.complete(&outcome);
        progress.print_audit(&AuditRecord::from_job(&job));
    }

    println!("\nStatus sink transitions:");
    for record in sink.records() {
        println!(
            "  job={} item={} status={:?}",
            record.job_id, record.item_id, record.status
        );
    }
    Ok(())
}
