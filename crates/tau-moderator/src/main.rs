mod action_outputs;
mod bootstrap_helpers;
mod cli_args;
mod event_input;

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tau_ai::{OpenAiClient, OpenAiConfig};
use tau_github_client::{GithubApiClient, GithubApiClientConfig};
use tau_moderation::{
    check_policy_connection, ActionKind, ActionResult, ModerationConfig, ModerationPipeline,
    TracingObserver,
};

use crate::action_outputs::write_action_outputs;
use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;
use crate::event_input::load_event;

/// File settings first, then any flag or environment override.
fn resolve_config(cli: &Cli) -> Result<ModerationConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            ModerationConfig::from_toml_str(&raw)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => ModerationConfig::default(),
    };
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(threshold) = cli.severity_threshold {
        config.severity_threshold = threshold;
    }
    if let Some(limit) = cli.max_recent_comments {
        config.max_recent_comments = limit;
    }
    config.validate()?;
    Ok(config)
}

fn build_llm_client(cli: &Cli) -> Result<OpenAiClient> {
    let api_key = cli
        .openai_api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .unwrap_or_else(|| cli.github_token.clone());
    let mut config = OpenAiConfig::with_defaults(cli.openai_base_url.clone(), api_key);
    config.request_timeout_ms = cli.request_timeout_ms;
    config.max_retries = cli.retry_max_attempts.saturating_sub(1);
    OpenAiClient::new(config).context("failed to create completion client")
}

fn build_github_client(cli: &Cli) -> Result<GithubApiClient> {
    GithubApiClient::new(GithubApiClientConfig {
        api_base: cli.github_api_base.clone(),
        token: cli.github_token.clone(),
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    })
    .context("failed to create github client")
}

fn report_result(result: &ActionResult) {
    if result.action_taken == ActionKind::None {
        tracing::info!("Moderation completed: none - {}", result.reason);
    } else {
        tracing::warn!(
            "Moderation action taken: {} - {}",
            result.action_taken,
            result.reason
        );
    }
}

async fn run_connection_check(cli: &Cli, config: &ModerationConfig) -> Result<()> {
    let client = build_llm_client(cli)?;
    if check_policy_connection(&client, &config.model, &TracingObserver).await {
        println!("policy connection ok");
        Ok(())
    } else {
        bail!("policy connection check failed for model {}", config.model)
    }
}

async fn run_moderation(cli: &Cli, config: &ModerationConfig) -> Result<()> {
    let event_name = cli
        .event_name
        .as_deref()
        .ok_or_else(|| anyhow!("--event-name (GITHUB_EVENT_NAME) is required"))?;
    let event_path = cli
        .event_path
        .as_deref()
        .ok_or_else(|| anyhow!("--event-path (GITHUB_EVENT_PATH) is required"))?;
    let event = load_event(event_name, event_path, cli.repository.as_deref())?;

    let pipeline = ModerationPipeline::new(
        Arc::new(build_github_client(cli)?),
        Arc::new(build_llm_client(cli)?),
        config,
    );
    let result = pipeline.run(&event).await;
    report_result(&result);

    if let Some(path) = &cli.output_path {
        write_action_outputs(path, &result)?;
    }
    println!(
        "{}",
        serde_json::to_string(&result).context("failed to serialize result")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let config = resolve_config(&cli)?;
    if cli.check_connection {
        run_connection_check(&cli, &config).await
    } else {
        run_moderation(&cli, &config).await
    }
}
