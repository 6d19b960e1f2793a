use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tau_ai::DEFAULT_GITHUB_MODELS_API_BASE;
use tau_github_client::DEFAULT_GITHUB_API_BASE;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_severity_threshold(value: &str) -> Result<u8, String> {
    let parsed = value
        .parse::<u8>()
        .map_err(|error| format!("failed to parse severity: {error}"))?;
    if !(1..=10).contains(&parsed) {
        return Err("value must be between 1 and 10".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "tau-moderator",
    about = "Moderates GitHub issues, pull requests, discussions, and comments with a language model",
    version
)]
/// Command line and GitHub Actions environment for one moderation run.
pub(crate) struct Cli {
    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "Token used for GitHub API access"
    )]
    pub(crate) github_token: String,

    #[arg(
        long = "github-api-base",
        env = "GITHUB_API_URL",
        default_value = DEFAULT_GITHUB_API_BASE,
        help = "GitHub REST API base URL (GraphQL endpoint is derived from it)"
    )]
    pub(crate) github_api_base: String,

    #[arg(
        long = "openai-base-url",
        env = "TAU_MODERATOR_OPENAI_BASE_URL",
        default_value = DEFAULT_GITHUB_MODELS_API_BASE,
        help = "OpenAI-compatible chat completions base URL"
    )]
    pub(crate) openai_base_url: String,

    #[arg(
        long = "openai-api-key",
        env = "TAU_MODERATOR_OPENAI_API_KEY",
        hide_env_values = true,
        help = "API key for the completion endpoint; defaults to the GitHub token"
    )]
    pub(crate) openai_api_key: Option<String>,

    #[arg(
        long,
        env = "TAU_MODERATOR_MODEL",
        help = "Model identifier sent to the completion endpoint"
    )]
    pub(crate) model: Option<String>,

    #[arg(
        long = "severity-threshold",
        env = "TAU_MODERATOR_SEVERITY_THRESHOLD",
        value_parser = parse_severity_threshold,
        help = "Minimum severity (1-10) required before any action is taken"
    )]
    pub(crate) severity_threshold: Option<u8>,

    #[arg(
        long = "max-recent-comments",
        env = "TAU_MODERATOR_MAX_RECENT_COMMENTS",
        value_parser = parse_positive_usize,
        help = "Number of prior comments included as thread context"
    )]
    pub(crate) max_recent_comments: Option<usize>,

    #[arg(
        long = "config",
        env = "TAU_MODERATOR_CONFIG",
        help = "Optional TOML file with moderation settings"
    )]
    pub(crate) config: Option<PathBuf>,

    #[arg(
        long = "event-name",
        env = "GITHUB_EVENT_NAME",
        help = "Webhook event name, e.g. issues or issue_comment"
    )]
    pub(crate) event_name: Option<String>,

    #[arg(
        long = "event-path",
        env = "GITHUB_EVENT_PATH",
        help = "Path to the webhook payload JSON"
    )]
    pub(crate) event_path: Option<PathBuf>,

    #[arg(
        long,
        env = "GITHUB_REPOSITORY",
        help = "Repository in owner/repo form; read from the payload when omitted"
    )]
    pub(crate) repository: Option<String>,

    #[arg(
        long = "output-path",
        env = "GITHUB_OUTPUT",
        help = "File that receives action-taken and reason outputs"
    )]
    pub(crate) output_path: Option<PathBuf>,

    #[arg(
        long = "request-timeout-ms",
        env = "TAU_MODERATOR_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Per-request timeout for GitHub and completion calls"
    )]
    pub(crate) request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "TAU_MODERATOR_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Attempts per request, including the first"
    )]
    pub(crate) retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "TAU_MODERATOR_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base delay for exponential retry backoff"
    )]
    pub(crate) retry_base_delay_ms: u64,

    #[arg(
        long = "check-connection",
        action = ArgAction::SetTrue,
        help = "Probe the completion endpoint and exit without processing an event"
    )]
    pub(crate) check_connection: bool,
}
