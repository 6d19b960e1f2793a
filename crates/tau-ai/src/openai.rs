use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::{
    retry::{
        is_retryable_http_error, new_request_id, parse_retry_after_ms, should_retry_status,
        RetrySchedule,
    },
    ChatRequest, ChatResponse, ChatUsage, LlmClient, Message, MessageRole, TauAiError,
};

pub const DEFAULT_GITHUB_MODELS_API_BASE: &str = "https://models.github.ai/inference";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Enumerates supported `OpenAiAuthScheme` values.
pub enum OpenAiAuthScheme {
    #[default]
    Bearer,
    ApiKeyHeader,
}

#[derive(Debug, Clone)]
/// Public struct `OpenAiConfig` used across Tau components.
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub organization: Option<String>,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
    pub retry_budget_ms: u64,
    pub retry_jitter: bool,
    pub auth_scheme: OpenAiAuthScheme,
    pub api_version: Option<String>,
}

impl OpenAiConfig {
    /// Configuration for an OpenAI-compatible endpoint with Bearer auth.
    pub fn with_defaults(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            organization: None,
            request_timeout_ms: 60_000,
            max_retries: 2,
            retry_budget_ms: 0,
            retry_jitter: true,
            auth_scheme: OpenAiAuthScheme::Bearer,
            api_version: None,
        }
    }
}

#[derive(Debug, Clone)]
/// Public struct `OpenAiClient` used across Tau components.
pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, TauAiError> {
        if config.api_key.trim().is_empty() {
            return Err(TauAiError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match config.auth_scheme {
            OpenAiAuthScheme::Bearer => {
                let bearer = format!("Bearer {}", config.api_key.trim());
                headers.insert(AUTHORIZATION, header_value(&bearer, "API key")?);
            }
            OpenAiAuthScheme::ApiKeyHeader => {
                headers.insert("api-key", header_value(config.api_key.trim(), "API key")?);
            }
        }
        if let Some(org) = &config.organization {
            headers.insert("OpenAI-Organization", header_value(org, "organization")?);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_millis(
                config.request_timeout_ms.max(1),
            ))
            .build()?;

        Ok(Self { client, config })
    }

    fn chat_completions_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            return base.to_string();
        }
        format!("{base}/chat/completions")
    }
}

fn header_value(raw: &str, label: &str) -> Result<HeaderValue, TauAiError> {
    HeaderValue::from_str(raw)
        .map_err(|e| TauAiError::InvalidResponse(format!("invalid {label} header: {e}")))
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, TauAiError> {
        let body = build_chat_request_body(&request);
        let url = self.chat_completions_url();
        let schedule = RetrySchedule::start(
            self.config.max_retries,
            self.config.retry_jitter,
            self.config.retry_budget_ms,
        );

        for attempt in 0..=schedule.max_retries() {
            let mut request_builder = self
                .client
                .post(&url)
                .header("x-tau-request-id", new_request_id())
                .header("x-tau-retry-attempt", attempt.to_string());
            if let Some(api_version) = self.config.api_version.as_deref() {
                request_builder = request_builder.query(&[("api-version", api_version)]);
            }

            match request_builder.json(&body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let raw = response.text().await?;
                        return parse_chat_response(&raw);
                    }

                    let retry_after_ms = parse_retry_after_ms(response.headers());
                    let raw = response.text().await?;
                    if should_retry_status(status.as_u16()) {
                        if let Some(delay) = schedule.delay_after(attempt, retry_after_ms) {
                            tracing::debug!(
                                status = status.as_u16(),
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                "retrying chat completion after provider status"
                            );
                            sleep(delay).await;
                            continue;
                        }
                    }
                    return Err(TauAiError::HttpStatus {
                        status: status.as_u16(),
                        body: raw,
                    });
                }
                Err(error) => {
                    if is_retryable_http_error(&error) {
                        if let Some(delay) = schedule.delay_after(attempt, None) {
                            tracing::debug!(
                                attempt,
                                error = %error,
                                "retrying chat completion after transport error"
                            );
                            sleep(delay).await;
                            continue;
                        }
                    }
                    return Err(TauAiError::Http(error));
                }
            }
        }

        Err(TauAiError::InvalidResponse(
            "request retry loop terminated unexpectedly".to_string(),
        ))
    }
}

fn build_chat_request_body(request: &ChatRequest) -> Value {
    let messages = request
        .messages
        .iter()
        .map(|message| {
            json!({
                "role": message.role.as_str(),
                "content": message.content,
            })
        })
        .collect::<Vec<_>>();
    let mut body = json!({
        "model": request.model,
        "messages": messages,
    });

    if request.json_mode {
        body["response_format"] = json!({ "type": "json_object" });
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    body
}

fn parse_chat_response(raw: &str) -> Result<ChatResponse, TauAiError> {
    let parsed: OpenAiChatResponse = serde_json::from_str(raw)?;
    let choice =
        parsed.choices.into_iter().next().ok_or_else(|| {
            TauAiError::InvalidResponse("response contained no choices".to_string())
        })?;

    let usage = parsed
        .usage
        .map(|usage| ChatUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        })
        .unwrap_or_default();

    Ok(ChatResponse {
        message: Message {
            role: MessageRole::Assistant,
            content: flatten_openai_content(choice.message.content.as_ref()),
        },
        finish_reason: choice.finish_reason,
        usage,
    })
}

fn flatten_openai_content(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| {
                let kind = part.get("type").and_then(Value::as_str).unwrap_or("text");
                match kind {
                    "text" | "output_text" => part.get("text").and_then(Value::as_str),
                    _ => None,
                }
            })
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{build_chat_request_body, parse_chat_response};
    use crate::{ChatRequest, Message, TauAiError};

    fn request(json_mode: bool) -> ChatRequest {
        ChatRequest {
            model: "openai/gpt-4.1".to_string(),
            messages: vec![Message::system("be brief"), Message::user("review this")],
            max_tokens: Some(1_000),
            temperature: Some(0.3),
            json_mode,
        }
    }

    #[test]
    fn unit_build_chat_request_body_serializes_roles_and_limits() {
        let body = build_chat_request_body(&request(false));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "review this");
        assert_eq!(body["max_tokens"], 1_000);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn functional_build_chat_request_body_requests_json_object_in_json_mode() {
        let body = build_chat_request_body(&request(true));
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn functional_parse_chat_response_joins_text_parts() {
        let raw = json!({
            "choices": [{
                "message": {
                    "content": [
                        {"type": "text", "text": "{\"a\":"},
                        {"type": "refusal", "refusal": "nope"},
                        {"type": "text", "text": "1}"}
                    ]
                },
                "finish_reason": "stop"
            }]
        })
        .to_string();
        let response = parse_chat_response(&raw).expect("response should parse");
        assert_eq!(response.message.text_content(), "{\"a\":\n1}");
        assert_eq!(response.usage.total_tokens, 0);
    }

    #[test]
    fn regression_parse_chat_response_rejects_empty_choices() {
        let error = parse_chat_response(r#"{"choices": []}"#).expect_err("no choices");
        assert!(matches!(error, TauAiError::InvalidResponse(_)));
    }

    #[test]
    fn regression_parse_chat_response_treats_null_content_as_empty() {
        let raw = r#"{"choices":[{"message":{"content":null},"finish_reason":"length"}]}"#;
        let response = parse_chat_response(raw).expect("response should parse");
        assert_eq!(response.message.text_content(), "");
        assert_eq!(response.finish_reason.as_deref(), Some("length"));
    }
}
