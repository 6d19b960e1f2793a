//! Decision requestor: renders the evaluation prompt, calls the completion
//! client, and turns whatever comes back into a `ModerationDecision`.

use std::sync::Arc;

use tau_ai::{ChatRequest, LlmClient, Message};

use crate::config::ModerationConfig;
use crate::decision::{parse_decision, ModerationDecision, UNAVAILABLE_REASON};
use crate::observer::ModerationObserver;

pub const SYSTEM_PROMPT: &str =
    "You are a helpful community moderator. Respond only with valid JSON as specified in the prompt.";
const CONNECTION_PROBE_PROMPT: &str = "Test connection";
const CONNECTION_PROBE_MAX_TOKENS: u32 = 5;

pub fn build_moderation_prompt(content: &str, community_context: &str) -> String {
    format!(
        r#"You are a skilled community moderator for a GitHub repository. Your role is to review content and enforce community guidelines while being helpful and polite.

Community Guidelines:
{community_context}

Content to Review:
{content}

Please evaluate this content and respond with a JSON object containing:
- shouldAct: boolean (true if moderation action needed)
- actionKind: string ("comment", "hide", "lock", "suggest", or "none")
- severity: number (1-10, where 10 is most severe)
- reason: string (explanation of your decision)
- response: string (optional: helpful response to post as comment)

Guidelines for your evaluation:
- Be helpful and constructive rather than punitive
- Consider if content violates community guidelines
- Look for spam, harassment, off-topic content, or unhelpful contributions
- Suggest improvements when possible
- Only recommend hiding/locking for severe violations
- Provide educational feedback when appropriate

Respond only with valid JSON."#
    )
}

#[derive(Clone)]
pub struct DecisionRequestor {
    client: Arc<dyn LlmClient>,
    observer: Arc<dyn ModerationObserver>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    json_mode: bool,
}

impl DecisionRequestor {
    pub fn new(
        client: Arc<dyn LlmClient>,
        config: &ModerationConfig,
        observer: Arc<dyn ModerationObserver>,
    ) -> Self {
        Self {
            client,
            observer,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            json_mode: config.json_response_format,
        }
    }

    fn request_for(&self, prompt: String) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            json_mode: self.json_mode,
        }
    }

    /// Always yields a decision; every failure maps to a no-action fallback
    /// whose reason names the failure class.
    pub async fn decide(&self, content: &str, community_context: &str) -> ModerationDecision {
        let request = self.request_for(build_moderation_prompt(content, community_context));
        let response = match self.client.complete(request).await {
            Ok(response) => response,
            Err(error) => {
                self.observer
                    .warn("policy", &format!("AI moderation failed: {error}"));
                return ModerationDecision::no_action(UNAVAILABLE_REASON);
            }
        };

        let raw = response.message.text_content();
        if raw.trim().is_empty() {
            self.observer
                .warn("policy", "completion returned no response content");
            return ModerationDecision::no_action(UNAVAILABLE_REASON);
        }
        self.observer.debug("policy", &format!("raw decision: {raw}"));

        match parse_decision(raw) {
            Ok(decision) => decision,
            Err(error) => {
                self.observer.warn("policy", &error.to_string());
                error.into_fallback()
            }
        }
    }
}

/// Sends a tiny prompt to confirm the completion endpoint and credentials work.
pub async fn check_policy_connection(
    client: &dyn LlmClient,
    model: &str,
    observer: &dyn ModerationObserver,
) -> bool {
    let request = ChatRequest {
        model: model.to_string(),
        messages: vec![Message::user(CONNECTION_PROBE_PROMPT)],
        max_tokens: Some(CONNECTION_PROBE_MAX_TOKENS),
        temperature: None,
        json_mode: false,
    };
    match client.complete(request).await {
        Ok(response) if !response.message.text_content().trim().is_empty() => true,
        Ok(_) => {
            observer.warn("policy", "connection probe returned an empty response");
            false
        }
        Err(error) => {
            observer.warn("policy", &format!("connection probe failed: {error}"));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{build_moderation_prompt, check_policy_connection, DecisionRequestor, SYSTEM_PROMPT};
    use crate::config::ModerationConfig;
    use crate::decision::{
        ActionKind, INVALID_STRUCTURE_REASON, PARSE_FAILURE_REASON, UNAVAILABLE_REASON,
    };
    use crate::observer::recording::RecordingObserver;
    use crate::test_support::{FakeLlm, LlmReply};

    fn requestor(llm: Arc<FakeLlm>, observer: Arc<RecordingObserver>) -> DecisionRequestor {
        DecisionRequestor::new(llm, &ModerationConfig::default(), observer)
    }

    #[test]
    fn unit_prompt_embeds_context_content_and_output_contract() {
        let prompt = build_moderation_prompt("Issue Title: Spam", "Code of Conduct:\nBe kind.");
        assert!(prompt.contains("Community Guidelines:\nCode of Conduct:\nBe kind."));
        assert!(prompt.contains("Content to Review:\nIssue Title: Spam"));
        for field in ["shouldAct", "actionKind", "severity", "reason", "response"] {
            assert!(prompt.contains(&format!("- {field}:")), "{field}");
        }
        assert!(prompt.ends_with("Respond only with valid JSON."));
    }

    #[tokio::test]
    async fn functional_decide_sends_bounded_low_temperature_request() {
        let llm = Arc::new(FakeLlm::new(vec![LlmReply::Text(
            r#"{"shouldAct": true, "actionKind": "hide", "severity": 12, "reason": "abuse"}"#
                .to_string(),
        )]));
        let observer = Arc::new(RecordingObserver::default());

        let decision = requestor(llm.clone(), observer.clone())
            .decide("New Comment: you are all idiots", "No specific community guidelines found.")
            .await;

        assert!(decision.should_act);
        assert_eq!(decision.action_kind, ActionKind::Hide);
        assert_eq!(decision.severity, 10);
        assert_eq!(decision.response, None);

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.model, "openai/gpt-4.1");
        assert_eq!(request.max_tokens, Some(1_000));
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.messages[0].content, SYSTEM_PROMPT);
        assert!(request.messages[1]
            .content
            .contains("New Comment: you are all idiots"));
        assert!(observer.warnings().is_empty());
    }

    #[tokio::test]
    async fn regression_decide_maps_each_failure_class_to_its_reason() {
        let cases = [
            (LlmReply::Fail, UNAVAILABLE_REASON),
            (LlmReply::Text("   ".to_string()), UNAVAILABLE_REASON),
            (LlmReply::Text("no json here".to_string()), PARSE_FAILURE_REASON),
            (
                LlmReply::Text(r#"{"shouldAct": true, "severity": 3}"#.to_string()),
                INVALID_STRUCTURE_REASON,
            ),
        ];
        for (reply, expected_reason) in cases {
            let observer = Arc::new(RecordingObserver::default());
            let llm = Arc::new(FakeLlm::new(vec![reply]));
            let decision = requestor(llm, observer.clone()).decide("content", "context").await;
            assert!(!decision.should_act);
            assert_eq!(decision.action_kind, ActionKind::None);
            assert_eq!(decision.severity, 1);
            assert_eq!(decision.reason, expected_reason);
            assert_eq!(observer.warnings().len(), 1, "{expected_reason}");
        }
    }

    #[tokio::test]
    async fn functional_connection_check_reports_reachability() {
        let observer = RecordingObserver::default();
        let healthy = FakeLlm::new(vec![LlmReply::Text("ok".to_string())]);
        assert!(check_policy_connection(&healthy, "openai/gpt-4.1", &observer).await);
        let request = &healthy.requests()[0];
        assert_eq!(request.max_tokens, Some(5));
        assert_eq!(request.messages[0].content, "Test connection");

        let broken = FakeLlm::new(vec![LlmReply::Fail]);
        assert!(!check_policy_connection(&broken, "openai/gpt-4.1", &observer).await);
        assert_eq!(observer.warnings().len(), 1);
    }
}
