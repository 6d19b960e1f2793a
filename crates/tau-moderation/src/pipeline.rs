use std::sync::Arc;

use tau_ai::LlmClient;
use tau_github_client::GithubPlatform;

use crate::config::ModerationConfig;
use crate::context::ContextAssembler;
use crate::dispatch::{ActionDispatcher, ActionResult, NO_CONTENT_REASON};
use crate::event::ModerationEvent;
use crate::extract::extract_content;
use crate::observer::{ModerationObserver, TracingObserver};
use crate::policy::DecisionRequestor;

/// Event-to-action pipeline: extract, assemble context, decide, dispatch.
#[derive(Clone)]
pub struct ModerationPipeline {
    assembler: ContextAssembler,
    requestor: DecisionRequestor,
    dispatcher: ActionDispatcher,
    observer: Arc<dyn ModerationObserver>,
}

impl ModerationPipeline {
    pub fn new(
        platform: Arc<dyn GithubPlatform>,
        llm: Arc<dyn LlmClient>,
        config: &ModerationConfig,
    ) -> Self {
        Self::with_observer(platform, llm, config, Arc::new(TracingObserver))
    }

    pub fn with_observer(
        platform: Arc<dyn GithubPlatform>,
        llm: Arc<dyn LlmClient>,
        config: &ModerationConfig,
        observer: Arc<dyn ModerationObserver>,
    ) -> Self {
        Self {
            assembler: ContextAssembler::new(
                platform.clone(),
                observer.clone(),
                config.max_recent_comments,
            ),
            requestor: DecisionRequestor::new(llm, config, observer.clone()),
            dispatcher: ActionDispatcher::new(platform, observer.clone(), config.severity_threshold),
            observer,
        }
    }

    /// Runs one event to completion. Collaborator failures never escape; they
    /// surface only through the returned `ActionResult`.
    pub async fn run(&self, event: &ModerationEvent) -> ActionResult {
        self.observer.info(
            "pipeline",
            &format!("Processing event: {} on {}", event.name(), event.repo.slug()),
        );
        let Some(content) = extract_content(event, &self.assembler).await else {
            return ActionResult::none(NO_CONTENT_REASON);
        };
        let community_context = self.assembler.community_context(&event.repo).await;
        let decision = self.requestor.decide(&content, &community_context).await;
        self.observer.debug(
            "pipeline",
            &format!(
                "decision should_act={} action={} severity={}",
                decision.should_act, decision.action_kind, decision.severity
            ),
        );
        self.dispatcher.dispatch(event, &decision).await
    }
}
