//! Action dispatcher: severity gate, then at most one platform mutation.

use std::sync::Arc;

use serde::Serialize;
use tau_github_client::{GithubPlatform, ThreadRef};

use crate::decision::{ActionKind, ModerationDecision};
use crate::event::ModerationEvent;
use crate::observer::ModerationObserver;

pub const ACCEPTABLE_REASON: &str = "Content deemed acceptable";
pub const NOT_COMPLETED_REASON: &str = "Action could not be completed";
pub const NO_CONTENT_REASON: &str = "No content to moderate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Outcome of one pipeline run.
pub struct ActionResult {
    pub action_taken: ActionKind,
    pub reason: String,
}

impl ActionResult {
    pub fn none(reason: impl Into<String>) -> Self {
        Self {
            action_taken: ActionKind::None,
            reason: reason.into(),
        }
    }

    pub fn taken(action: ActionKind, reason: impl Into<String>) -> Self {
        Self {
            action_taken: action,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The single platform write selected for a decision.
pub enum PlannedAction {
    PostComment { thread: ThreadRef, body: String },
    HideComment { node_id: String },
    LockThread { thread: ThreadRef },
}

/// Chooses the platform write for a decision that already passed the gate.
/// `None` means the action kind does not apply to this event or a required
/// identifier or response text is missing.
pub fn plan_action(event: &ModerationEvent, decision: &ModerationDecision) -> Option<PlannedAction> {
    match decision.action_kind {
        ActionKind::Comment | ActionKind::Suggest => {
            let body = decision
                .response
                .as_deref()
                .filter(|text| !text.trim().is_empty())?;
            Some(PlannedAction::PostComment {
                thread: event.thread()?,
                body: body.to_string(),
            })
        }
        ActionKind::Hide => Some(PlannedAction::HideComment {
            node_id: event.hideable_comment()?.to_string(),
        }),
        ActionKind::Lock => Some(PlannedAction::LockThread {
            thread: event.lockable_thread()?,
        }),
        ActionKind::None => None,
    }
}

#[derive(Clone)]
pub struct ActionDispatcher {
    platform: Arc<dyn GithubPlatform>,
    observer: Arc<dyn ModerationObserver>,
    severity_threshold: u8,
}

impl ActionDispatcher {
    pub fn new(
        platform: Arc<dyn GithubPlatform>,
        observer: Arc<dyn ModerationObserver>,
        severity_threshold: u8,
    ) -> Self {
        Self {
            platform,
            observer,
            severity_threshold,
        }
    }

    pub fn passes_gate(&self, decision: &ModerationDecision) -> bool {
        decision.should_act && decision.severity >= self.severity_threshold
    }

    pub async fn dispatch(
        &self,
        event: &ModerationEvent,
        decision: &ModerationDecision,
    ) -> ActionResult {
        if !self.passes_gate(decision) {
            return ActionResult::none(ACCEPTABLE_REASON);
        }
        let Some(planned) = plan_action(event, decision) else {
            self.observer.info(
                "dispatch",
                &format!(
                    "no eligible {} action for {}",
                    decision.action_kind,
                    event.name()
                ),
            );
            return ActionResult::none(NOT_COMPLETED_REASON);
        };

        let repo = &event.repo;
        let outcome = match &planned {
            PlannedAction::PostComment { thread, body } => {
                self.platform.post_comment(repo, thread, body).await
            }
            PlannedAction::HideComment { node_id } => self.platform.hide_comment(node_id).await,
            PlannedAction::LockThread { thread } => self.platform.lock_thread(repo, thread).await,
        };
        match outcome {
            Ok(()) => ActionResult::taken(decision.action_kind, decision.reason.clone()),
            Err(error) => {
                self.observer
                    .warn("dispatch", &format!("Failed to take action: {error}"));
                ActionResult::none(NOT_COMPLETED_REASON)
            }
        }
    }
}
