//! Event-to-action moderation pipeline.
//!
//! A webhook is decoded into a [`ModerationEvent`], turned into reviewable
//! text with thread and community context, evaluated by a completion model,
//! and mapped onto at most one platform action behind a severity gate.

mod config;
mod context;
mod decision;
mod dispatch;
mod event;
mod extract;
mod observer;
mod pipeline;
mod policy;
#[cfg(test)]
mod test_support;

pub use config::{
    ModerationConfig, ModerationConfigError, DEFAULT_MAX_RECENT_COMMENTS, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL, DEFAULT_SEVERITY_THRESHOLD, DEFAULT_TEMPERATURE,
};
pub use context::{ContextAssembler, NO_COMMUNITY_GUIDELINES};
pub use decision::{
    normalize_severity, parse_decision, ActionKind, DecisionParseError, ModerationDecision,
    INVALID_STRUCTURE_REASON, PARSE_FAILURE_REASON, UNAVAILABLE_REASON,
};
pub use dispatch::{
    plan_action, ActionDispatcher, ActionResult, PlannedAction, ACCEPTABLE_REASON,
    NOT_COMPLETED_REASON, NO_CONTENT_REASON,
};
pub use event::{CommentPayload, EventKind, ModerationEvent, ThreadPayload};
pub use extract::extract_content;
pub use observer::{ModerationObserver, ObservationLevel, TracingObserver};
pub use pipeline::ModerationPipeline;
pub use policy::{build_moderation_prompt, check_policy_connection, DecisionRequestor, SYSTEM_PROMPT};
