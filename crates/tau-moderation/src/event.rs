//! Webhook payloads decoded once into a tagged union keyed by event kind.

use serde::Deserialize;
use serde_json::Value;
use tau_github_client::{RepoRef, ThreadRef};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
/// Issue, pull request, or discussion fields carried by a webhook.
pub struct ThreadPayload {
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl ThreadPayload {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommentPayload {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl CommentPayload {
    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `EventKind` values.
pub enum EventKind {
    IssueOpened {
        issue: ThreadPayload,
    },
    PullRequestOpened {
        pull_request: ThreadPayload,
    },
    IssueCommentCreated {
        issue: ThreadPayload,
        comment: CommentPayload,
    },
    ReviewCommentCreated {
        pull_request: ThreadPayload,
        comment: CommentPayload,
    },
    DiscussionCreated {
        discussion: ThreadPayload,
    },
    DiscussionCommentCreated {
        discussion: ThreadPayload,
        comment: CommentPayload,
    },
    /// Any webhook/action combination the moderator does not handle.
    Other {
        event_name: String,
        action: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One triggering webhook, immutable for the whole run.
pub struct ModerationEvent {
    pub repo: RepoRef,
    pub kind: EventKind,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookEnvelope {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    issue: Option<ThreadPayload>,
    #[serde(default)]
    pull_request: Option<ThreadPayload>,
    #[serde(default)]
    discussion: Option<ThreadPayload>,
    #[serde(default)]
    comment: Option<CommentPayload>,
}

impl ModerationEvent {
    pub fn new(repo: RepoRef, kind: EventKind) -> Self {
        Self { repo, kind }
    }

    /// Decodes a GitHub webhook (`X-GitHub-Event` name plus JSON payload).
    /// Shapes that do not match a handled kind decode to `EventKind::Other`.
    pub fn from_webhook(event_name: &str, payload: &Value, repo: RepoRef) -> Self {
        let envelope = WebhookEnvelope::deserialize(payload).unwrap_or_else(|error| {
            tracing::debug!(event_name, error = %error, "webhook payload did not decode");
            WebhookEnvelope {
                action: payload
                    .get("action")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned),
                ..WebhookEnvelope::default()
            }
        });
        let WebhookEnvelope {
            action,
            issue,
            pull_request,
            discussion,
            comment,
        } = envelope;

        let kind = match (event_name, action.as_deref(), issue, pull_request, discussion, comment) {
            ("issues", Some("opened"), Some(issue), _, _, _) => EventKind::IssueOpened { issue },
            ("pull_request", Some("opened"), _, Some(pull_request), _, _) => {
                EventKind::PullRequestOpened { pull_request }
            }
            ("issue_comment", Some("created"), Some(issue), _, _, Some(comment)) => {
                EventKind::IssueCommentCreated { issue, comment }
            }
            ("pull_request_review_comment", Some("created"), _, Some(pull_request), _, Some(comment)) => {
                EventKind::ReviewCommentCreated {
                    pull_request,
                    comment,
                }
            }
            ("discussion", Some("created"), _, _, Some(discussion), _) => {
                EventKind::DiscussionCreated { discussion }
            }
            ("discussion_comment", Some("created"), _, _, Some(discussion), Some(comment)) => {
                EventKind::DiscussionCommentCreated {
                    discussion,
                    comment,
                }
            }
            _ => EventKind::Other {
                event_name: event_name.to_string(),
                action: action.clone(),
            },
        };
        Self { repo, kind }
    }

    pub fn name(&self) -> &'static str {
        match &self.kind {
            EventKind::IssueOpened { .. } => "issue_opened",
            EventKind::PullRequestOpened { .. } => "pull_request_opened",
            EventKind::IssueCommentCreated { .. } => "issue_comment_created",
            EventKind::ReviewCommentCreated { .. } => "review_comment_created",
            EventKind::DiscussionCreated { .. } => "discussion_created",
            EventKind::DiscussionCommentCreated { .. } => "discussion_comment_created",
            EventKind::Other { .. } => "other",
        }
    }

    /// Thread that owns the event: where replies go and where context comes from.
    ///
    /// Discussions are addressed by the discussion node id for both the
    /// top-level and the comment event.
    pub fn thread(&self) -> Option<ThreadRef> {
        match &self.kind {
            EventKind::IssueOpened { issue } | EventKind::IssueCommentCreated { issue, .. } => {
                issue.number.map(ThreadRef::Issue)
            }
            EventKind::PullRequestOpened { pull_request }
            | EventKind::ReviewCommentCreated { pull_request, .. } => {
                pull_request.number.map(ThreadRef::PullRequest)
            }
            EventKind::DiscussionCreated { discussion }
            | EventKind::DiscussionCommentCreated { discussion, .. } => discussion
                .node_id
                .clone()
                .map(ThreadRef::Discussion),
            EventKind::Other { .. } => None,
        }
    }

    /// Thread that may be locked: only thread-opening events qualify.
    pub fn lockable_thread(&self) -> Option<ThreadRef> {
        match &self.kind {
            EventKind::IssueOpened { .. }
            | EventKind::PullRequestOpened { .. }
            | EventKind::DiscussionCreated { .. } => self.thread(),
            _ => None,
        }
    }

    /// Node id of the triggering comment, for comment events only.
    pub fn hideable_comment(&self) -> Option<&str> {
        match &self.kind {
            EventKind::IssueCommentCreated { comment, .. }
            | EventKind::ReviewCommentCreated { comment, .. }
            | EventKind::DiscussionCommentCreated { comment, .. } => comment.node_id.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tau_github_client::{RepoRef, ThreadRef};

    use super::{EventKind, ModerationEvent};

    fn repo() -> RepoRef {
        RepoRef::new("octo", "widgets")
    }

    #[test]
    fn unit_from_webhook_decodes_issue_opened() {
        let event = ModerationEvent::from_webhook(
            "issues",
            &json!({
                "action": "opened",
                "issue": {"number": 4, "node_id": "I_4", "title": "Spam", "body": null}
            }),
            repo(),
        );
        assert_eq!(event.name(), "issue_opened");
        assert_eq!(event.thread(), Some(ThreadRef::Issue(4)));
        assert_eq!(event.lockable_thread(), Some(ThreadRef::Issue(4)));
        assert_eq!(event.hideable_comment(), None);
        match event.kind {
            EventKind::IssueOpened { issue } => {
                assert_eq!(issue.title(), "Spam");
                assert_eq!(issue.body(), "");
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn functional_from_webhook_decodes_comment_events_with_hide_targets() {
        let review = ModerationEvent::from_webhook(
            "pull_request_review_comment",
            &json!({
                "action": "created",
                "pull_request": {"number": 9, "title": "Fix"},
                "comment": {"id": 1, "node_id": "PRRC_1", "body": "nit"}
            }),
            repo(),
        );
        assert_eq!(review.name(), "review_comment_created");
        assert_eq!(review.thread(), Some(ThreadRef::PullRequest(9)));
        assert_eq!(review.hideable_comment(), Some("PRRC_1"));
        assert_eq!(review.lockable_thread(), None);

        let discussion_comment = ModerationEvent::from_webhook(
            "discussion_comment",
            &json!({
                "action": "created",
                "discussion": {"number": 2, "node_id": "D_2", "title": "Ideas"},
                "comment": {"node_id": "DC_5", "body": "hi"}
            }),
            repo(),
        );
        assert_eq!(
            discussion_comment.thread(),
            Some(ThreadRef::Discussion("D_2".to_string()))
        );
        assert_eq!(discussion_comment.hideable_comment(), Some("DC_5"));
    }

    #[test]
    fn regression_unhandled_actions_and_events_decode_to_other() {
        let cases = [
            ("issues", json!({"action": "edited", "issue": {"number": 1}})),
            ("issue_comment", json!({"action": "deleted", "issue": {"number": 1}, "comment": {}})),
            ("push", json!({"ref": "refs/heads/main"})),
            ("discussion", json!({"action": "created"})),
            ("issues", json!({"action": "opened", "issue": "not-an-object"})),
        ];
        for (name, payload) in cases {
            let event = ModerationEvent::from_webhook(name, &payload, repo());
            assert_eq!(event.name(), "other", "{name} {payload}");
            assert_eq!(event.thread(), None);
        }
    }

    #[test]
    fn regression_missing_identifiers_leave_targets_empty() {
        let event = ModerationEvent::from_webhook(
            "discussion",
            &json!({"action": "created", "discussion": {"title": "No id"}}),
            repo(),
        );
        assert_eq!(event.name(), "discussion_created");
        assert_eq!(event.lockable_thread(), None);
    }
}
