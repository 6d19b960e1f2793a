//! Thread and community context gathered to ground a moderation decision.
//!
//! Nothing here fails: every platform error is reported to the observer and
//! the affected section is left out.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tau_github_client::{GithubPlatform, RecentComment, RepoRef, ThreadRef};

use crate::observer::ModerationObserver;

pub const NO_COMMUNITY_GUIDELINES: &str = "No specific community guidelines found.";

struct CommunityDocument {
    heading: &'static str,
    paths: &'static [&'static str],
}

const COMMUNITY_DOCUMENTS: &[CommunityDocument] = &[
    CommunityDocument {
        heading: "Contributing Guidelines",
        paths: &[".github/CONTRIBUTING.md", "CONTRIBUTING.md"],
    },
    CommunityDocument {
        heading: "Code of Conduct",
        paths: &[".github/CODE_OF_CONDUCT.md", "CODE_OF_CONDUCT.md"],
    },
    CommunityDocument {
        heading: "Issue Template",
        paths: &[".github/ISSUE_TEMPLATE.md"],
    },
];

/// Tries each candidate in order and returns the first success, or every miss
/// when all candidates fail.
pub(crate) async fn first_success<'a, T, E, F, Fut>(
    candidates: &'a [&'a str],
    mut attempt: F,
) -> Result<(&'a str, T), Vec<(&'a str, E)>>
where
    F: FnMut(&'a str) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut misses = Vec::with_capacity(candidates.len());
    for &candidate in candidates {
        match attempt(candidate).await {
            Ok(value) => return Ok((candidate, value)),
            Err(error) => misses.push((candidate, error)),
        }
    }
    Err(misses)
}

/// Turns a newest-first listing into oldest-first order and keeps the newest
/// `limit` entries. Equal timestamps keep reversed listing order.
pub(crate) fn order_recent(mut comments: Vec<RecentComment>, limit: usize) -> Vec<RecentComment> {
    comments.reverse();
    comments.sort_by_key(|comment| comment.created_at);
    let skip = comments.len().saturating_sub(limit);
    comments.split_off(skip)
}

pub(crate) fn render_recent_comments(comments: &[RecentComment]) -> String {
    if comments.is_empty() {
        return String::new();
    }
    let mut rendered = String::from("Recent Comments:\n");
    for (index, comment) in comments.iter().enumerate() {
        rendered.push_str(&format!(
            "{}. @{}: {}\n",
            index + 1,
            comment.author,
            comment.body
        ));
    }
    rendered.push('\n');
    rendered
}

#[derive(Clone)]
pub struct ContextAssembler {
    platform: Arc<dyn GithubPlatform>,
    observer: Arc<dyn ModerationObserver>,
    max_recent_comments: usize,
}

impl ContextAssembler {
    pub fn new(
        platform: Arc<dyn GithubPlatform>,
        observer: Arc<dyn ModerationObserver>,
        max_recent_comments: usize,
    ) -> Self {
        Self {
            platform,
            observer,
            max_recent_comments,
        }
    }

    /// Renders a new comment together with its parent thread and the most
    /// recent prior comments. The new comment line is always present.
    pub async fn comment_content(
        &self,
        repo: &RepoRef,
        thread: Option<&ThreadRef>,
        comment_label: &str,
        comment_body: &str,
    ) -> String {
        let mut content = String::new();
        if let Some(thread) = thread {
            content.push_str(&self.thread_section(repo, thread).await);
            content.push_str(&self.recent_comments_section(repo, thread).await);
        }
        content.push_str(&format!("New {comment_label}: {comment_body}"));
        content
    }

    async fn thread_section(&self, repo: &RepoRef, thread: &ThreadRef) -> String {
        match self.platform.thread_content(repo, thread).await {
            Ok(parent) => {
                let label = thread.label();
                format!(
                    "{label} Title: {}\n{label} Body: {}\n\n",
                    parent.title,
                    parent.body.as_deref().unwrap_or_default()
                )
            }
            Err(error) => {
                self.observer.warn(
                    "context",
                    &format!("failed to fetch {thread} for {}: {error}", repo.slug()),
                );
                String::new()
            }
        }
    }

    async fn recent_comments_section(&self, repo: &RepoRef, thread: &ThreadRef) -> String {
        if self.max_recent_comments == 0 {
            return String::new();
        }
        match self
            .platform
            .recent_comments(repo, thread, self.max_recent_comments)
            .await
        {
            Ok(comments) => {
                render_recent_comments(&order_recent(comments, self.max_recent_comments))
            }
            Err(error) => {
                self.observer.warn(
                    "context",
                    &format!("failed to list recent comments on {thread}: {error}"),
                );
                String::new()
            }
        }
    }

    /// Concatenates the repository's governance documents under fixed headings.
    /// The three documents are looked up concurrently; each one walks its own
    /// candidate paths in order.
    pub async fn community_context(&self, repo: &RepoRef) -> String {
        let lookups = COMMUNITY_DOCUMENTS
            .iter()
            .map(|document| self.community_document(repo, document));
        let sections = join_all(lookups).await;
        let rendered = sections.into_iter().flatten().collect::<String>();
        if rendered.is_empty() {
            NO_COMMUNITY_GUIDELINES.to_string()
        } else {
            rendered
        }
    }

    async fn community_document(
        &self,
        repo: &RepoRef,
        document: &'static CommunityDocument,
    ) -> Option<String> {
        let platform = &self.platform;
        match first_success(document.paths, |path| platform.file_content(repo, path)).await {
            Ok((path, text)) if text.trim().is_empty() => {
                self.observer
                    .debug("context", &format!("{path} is empty; omitting"));
                None
            }
            Ok((_, text)) => Some(format!("{}:\n{text}\n\n", document.heading)),
            Err(misses) => {
                for (path, error) in misses {
                    self.observer
                        .debug("context", &format!("{path} not available: {error}"));
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tau_github_client::RecentComment;

    use super::{first_success, order_recent, render_recent_comments};

    fn comment(body: &str, hour: u32) -> RecentComment {
        RecentComment {
            body: body.to_string(),
            created_at: Utc
                .with_ymd_and_hms(2024, 5, 1, hour, 0, 0)
                .single()
                .expect("valid timestamp"),
            author: format!("user{hour}"),
            author_association: "NONE".to_string(),
        }
    }

    #[test]
    fn unit_order_recent_reverses_newest_first_listing() {
        let ordered = order_recent(vec![comment("C3", 3), comment("C2", 2), comment("C1", 1)], 3);
        let bodies = ordered.iter().map(|c| c.body.as_str()).collect::<Vec<_>>();
        assert_eq!(bodies, vec!["C1", "C2", "C3"]);
    }

    #[test]
    fn regression_order_recent_reverses_listing_when_timestamps_tie() {
        let ordered = order_recent(vec![comment("C3", 5), comment("C2", 5), comment("C1", 5)], 3);
        let bodies = ordered.iter().map(|c| c.body.as_str()).collect::<Vec<_>>();
        assert_eq!(bodies, vec!["C1", "C2", "C3"]);
    }

    #[test]
    fn unit_order_recent_keeps_newest_window() {
        let ordered = order_recent(
            vec![comment("C1", 1), comment("C4", 4), comment("C2", 2), comment("C3", 3)],
            2,
        );
        let bodies = ordered.iter().map(|c| c.body.as_str()).collect::<Vec<_>>();
        assert_eq!(bodies, vec!["C3", "C4"]);
    }

    #[test]
    fn unit_render_recent_comments_enumerates_from_one() {
        assert_eq!(render_recent_comments(&[]), "");
        assert_eq!(
            render_recent_comments(&[comment("hello", 1), comment("world", 2)]),
            "Recent Comments:\n1. @user1: hello\n2. @user2: world\n\n"
        );
    }

    #[tokio::test]
    async fn functional_first_success_stops_at_first_hit_and_collects_misses() {
        let mut tried = Vec::new();
        let hit = first_success(&["a", "b", "c"], |candidate| {
            tried.push(candidate);
            async move {
                if candidate == "b" {
                    Ok(candidate.len())
                } else {
                    Err(format!("{candidate} missing"))
                }
            }
        })
        .await;
        assert_eq!(hit, Ok(("b", 1)));
        assert_eq!(tried, vec!["a", "b"]);

        let exhausted: Result<(&str, ()), _> =
            first_success(&["x", "y"], |candidate| async move { Err(candidate) }).await;
        assert_eq!(exhausted, Err(vec![("x", "x"), ("y", "y")]));
    }
}
