use crate::context::ContextAssembler;
use crate::event::{EventKind, ModerationEvent, ThreadPayload};

fn opening_content(label: &str, thread: &ThreadPayload) -> String {
    format!(
        "{label} Title: {}\n{label} Body: {}",
        thread.title(),
        thread.body()
    )
}

/// Produces the text to evaluate for an event, or `None` when the event is
/// not something the moderator reviews.
///
/// Comment events are rendered with their thread context because a lone
/// comment is rarely intelligible without it.
pub async fn extract_content(
    event: &ModerationEvent,
    assembler: &ContextAssembler,
) -> Option<String> {
    let thread = event.thread();
    let content = match &event.kind {
        EventKind::IssueOpened { issue } => opening_content("Issue", issue),
        EventKind::PullRequestOpened { pull_request } => opening_content("PR", pull_request),
        EventKind::DiscussionCreated { discussion } => opening_content("Discussion", discussion),
        EventKind::IssueCommentCreated { comment, .. } => {
            assembler
                .comment_content(&event.repo, thread.as_ref(), "Comment", comment.body())
                .await
        }
        EventKind::ReviewCommentCreated { comment, .. } => {
            assembler
                .comment_content(&event.repo, thread.as_ref(), "Review Comment", comment.body())
                .await
        }
        EventKind::DiscussionCommentCreated { comment, .. } => {
            assembler
                .comment_content(
                    &event.repo,
                    thread.as_ref(),
                    "Discussion Comment",
                    comment.body(),
                )
                .await
        }
        EventKind::Other { .. } => return None,
    };
    Some(content)
}
