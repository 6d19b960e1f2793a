use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tau_github_client::RepoRef;
use tau_moderation::ModerationEvent;

/// Repository named by the payload's `repository` object.
fn payload_repository(payload: &Value) -> Option<RepoRef> {
    let repository = payload.get("repository")?;
    let owner = repository
        .get("owner")
        .and_then(|owner| owner.get("login"))
        .and_then(Value::as_str)?;
    let name = repository.get("name").and_then(Value::as_str)?;
    Some(RepoRef::new(owner, name))
}

pub(crate) fn resolve_repository(explicit: Option<&str>, payload: &Value) -> Result<RepoRef> {
    match explicit.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => RepoRef::parse(raw).context("invalid --repository"),
        None => payload_repository(payload)
            .ok_or_else(|| anyhow!("repository not provided and missing from event payload")),
    }
}

pub(crate) fn load_event(
    event_name: &str,
    event_path: &Path,
    repository: Option<&str>,
) -> Result<ModerationEvent> {
    let raw = std::fs::read_to_string(event_path)
        .with_context(|| format!("failed to read event payload {}", event_path.display()))?;
    let payload: Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse event payload {}", event_path.display()))?;
    let repo = resolve_repository(repository, &payload)?;
    Ok(ModerationEvent::from_webhook(event_name, &payload, repo))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tau_github_client::ThreadRef;
    use tempfile::tempdir;

    use super::{load_event, resolve_repository};

    #[test]
    fn unit_resolve_repository_prefers_explicit_slug() {
        let payload = json!({"repository": {"name": "widgets", "owner": {"login": "octo"}}});
        assert_eq!(
            resolve_repository(Some("acme/tools"), &payload)
                .expect("explicit slug")
                .slug(),
            "acme/tools"
        );
        assert_eq!(
            resolve_repository(None, &payload).expect("payload slug").slug(),
            "octo/widgets"
        );
        assert!(resolve_repository(None, &json!({})).is_err());
        assert!(resolve_repository(Some("not-a-slug"), &payload).is_err());
    }

    #[test]
    fn functional_load_event_reads_payload_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("event.json");
        std::fs::write(
            &path,
            json!({
                "action": "opened",
                "issue": {"number": 17, "title": "Help"},
                "repository": {"name": "widgets", "owner": {"login": "octo"}}
            })
            .to_string(),
        )
        .expect("write payload");

        let event = load_event("issues", &path, None).expect("event should load");

        assert_eq!(event.name(), "issue_opened");
        assert_eq!(event.thread(), Some(ThreadRef::Issue(17)));
        assert_eq!(event.repo.slug(), "octo/widgets");
    }

    #[test]
    fn regression_load_event_reports_unreadable_payload() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("event.json");
        std::fs::write(&path, "{not json").expect("write payload");
        let error = load_event("issues", &path, Some("octo/widgets")).expect_err("bad json");
        assert!(error.to_string().contains("failed to parse event payload"));
    }
}
