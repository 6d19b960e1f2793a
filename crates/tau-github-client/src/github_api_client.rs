use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::github_transport_helpers::{
    error_excerpt, graphql_endpoint, is_retryable_transport_error, FailureSignals, RetryPolicy,
};
use crate::{GithubClientError, GithubPlatform, RecentComment, RepoRef, ThreadContent, ThreadRef};

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
const ERROR_BODY_MAX_CHARS: usize = 800;
const GRAPHQL_MAX_PAGE: usize = 100;

const DISCUSSION_QUERY: &str = r#"
query($discussionId: ID!) {
  node(id: $discussionId) {
    ... on Discussion {
      title
      body
    }
  }
}"#;

const THREAD_COMMENTS_QUERY: &str = r#"
query($owner: String!, $name: String!, $number: Int!, $limit: Int!) {
  repository(owner: $owner, name: $name) {
    issueOrPullRequest(number: $number) {
      ... on Issue {
        comments(last: $limit) { nodes { ...RecentCommentFields } }
      }
      ... on PullRequest {
        comments(last: $limit) { nodes { ...RecentCommentFields } }
      }
    }
  }
}
fragment RecentCommentFields on IssueComment {
  body
  createdAt
  author { login }
  authorAssociation
}"#;

const DISCUSSION_COMMENTS_QUERY: &str = r#"
query($discussionId: ID!, $limit: Int!) {
  node(id: $discussionId) {
    ... on Discussion {
      comments(last: $limit) {
        nodes {
          body
          createdAt
          author { login }
          authorAssociation
        }
      }
    }
  }
}"#;

const ADD_DISCUSSION_COMMENT_MUTATION: &str = r#"
mutation($discussionId: ID!, $body: String!) {
  addDiscussionComment(input: {discussionId: $discussionId, body: $body}) {
    comment { id }
  }
}"#;

const MINIMIZE_COMMENT_MUTATION: &str = r#"
mutation($nodeId: ID!) {
  minimizeComment(input: {subjectId: $nodeId, classifier: SPAM}) {
    minimizedComment { isMinimized }
  }
}"#;

const LOCK_LOCKABLE_MUTATION: &str = r#"
mutation($lockableId: ID!) {
  lockLockable(input: {lockableId: $lockableId, lockReason: SPAM}) {
    lockedRecord { locked }
  }
}"#;

#[derive(Debug, Clone)]
/// Connection settings for `GithubApiClient`.
pub struct GithubApiClientConfig {
    pub api_base: String,
    pub token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl GithubApiClientConfig {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            token: token.into(),
            request_timeout_ms: 30_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommentCreateResponse {
    id: u64,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestThread {
    title: String,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct NodeData<T> {
    node: Option<T>,
}

#[derive(Debug, Deserialize)]
struct DiscussionNode {
    title: Option<String>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    issue_or_pull_request: Option<CommentsHolder>,
}

#[derive(Debug, Deserialize)]
struct CommentsHolder {
    comments: Option<CommentConnection>,
}

#[derive(Debug, Deserialize)]
struct CommentConnection {
    #[serde(default)]
    nodes: Vec<Option<CommentNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    body: Option<String>,
    created_at: DateTime<Utc>,
    author: Option<CommentAuthor>,
    author_association: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentAuthor {
    login: String,
}

impl CommentConnection {
    /// `comments(last: N)` pages oldest-first; callers expect newest first.
    fn into_recent_comments(self) -> Vec<RecentComment> {
        self.nodes
            .into_iter()
            .rev()
            .flatten()
            .map(|node| RecentComment {
                body: node.body.unwrap_or_default(),
                created_at: node.created_at,
                author: node
                    .author
                    .map(|author| author.login)
                    .unwrap_or_else(|| "unknown".to_string()),
                author_association: node
                    .author_association
                    .unwrap_or_else(|| "NONE".to_string()),
            })
            .collect()
    }
}

#[derive(Clone)]
/// REST + GraphQL client for the moderation platform operations.
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    graphql_url: String,
    retry: RetryPolicy,
}

impl GithubApiClient {
    pub fn new(config: GithubApiClientConfig) -> Result<Self, GithubClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("tau-moderator"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let token = config.token.trim();
        if token.is_empty() {
            return Err(GithubClientError::Config("github token is empty".to_string()));
        }
        let auth_header = format!("Bearer {token}");
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header).map_err(|error| {
                GithubClientError::Config(format!("invalid github authorization header: {error}"))
            })?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|source| GithubClientError::Http {
                operation: "client setup".to_string(),
                source,
            })?;
        let api_base = config.api_base.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            graphql_url: graphql_endpoint(&api_base),
            api_base,
            retry: RetryPolicy::new(config.retry_max_attempts, config.retry_base_delay_ms),
        })
    }

    fn repo_url(&self, repo: &RepoRef, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, repo.owner, repo.name, suffix
        )
    }

    async fn send<F>(
        &self,
        operation: &str,
        mut request_builder: F,
    ) -> Result<reqwest::Response, GithubClientError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header("x-tau-retry-attempt", attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let signals = FailureSignals::from_headers(response.headers(), Utc::now());
                    let body = response.text().await.unwrap_or_default();
                    let delay = signals
                        .is_retryable(status.as_u16())
                        .then(|| self.retry.next_delay(attempt, signals.server_wait))
                        .flatten();
                    if let Some(delay) = delay {
                        tracing::debug!(
                            operation,
                            status = status.as_u16(),
                            attempt,
                            rate_limited = signals.rate_limited,
                            delay_ms = delay.as_millis() as u64,
                            "retrying github request"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Err(GithubClientError::HttpStatus {
                        operation: operation.to_string(),
                        status: status.as_u16(),
                        body: error_excerpt(&body, ERROR_BODY_MAX_CHARS),
                    });
                }
                Err(error) => {
                    let delay = is_retryable_transport_error(&error)
                        .then(|| self.retry.next_delay(attempt, None))
                        .flatten();
                    if let Some(delay) = delay {
                        tracing::debug!(operation, attempt, error = %error, "retrying github request");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(GithubClientError::Http {
                        operation: operation.to_string(),
                        source: error,
                    });
                }
            }
        }
    }

    async fn request_json<T, F>(
        &self,
        operation: &str,
        request_builder: F,
    ) -> Result<T, GithubClientError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send(operation, request_builder).await?;
        let raw = response
            .text()
            .await
            .map_err(|source| GithubClientError::Http {
                operation: operation.to_string(),
                source,
            })?;
        serde_json::from_str(&raw).map_err(|source| GithubClientError::Decode {
            operation: operation.to_string(),
            source,
        })
    }

    async fn graphql<T>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, GithubClientError>
    where
        T: DeserializeOwned,
    {
        let payload = json!({ "query": query, "variables": variables });
        let envelope: GraphQlEnvelope<T> = self
            .request_json(operation, || self.http.post(&self.graphql_url).json(&payload))
            .await?;
        if !envelope.errors.is_empty() {
            let messages = envelope
                .errors
                .into_iter()
                .map(|error| error.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GithubClientError::GraphQl {
                operation: operation.to_string(),
                messages,
            });
        }
        envelope.data.ok_or_else(|| {
            GithubClientError::InvalidResponse(format!("graphql {operation} returned no data"))
        })
    }

    async fn rest_thread(
        &self,
        repo: &RepoRef,
        kind: &str,
        number: u64,
    ) -> Result<ThreadContent, GithubClientError> {
        let url = self.repo_url(repo, &format!("{kind}/{number}"));
        let thread: RestThread = self
            .request_json(&format!("get {kind}"), || self.http.get(&url))
            .await?;
        Ok(ThreadContent::new(thread.title, thread.body))
    }
}

fn decode_file_content(path: &str, payload: &Value) -> Result<String, GithubClientError> {
    let missing = || GithubClientError::MissingContent {
        path: path.to_string(),
    };
    let encoded = payload
        .get("content")
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
        .ok_or_else(missing)?;
    let encoding = payload
        .get("encoding")
        .and_then(Value::as_str)
        .unwrap_or("base64");
    if encoding != "base64" {
        return Ok(encoded.to_string());
    }
    let compact = encoded
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>();
    let bytes = STANDARD.decode(compact).map_err(|error| {
        GithubClientError::InvalidResponse(format!("file '{path}' is not valid base64: {error}"))
    })?;
    String::from_utf8(bytes).map_err(|_| {
        GithubClientError::InvalidResponse(format!("file '{path}' is not valid utf-8"))
    })
}

#[async_trait]
impl GithubPlatform for GithubApiClient {
    async fn thread_content(
        &self,
        repo: &RepoRef,
        thread: &ThreadRef,
    ) -> Result<ThreadContent, GithubClientError> {
        match thread {
            ThreadRef::Issue(number) => self.rest_thread(repo, "issues", *number).await,
            ThreadRef::PullRequest(number) => self.rest_thread(repo, "pulls", *number).await,
            ThreadRef::Discussion(node_id) => {
                let data: NodeData<DiscussionNode> = self
                    .graphql(
                        "get discussion",
                        DISCUSSION_QUERY,
                        json!({ "discussionId": node_id }),
                    )
                    .await?;
                let node = data.node.ok_or_else(|| {
                    GithubClientError::InvalidResponse(format!("discussion {node_id} not found"))
                })?;
                let title = node.title.ok_or_else(|| {
                    GithubClientError::InvalidResponse(format!(
                        "node {node_id} is not a discussion"
                    ))
                })?;
                Ok(ThreadContent::new(title, node.body))
            }
        }
    }

    async fn recent_comments(
        &self,
        repo: &RepoRef,
        thread: &ThreadRef,
        limit: usize,
    ) -> Result<Vec<RecentComment>, GithubClientError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = limit.min(GRAPHQL_MAX_PAGE);
        let connection = match thread {
            ThreadRef::Issue(number) | ThreadRef::PullRequest(number) => {
                let data: RepositoryData = self
                    .graphql(
                        "list thread comments",
                        THREAD_COMMENTS_QUERY,
                        json!({
                            "owner": repo.owner,
                            "name": repo.name,
                            "number": number,
                            "limit": limit,
                        }),
                    )
                    .await?;
                data.repository
                    .and_then(|repository| repository.issue_or_pull_request)
                    .and_then(|holder| holder.comments)
            }
            ThreadRef::Discussion(node_id) => {
                let data: NodeData<CommentsHolder> = self
                    .graphql(
                        "list discussion comments",
                        DISCUSSION_COMMENTS_QUERY,
                        json!({ "discussionId": node_id, "limit": limit }),
                    )
                    .await?;
                data.node.and_then(|holder| holder.comments)
            }
        };
        let connection = connection.ok_or_else(|| {
            GithubClientError::InvalidResponse(format!("{thread} has no comment connection"))
        })?;
        Ok(connection.into_recent_comments())
    }

    async fn file_content(&self, repo: &RepoRef, path: &str) -> Result<String, GithubClientError> {
        let url = self.repo_url(repo, &format!("contents/{}", path.trim_start_matches('/')));
        let payload: Value = self
            .request_json("get file content", || self.http.get(&url))
            .await?;
        decode_file_content(path, &payload)
    }

    async fn post_comment(
        &self,
        repo: &RepoRef,
        thread: &ThreadRef,
        body: &str,
    ) -> Result<(), GithubClientError> {
        match thread {
            ThreadRef::Issue(number) | ThreadRef::PullRequest(number) => {
                let url = self.repo_url(repo, &format!("issues/{number}/comments"));
                let payload = json!({ "body": body });
                let created: CommentCreateResponse = self
                    .request_json("create issue comment", || self.http.post(&url).json(&payload))
                    .await?;
                tracing::info!(
                    comment_id = created.id,
                    url = created.html_url.as_deref().unwrap_or_default(),
                    "posted comment on {thread}"
                );
            }
            ThreadRef::Discussion(node_id) => {
                let _: Value = self
                    .graphql(
                        "add discussion comment",
                        ADD_DISCUSSION_COMMENT_MUTATION,
                        json!({ "discussionId": node_id, "body": body }),
                    )
                    .await?;
                tracing::info!("posted comment on {thread}");
            }
        }
        Ok(())
    }

    async fn hide_comment(&self, comment_node_id: &str) -> Result<(), GithubClientError> {
        let _: Value = self
            .graphql(
                "minimize comment",
                MINIMIZE_COMMENT_MUTATION,
                json!({ "nodeId": comment_node_id }),
            )
            .await?;
        tracing::info!(node_id = comment_node_id, "hid comment");
        Ok(())
    }

    async fn lock_thread(
        &self,
        repo: &RepoRef,
        thread: &ThreadRef,
    ) -> Result<(), GithubClientError> {
        match thread {
            ThreadRef::Issue(number) | ThreadRef::PullRequest(number) => {
                let url = self.repo_url(repo, &format!("issues/{number}/lock"));
                let payload = json!({ "lock_reason": "spam" });
                self.send("lock issue", || self.http.put(&url).json(&payload))
                    .await?;
            }
            ThreadRef::Discussion(node_id) => {
                let _: Value = self
                    .graphql(
                        "lock discussion",
                        LOCK_LOCKABLE_MUTATION,
                        json!({ "lockableId": node_id }),
                    )
                    .await?;
            }
        }
        tracing::info!("locked {thread}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{decode_file_content, CommentConnection, GithubApiClient, GithubApiClientConfig};
    use crate::GithubClientError;

    #[test]
    fn unit_decode_file_content_handles_wrapped_base64() {
        // "# Contributing\nBe kind.\n" split across lines the way the contents API returns it.
        let payload = json!({
            "content": "IyBDb250cmlidXRpbmcK\nQmUga2luZC4K\n",
            "encoding": "base64"
        });
        assert_eq!(
            decode_file_content("CONTRIBUTING.md", &payload).expect("decodes"),
            "# Contributing\nBe kind.\n"
        );
    }

    #[test]
    fn regression_decode_file_content_rejects_directory_listings() {
        let error = decode_file_content(".github", &json!([{"name": "CONTRIBUTING.md"}]))
            .expect_err("directories have no content");
        assert!(matches!(error, GithubClientError::MissingContent { .. }));
    }

    #[test]
    fn functional_comment_connection_defaults_missing_author_fields() {
        let connection: CommentConnection = serde_json::from_value(json!({
            "nodes": [
                {
                    "body": null,
                    "createdAt": "2024-05-01T10:00:00Z",
                    "author": null,
                    "authorAssociation": null
                },
                null,
                {
                    "body": "looks good",
                    "createdAt": "2024-05-01T11:00:00Z",
                    "author": {"login": "octocat"},
                    "authorAssociation": "MEMBER"
                }
            ]
        }))
        .expect("connection decodes");
        let comments = connection.into_recent_comments();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].author, "octocat");
        assert_eq!(comments[1].body, "");
        assert_eq!(comments[1].author, "unknown");
        assert_eq!(comments[1].author_association, "NONE");
    }

    #[test]
    fn regression_client_rejects_blank_token() {
        let result = GithubApiClient::new(GithubApiClientConfig::new("https://api.github.com", " "));
        assert!(matches!(result, Err(GithubClientError::Config(_))));
    }
}
