use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Repository coordinates in `owner/name` form.
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, GithubClientError> {
        let invalid = || GithubClientError::InvalidRepo(raw.to_string());
        let (owner, name) = raw.trim().split_once('/').ok_or_else(invalid)?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }
        Ok(Self::new(owner, name))
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// The top-level conversation a comment belongs to.
pub enum ThreadRef {
    Issue(u64),
    PullRequest(u64),
    /// GraphQL node id of the discussion.
    Discussion(String),
}

impl ThreadRef {
    /// Label used when rendering thread content (`Issue Title: ...`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Issue(_) => "Issue",
            Self::PullRequest(_) => "PR",
            Self::Discussion(_) => "Discussion",
        }
    }
}

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issue(number) => write!(f, "issue #{number}"),
            Self::PullRequest(number) => write!(f, "pull request #{number}"),
            Self::Discussion(node_id) => write!(f, "discussion {node_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadContent {
    pub title: String,
    pub body: Option<String>,
}

impl ThreadContent {
    pub fn new(title: impl Into<String>, body: Option<String>) -> Self {
        Self {
            title: title.into(),
            body: body.filter(|body| !body.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Snapshot of a prior comment on a thread.
pub struct RecentComment {
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub author_association: String,
}

#[derive(Debug, Error)]
/// Enumerates supported `GithubClientError` values.
pub enum GithubClientError {
    #[error("invalid repository '{0}', expected owner/repo")]
    InvalidRepo(String),
    #[error("invalid github client configuration: {0}")]
    Config(String),
    #[error("github {operation} request failed: {source}")]
    Http {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("github api {operation} failed with status {status}: {body}")]
    HttpStatus {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode github {operation}: {source}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("github graphql {operation} returned errors: {messages}")]
    GraphQl { operation: String, messages: String },
    #[error("github file '{path}' has no readable content")]
    MissingContent { path: String },
    #[error("invalid github response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
/// Platform capabilities consumed by the moderation pipeline.
pub trait GithubPlatform: Send + Sync {
    async fn thread_content(
        &self,
        repo: &RepoRef,
        thread: &ThreadRef,
    ) -> Result<ThreadContent, GithubClientError>;

    /// Most recent comments on a thread, newest first.
    async fn recent_comments(
        &self,
        repo: &RepoRef,
        thread: &ThreadRef,
        limit: usize,
    ) -> Result<Vec<RecentComment>, GithubClientError>;

    async fn file_content(&self, repo: &RepoRef, path: &str) -> Result<String, GithubClientError>;

    async fn post_comment(
        &self,
        repo: &RepoRef,
        thread: &ThreadRef,
        body: &str,
    ) -> Result<(), GithubClientError>;

    async fn hide_comment(&self, comment_node_id: &str) -> Result<(), GithubClientError>;

    async fn lock_thread(&self, repo: &RepoRef, thread: &ThreadRef)
        -> Result<(), GithubClientError>;
}
