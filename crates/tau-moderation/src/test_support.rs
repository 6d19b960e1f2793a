use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tau_ai::{ChatRequest, ChatResponse, ChatUsage, LlmClient, Message, TauAiError};
use tau_github_client::{
    GithubClientError, GithubPlatform, RecentComment, RepoRef, ThreadContent, ThreadRef,
};

pub(crate) enum LlmReply {
    Text(String),
    Fail,
}

pub(crate) struct FakeLlm {
    replies: Mutex<VecDeque<LlmReply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FakeLlm {
    pub(crate) fn new(replies: Vec<LlmReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, TauAiError> {
        self.requests.lock().expect("requests lock").push(request);
        match self.replies.lock().expect("replies lock").pop_front() {
            Some(LlmReply::Text(text)) => Ok(ChatResponse {
                message: Message::assistant_text(text),
                finish_reason: Some("stop".to_string()),
                usage: ChatUsage::default(),
            }),
            Some(LlmReply::Fail) | None => Err(TauAiError::InvalidResponse(
                "scripted failure".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlatformWrite {
    Comment(ThreadRef, String),
    Hide(String),
    Lock(ThreadRef),
}

#[derive(Default)]
pub(crate) struct FakePlatform {
    pub(crate) thread: Option<ThreadContent>,
    pub(crate) comments: Option<Vec<RecentComment>>,
    pub(crate) files: HashMap<String, String>,
    pub(crate) fail_writes: bool,
    pub(crate) writes: Mutex<Vec<PlatformWrite>>,
}

impl FakePlatform {
    pub(crate) fn writes(&self) -> Vec<PlatformWrite> {
        self.writes.lock().expect("writes lock").clone()
    }

    fn record(&self, write: PlatformWrite) -> Result<(), GithubClientError> {
        if self.fail_writes {
            return Err(GithubClientError::HttpStatus {
                operation: "write".to_string(),
                status: 403,
                body: "forbidden".to_string(),
            });
        }
        self.writes.lock().expect("writes lock").push(write);
        Ok(())
    }
}

fn not_found(operation: &str) -> GithubClientError {
    GithubClientError::HttpStatus {
        operation: operation.to_string(),
        status: 404,
        body: "Not Found".to_string(),
    }
}

#[async_trait]
impl GithubPlatform for FakePlatform {
    async fn thread_content(
        &self,
        _repo: &RepoRef,
        _thread: &ThreadRef,
    ) -> Result<ThreadContent, GithubClientError> {
        self.thread.clone().ok_or_else(|| not_found("thread"))
    }

    async fn recent_comments(
        &self,
        _repo: &RepoRef,
        _thread: &ThreadRef,
        _limit: usize,
    ) -> Result<Vec<RecentComment>, GithubClientError> {
        self.comments.clone().ok_or_else(|| not_found("comments"))
    }

    async fn file_content(&self, _repo: &RepoRef, path: &str) -> Result<String, GithubClientError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found("contents"))
    }

    async fn post_comment(
        &self,
        _repo: &RepoRef,
        thread: &ThreadRef,
        body: &str,
    ) -> Result<(), GithubClientError> {
        self.record(PlatformWrite::Comment(thread.clone(), body.to_string()))
    }

    async fn hide_comment(&self, comment_node_id: &str) -> Result<(), GithubClientError> {
        self.record(PlatformWrite::Hide(comment_node_id.to_string()))
    }

    async fn lock_thread(&self, _repo: &RepoRef, thread: &ThreadRef) -> Result<(), GithubClientError> {
        self.record(PlatformWrite::Lock(thread.clone()))
    }
}
