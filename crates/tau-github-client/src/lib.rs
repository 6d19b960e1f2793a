//! GitHub platform client for the moderation pipeline.
//!
//! Exposes the `GithubPlatform` capability contract consumed by the core and
//! its REST + GraphQL implementation, `GithubApiClient`.

mod github_api_client;
mod github_transport_helpers;
mod types;

pub use github_api_client::{GithubApiClient, GithubApiClientConfig, DEFAULT_GITHUB_API_BASE};
pub use types::{
    GithubClientError, GithubPlatform, RecentComment, RepoRef, ThreadContent, ThreadRef,
};
