//! GitHub REST API integration.
//!
//! Two endpoints are used. The markdown endpoint renders commit messages and
//! comments the way github.com does, with `#123` and `@user` references
//! resolved against the repository. The commits endpoint looks up the commit
//! a comment was left on, since comment payloads carry only its id.

pub mod api_client;

pub use api_client::GitHubClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::payloads::ApiCommit;

/// Fetches a single commit by its API URL.
#[async_trait]
pub trait CommitSource: Send + Sync {
    async fn fetch_commit(&self, url: &str) -> Result<ApiCommit>;
}
