//! GitHub API client for rendering markdown and looking up commits.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CommitSource;
use crate::config::GitHubConfig;
use crate::markdown::MarkdownService;
use crate::payloads::ApiCommit;

/// GitHub API client, optionally authenticated with a token.
pub struct GitHubClient {
    api_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Make a GET request to an absolute GitHub API URL.
    async fn get<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "commitmail")
            .header("X-GitHub-Api-Version", "2022-11-28");

        let response = self
            .authorize(request)
            .send()
            .await
            .context("Failed to make GitHub API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error: {} - {}", status, body);
        }

        response.json().await.context("Failed to parse GitHub API response")
    }

    /// Make a POST request to the GitHub API that answers with a text body.
    async fn post_text<B: Serialize>(&self, path: &str, body: &B) -> Result<String> {
        let url = format!("{}{}", self.api_url, path);
        let request = self
            .client
            .post(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "commitmail")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(body);

        let response = self
            .authorize(request)
            .send()
            .await
            .context("Failed to make GitHub API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error: {} - {}", status, body);
        }

        response
            .text()
            .await
            .context("Failed to read GitHub API response")
    }

    /// Render GitHub flavored markdown.
    ///
    /// # Arguments
    /// * `text` - Markdown source
    /// * `context` - Repository (`owner/name`) that issue and commit references resolve against
    pub async fn render_markdown(&self, text: &str, context: Option<&str>) -> Result<String> {
        let request_body = MarkdownRequest {
            text,
            mode: "gfm",
            context,
        };
        self.post_text("/markdown", &request_body).await
    }
}

#[async_trait]
impl MarkdownService for GitHubClient {
    async fn render(&self, text: &str, context: Option<&str>) -> Result<String> {
        self.render_markdown(text, context).await
    }
}

#[async_trait]
impl CommitSource for GitHubClient {
    async fn fetch_commit(&self, url: &str) -> Result<ApiCommit> {
        self.get(url).await
    }
}

#[derive(Debug, Serialize)]
struct MarkdownRequest<'a> {
    text: &'a str,
    mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}
