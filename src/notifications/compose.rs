//! Turns decoded events into outgoing emails.

use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, warn};

use super::email::OutgoingEmail;
use super::templates::{render_comment_html, render_push_html, CommentView, PushView};
use super::NotifyError;
use crate::config::StyleSheet;
use crate::display::{
    build_display_commit, display_date, display_date_tooltip, identicon_url, in_zone,
    split_title_and_body, DisplayCommit,
};
use crate::github::CommitSource;
use crate::markdown::MarkdownRenderer;
use crate::payloads::{
    ApiCommit, CommitCommentPayload, Event, PushPayload, WebHookCommit, WebHookRepository,
};
use crate::threads::{ThreadRecord, ThreadStore};
use crate::utils::short_sha;

/// A composed email plus the commits whose threads it should start.
#[derive(Debug, Clone)]
pub struct Composition {
    pub email: OutgoingEmail,
    pub thread_commits: Vec<String>,
}

pub struct Composer {
    renderer: MarkdownRenderer,
    styles: Arc<StyleSheet>,
    store: Arc<dyn ThreadStore>,
    commits: Option<Arc<dyn CommitSource>>,
    tz: Tz,
}

impl Composer {
    pub fn new(
        renderer: MarkdownRenderer,
        styles: Arc<StyleSheet>,
        store: Arc<dyn ThreadStore>,
        tz: Tz,
    ) -> Self {
        Self {
            renderer,
            styles,
            store,
            commits: None,
            tz,
        }
    }

    /// Look up commented commits so comment emails can show their title.
    pub fn with_commit_source(mut self, commits: Arc<dyn CommitSource>) -> Self {
        self.commits = Some(commits);
        self
    }

    /// Compose the notification for an event. `None` means the event
    /// carries nothing to notify about.
    pub async fn compose(&self, event: &Event) -> Result<Option<Composition>, NotifyError> {
        match event {
            Event::Push(push) => self.compose_push(push).await,
            Event::CommitComment(comment) => self.compose_comment(comment).await.map(Some),
        }
    }

    pub async fn compose_push(
        &self,
        push: &PushPayload,
    ) -> Result<Option<Composition>, NotifyError> {
        let repo = push
            .repository
            .as_ref()
            .ok_or(NotifyError::missing("repository"))?;
        let repo_full_name = repo
            .full_name
            .as_deref()
            .ok_or(NotifyError::missing("repository.full_name"))?;
        let pusher = push
            .pusher_username()
            .ok_or(NotifyError::missing("pusher.name"))?;

        if push.commits.is_empty() {
            debug!(repo = %repo_full_name, "Push without commits, nothing to send");
            return Ok(None);
        }

        let mut commits = Vec::with_capacity(push.commits.len());
        for raw in &push.commits {
            let commit =
                build_display_commit(raw, push.sender.as_ref(), Some(repo), self.tz, &self.renderer)
                    .await?;
            commits.push(commit);
        }

        let subject = push_subject(repo_full_name, &commits[0]);
        let sender_name = resolve_sender_name(pusher, &push.commits);
        let extension = extension_link(&commits, push.compare.as_deref());

        let branch_name = push.branch_name();
        let branch_url = match (repo.html_url.as_deref(), branch_name) {
            (Some(base), Some(branch)) => {
                Some(format!("{}/tree/{}", base.trim_end_matches('/'), branch))
            }
            _ => None,
        };
        let pushed_at = repo.pushed_at.map(|t| in_zone(t, self.tz));

        let html = render_push_html(
            &PushView {
                repo_full_name,
                repo_url: repo.html_url.as_deref(),
                branch_name,
                branch_url,
                pushed_date: pushed_at.map(|d| display_date(&d)).unwrap_or_default(),
                pushed_date_tooltip: pushed_at
                    .map(|d| display_date_tooltip(&d))
                    .unwrap_or_default(),
                commits: &commits,
                extension_link: extension.as_deref(),
            },
            &self.styles,
        );

        let email = OutgoingEmail::new(sender_name, pusher, subject, html)?;
        let thread_commits = commits.into_iter().map(|c| c.sha).collect();

        Ok(Some(Composition {
            email,
            thread_commits,
        }))
    }

    pub async fn compose_comment(
        &self,
        payload: &CommitCommentPayload,
    ) -> Result<Composition, NotifyError> {
        let comment = payload
            .comment
            .as_ref()
            .ok_or(NotifyError::missing("comment"))?;
        let commit_id = comment
            .commit_id
            .as_deref()
            .ok_or(NotifyError::missing("comment.commit_id"))?;
        let repo = payload
            .repository
            .as_ref()
            .ok_or(NotifyError::missing("repository"))?;
        let repo_full_name = repo
            .full_name
            .as_deref()
            .ok_or(NotifyError::missing("repository.full_name"))?;
        if payload.sender.is_none() && comment.user.is_none() {
            return Err(NotifyError::missing("sender"));
        }
        // Whichever of sender and comment author carries a login
        let (commenter, login) = [payload.sender.as_ref(), comment.user.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|user| user.login.as_deref().map(|login| (user, login)))
            .ok_or(NotifyError::missing("sender.login"))?;
        let avatar_url = commenter
            .avatar_url
            .clone()
            .unwrap_or_else(|| identicon_url(login));

        let thread = self
            .store
            .lookup_thread(commit_id)
            .await
            .map_err(NotifyError::Store)?;
        if thread.is_none() {
            debug!(commit = %commit_id, "No thread for commented commit, sending unthreaded");
        }
        let subject = reply_subject(thread.as_ref(), repo_full_name, commit_id);

        let body_html = match comment.body.as_deref() {
            Some(body) if !body.is_empty() => {
                self.renderer.render(body, Some(repo_full_name)).await
            }
            _ => String::new(),
        };
        let commit = self.fetch_commented_commit(repo, commit_id).await;
        let commit_title = commit
            .as_ref()
            .and_then(ApiCommit::message)
            .map(|message| split_title_and_body(message).0);
        let commit_url = commit
            .and_then(|c| c.html_url)
            .or_else(|| repo.commit_html_url(commit_id));

        let date = comment
            .updated_at
            .or(comment.created_at)
            .map(|t| in_zone(t, self.tz));

        let html = render_comment_html(
            &CommentView {
                repo_full_name,
                repo_url: repo.html_url.as_deref(),
                commenter_login: login,
                avatar_url,
                comment_url: comment.html_url.as_deref(),
                short_sha: short_sha(commit_id),
                commit_url,
                commit_title,
                date: date.map(|d| display_date(&d)).unwrap_or_default(),
                date_tooltip: date.map(|d| display_date_tooltip(&d)).unwrap_or_default(),
                body_html: &body_html,
            },
            &self.styles,
        );

        let mut email = OutgoingEmail::new(login, login, subject, html)?;
        if let Some(thread) = thread {
            email = email.with_in_reply_to(thread.message_id);
        }

        Ok(Composition {
            email,
            thread_commits: Vec::new(),
        })
    }

    /// The commit a comment was left on, when it can be fetched. Failures
    /// only cost the title line, so they are logged and swallowed.
    async fn fetch_commented_commit(
        &self,
        repo: &WebHookRepository,
        commit_id: &str,
    ) -> Option<ApiCommit> {
        let source = self.commits.as_ref()?;
        let Some(url) = repo.commit_api_url(commit_id) else {
            debug!(commit = %commit_id, "Repository has no commits_url, skipping commit lookup");
            return None;
        };
        match source.fetch_commit(&url).await {
            Ok(commit) => Some(commit),
            Err(e) => {
                warn!(commit = %commit_id, error = %e, "Could not fetch commented commit");
                None
            }
        }
    }
}

/// `[owner/repo] abcdef0: Title of the first commit`
pub fn push_subject(repo_full_name: &str, first: &DisplayCommit) -> String {
    format!("[{}] {}: {}", repo_full_name, first.short_sha, first.title)
}

/// The reply subject for a comment: the original push subject when the
/// commit has a thread, otherwise one synthesized from the short id.
pub fn reply_subject(thread: Option<&ThreadRecord>, repo_full_name: &str, commit_id: &str) -> String {
    match thread {
        Some(thread) => format!("Re: {}", thread.subject),
        None => format!("Re: [{}] {}", repo_full_name, short_sha(commit_id)),
    }
}

/// Display name for the pusher.
///
/// Pushers only carry a login, but the pusher is usually an author or
/// committer of one of the commits, so the first matching identity supplies
/// the display name. Falls back to the login.
pub fn resolve_sender_name(pusher: &str, commits: &[WebHookCommit]) -> String {
    commits
        .iter()
        .flat_map(|c| [c.author.as_ref(), c.committer.as_ref()])
        .flatten()
        .find(|identity| identity.username.as_deref() == Some(pusher))
        .map(|identity| identity.name.as_deref().unwrap_or(pusher).to_string())
        .unwrap_or_else(|| pusher.to_string())
}

/// Link to the change on GitHub: the commit itself for single-commit
/// pushes, otherwise the compare view.
pub fn extension_link(commits: &[DisplayCommit], compare: Option<&str>) -> Option<String> {
    match commits {
        [only] => Some(only.url.clone()),
        _ => compare.map(str::to_string),
    }
}
