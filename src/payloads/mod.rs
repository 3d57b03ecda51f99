//! GitHub webhook payloads for the events we turn into mail.
//!
//! Every field is optional: GitHub omits fields freely between event
//! versions, and absence must stay distinguishable from an empty value.
//! Required-for-processing checks happen later, when a payload is turned
//! into a notification.
//!
//! Unknown fields are ignored. Unknown event types are not an error; they
//! decode to `Ok(None)` so the webhook can be acknowledged.

use chrono::{DateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer};
use thiserror::Error;

pub const PUSH_EVENT: &str = "push";
pub const COMMIT_COMMENT_EVENT: &str = "commit_comment";

/// Payload bytes were not JSON of the expected shape.
#[derive(Debug, Error)]
#[error("could not decode {event_type} payload: {source}")]
pub struct DecodeError {
    pub event_type: String,
    #[source]
    pub source: serde_json::Error,
}

/// A decoded event of a type we handle.
#[derive(Debug, Clone)]
pub enum Event {
    Push(PushPayload),
    CommitComment(CommitCommentPayload),
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Push(_) => PUSH_EVENT,
            Event::CommitComment(_) => COMMIT_COMMENT_EVENT,
        }
    }
}

/// Decodes a payload according to its `X-GitHub-Event` type.
///
/// Returns `Ok(None)` for event types that produce no notification.
pub fn parse_event(event_type: &str, payload: &[u8]) -> Result<Option<Event>, DecodeError> {
    let decode_error = |source| DecodeError {
        event_type: event_type.to_string(),
        source,
    };
    match event_type {
        PUSH_EVENT => serde_json::from_slice(payload)
            .map(|p| Some(Event::Push(p)))
            .map_err(decode_error),
        COMMIT_COMMENT_EVENT => serde_json::from_slice(payload)
            .map(|p| Some(Event::CommitComment(p)))
            .map_err(decode_error),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub created: Option<bool>,
    pub deleted: Option<bool>,
    pub forced: Option<bool>,
    pub compare: Option<String>,
    /// In push order, oldest first
    #[serde(default)]
    pub commits: Vec<WebHookCommit>,
    pub head_commit: Option<WebHookCommit>,
    pub pusher: Option<WebHookAuthor>,
    pub sender: Option<WebHookUser>,
    pub repository: Option<WebHookRepository>,
}

impl PushPayload {
    /// GitHub sends the pusher's login as `name`; `username` wins when present.
    pub fn pusher_username(&self) -> Option<&str> {
        let pusher = self.pusher.as_ref()?;
        pusher.username.as_deref().or(pusher.name.as_deref())
    }

    /// Branch (or tag) name with the `refs/heads/` prefix stripped.
    pub fn branch_name(&self) -> Option<&str> {
        let git_ref = self.git_ref.as_deref()?;
        Some(git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitCommentPayload {
    pub action: Option<String>,
    pub comment: Option<WebHookComment>,
    pub sender: Option<WebHookUser>,
    pub repository: Option<WebHookRepository>,
}

/// The commit variant embedded in push payloads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebHookCommit {
    pub id: Option<String>,
    pub message: Option<String>,
    pub url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    pub distinct: Option<bool>,
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
    pub author: Option<WebHookAuthor>,
    pub committer: Option<WebHookAuthor>,
}

/// Git identity as GitHub reports it on commits and pushers.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct WebHookAuthor {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

/// GitHub account as reported in `sender`, `owner` and comment `user`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct WebHookUser {
    pub id: Option<u64>,
    pub login: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebHookRepository {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub owner: Option<WebHookUser>,
    pub html_url: Option<String>,
    pub url: Option<String>,
    /// API template, e.g. `https://api.github.com/repos/o/r/commits{/sha}`
    pub commits_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub pushed_at: Option<DateTime<Utc>>,
}

impl WebHookRepository {
    /// Web URL of one commit, derived from the repository URL.
    pub fn commit_html_url(&self, sha: &str) -> Option<String> {
        self.html_url
            .as_deref()
            .map(|base| format!("{}/commit/{}", base.trim_end_matches('/'), sha))
    }

    /// API URL of one commit, expanded from the `commits_url` template.
    pub fn commit_api_url(&self, sha: &str) -> Option<String> {
        let template = self.commits_url.as_deref()?;
        let expanded = if template.contains(SHA_PLACEHOLDER) {
            template.replace(SHA_PLACEHOLDER, &format!("/{}", sha))
        } else {
            format!("{}/{}", template.trim_end_matches('/'), sha)
        };
        Some(expanded)
    }
}

const SHA_PLACEHOLDER: &str = "{/sha}";

/// A commit as the REST API returns it from `GET /repos/{o}/{r}/commits/{sha}`.
///
/// The nested `commit` object shares its shape with the webhook commit,
/// minus the username on identities.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCommit {
    pub sha: Option<String>,
    pub commit: Option<WebHookCommit>,
    pub html_url: Option<String>,
}

impl ApiCommit {
    pub fn message(&self) -> Option<&str> {
        self.commit.as_ref()?.message.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebHookComment {
    pub id: Option<u64>,
    pub user: Option<WebHookUser>,
    pub url: Option<String>,
    pub html_url: Option<String>,
    pub commit_id: Option<String>,
    pub body: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    pub position: Option<i64>,
    pub line: Option<i64>,
    pub path: Option<String>,
}

/// GitHub reports some timestamps as epoch seconds (`repository.pushed_at`
/// in push events) and others as RFC 3339 strings.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Epoch(i64),
        Text(String),
    }

    match Option::<RawTimestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawTimestamp::Epoch(seconds)) => DateTime::from_timestamp(seconds, 0)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", seconds))),
        Some(RawTimestamp::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(D::Error::custom),
    }
}
