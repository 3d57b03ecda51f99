//! Presentation model for commits.
//!
//! Turns a raw webhook commit into what the email shows: a title truncated
//! the way github.com truncates it, a rendered body, the changed files in
//! path order with per-file anchors, and the committer with an avatar.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::markdown::MarkdownRenderer;
use crate::payloads::{WebHookCommit, WebHookRepository, WebHookUser};
use crate::utils::short_sha;

/// github.com cuts commit titles at this many characters.
pub const TITLE_MAX_CHARS: usize = 80;

pub const DISPLAY_DATE_FORMAT: &str = "%-I:%M%P";
pub const DISPLAY_DATE_FULL_FORMAT: &str = "%A %B %-d %-I:%M%P";

/// A commit is missing a field the notification cannot do without.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("malformed commit: missing {field}")]
pub struct MalformedCommit {
    pub field: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Added,
    Removed,
    Modified,
}

impl FileChange {
    /// Key into the style sheet for this kind of change.
    pub fn style_key(&self) -> &'static str {
        match self {
            FileChange::Added => "commit.files.file.type.added",
            FileChange::Removed => "commit.files.file.type.removed",
            FileChange::Modified => "commit.files.file.type.modified",
        }
    }

    pub fn letter(&self) -> &'static str {
        match self {
            FileChange::Added => "+",
            FileChange::Removed => "-",
            FileChange::Modified => "•",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFile {
    pub path: String,
    pub change: FileChange,
    /// `{commit url}#diff-{index}`, index taken after sorting
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayCommitter {
    pub login: String,
    pub name: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCommit {
    pub sha: String,
    pub short_sha: String,
    pub url: String,
    pub title: String,
    pub message_html: String,
    pub date: Option<DateTime<Tz>>,
    pub committer: DisplayCommitter,
    pub files: Vec<DisplayFile>,
}

impl DisplayCommit {
    pub fn display_date(&self) -> String {
        self.date
            .map(|date| display_date(&date))
            .unwrap_or_default()
    }

    pub fn display_date_tooltip(&self) -> String {
        self.date
            .map(|date| display_date_tooltip(&date))
            .unwrap_or_default()
    }
}

/// Build the display model for one pushed commit.
///
/// Fails fast, before any rendering call, when the id, message, URL or
/// author username is missing.
pub async fn build_display_commit(
    commit: &WebHookCommit,
    sender: Option<&WebHookUser>,
    repo: Option<&WebHookRepository>,
    tz: Tz,
    renderer: &MarkdownRenderer,
) -> Result<DisplayCommit, MalformedCommit> {
    let sha = required(&commit.id, "id")?;
    let message = required(&commit.message, "message")?;
    let url = required(&commit.url, "url")?;
    let author = commit.author.as_ref();
    let username = author
        .and_then(|a| a.username.as_deref())
        .ok_or(MalformedCommit {
            field: "author.username",
        })?;
    let name = author
        .and_then(|a| a.name.as_deref())
        .unwrap_or(username);

    let (title, body) = split_title_and_body(message);
    let message_html = if body.is_empty() {
        String::new()
    } else {
        let context = repo.and_then(|r| r.full_name.as_deref());
        renderer.render(&body, context).await
    };

    Ok(DisplayCommit {
        sha: sha.to_string(),
        short_sha: short_sha(sha).to_string(),
        url: url.to_string(),
        title,
        message_html,
        date: commit.timestamp.map(|t| in_zone(t, tz)),
        committer: DisplayCommitter {
            login: username.to_string(),
            name: name.to_string(),
            avatar_url: resolve_avatar(username, sender),
        },
        files: classify_files(url, &commit.added, &commit.removed, &commit.modified),
    })
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, MalformedCommit> {
    value.as_deref().ok_or(MalformedCommit { field })
}

/// Split a commit message into title and body on the first newline.
///
/// Titles longer than [`TITLE_MAX_CHARS`] characters are cut there and end
/// in an ellipsis; the cut-off remainder becomes the first line of the body.
pub fn split_title_and_body(message: &str) -> (String, String) {
    let (title, body) = match message.split_once('\n') {
        Some((title, body)) => (title, body),
        None => (message, ""),
    };

    match title.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => {
            let tail = &title[cut..];
            let body = if body.is_empty() {
                tail.to_string()
            } else {
                format!("{}\n{}", tail, body)
            };
            (format!("{}…", &title[..cut]), body)
        }
        None => (title.to_string(), body.to_string()),
    }
}

/// Tag files with their change kind, sort by path, then number the anchors.
pub fn classify_files(
    commit_url: &str,
    added: &[String],
    removed: &[String],
    modified: &[String],
) -> Vec<DisplayFile> {
    let groups = [
        (added, FileChange::Added),
        (removed, FileChange::Removed),
        (modified, FileChange::Modified),
    ];
    let mut files: Vec<(String, FileChange)> = groups
        .iter()
        .flat_map(|(paths, change)| paths.iter().map(move |p| (p.clone(), *change)))
        .collect();
    // Stable, so a path listed twice keeps group order
    files.sort_by(|a, b| a.0.cmp(&b.0));

    files
        .into_iter()
        .enumerate()
        .map(|(index, (path, change))| DisplayFile {
            path,
            change,
            url: format!("{}#diff-{}", commit_url, index),
        })
        .collect()
}

/// Generated avatar for a username.
pub fn identicon_url(username: &str) -> String {
    format!("https://github.com/identicons/{}.png", username)
}

/// Avatar for a commit author.
///
/// Starts from the identicon, then takes the event sender's real avatar
/// when the sender's login is exactly the author's username.
pub fn resolve_avatar(author_username: &str, sender: Option<&WebHookUser>) -> String {
    let sender_avatar = sender
        .filter(|s| s.login.as_deref() == Some(author_username))
        .and_then(|s| s.avatar_url.clone());
    sender_avatar.unwrap_or_else(|| identicon_url(author_username))
}

/// Short time, e.g. `3:04pm`, made undetectable as a date.
pub fn display_date(date: &DateTime<Tz>) -> String {
    safe_formatted_date(&date.format(DISPLAY_DATE_FORMAT).to_string())
}

/// Full time for tooltips, e.g. `Monday January 2 3:04pm`.
pub fn display_date_tooltip(date: &DateTime<Tz>) -> String {
    date.format(DISPLAY_DATE_FULL_FORMAT).to_string()
}

/// Convert a UTC instant into the display zone.
pub fn in_zone(date: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    date.with_timezone(&tz)
}

/// Insert zero-width spaces into a date so that Apple Data Detectors and
/// Gmail's event detection leave it alone.
pub fn safe_formatted_date(date: &str) -> String {
    let chars: Vec<char> = date.chars().collect();
    let len = chars.len();
    let mut out = String::with_capacity(date.len() * 2);
    let mut i = 0;
    while i < len {
        if i == len - 1 {
            out.push(chars[i]);
        } else {
            out.push(chars[i]);
            out.push(chars[i + 1]);
            if chars[i] != ' ' && chars[i + 1] != ' ' && i + 2 < len {
                out.push('\u{200b}');
            }
        }
        i += 2;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::tests::{test_styles, FailingService, ParagraphService};
    use crate::payloads::WebHookAuthor;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn renderer() -> MarkdownRenderer {
        MarkdownRenderer::new(Arc::new(ParagraphService::default()), test_styles())
    }

    fn author(username: &str, name: &str) -> Option<WebHookAuthor> {
        Some(WebHookAuthor {
            name: Some(name.to_string()),
            email: None,
            username: Some(username.to_string()),
        })
    }

    fn commit(message: &str) -> WebHookCommit {
        WebHookCommit {
            id: Some("deadbeefcafe0123".to_string()),
            message: Some(message.to_string()),
            url: Some("https://github.com/owner/repo/commit/deadbeefcafe0123".to_string()),
            timestamp: Some(Utc.with_ymd_and_hms(2024, 1, 2, 23, 4, 0).unwrap()),
            added: vec!["b.txt".to_string()],
            removed: vec!["a.txt".to_string()],
            modified: vec!["c.txt".to_string()],
            author: author("alice", "Alice A."),
            committer: author("alice", "Alice A."),
            ..Default::default()
        }
    }

    fn repo() -> WebHookRepository {
        WebHookRepository {
            full_name: Some("owner/repo".to_string()),
            html_url: Some("https://github.com/owner/repo".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_short_title_no_body() {
        let (title, body) = split_title_and_body("Fix the build");
        assert_eq!(title, "Fix the build");
        assert_eq!(body, "");

        let exactly_80 = "x".repeat(80);
        let (title, body) = split_title_and_body(&exactly_80);
        assert_eq!(title, exactly_80);
        assert_eq!(body, "");
    }

    #[test]
    fn test_title_and_body() {
        let (title, body) = split_title_and_body("Title\n\nBody line\nsecond");
        assert_eq!(title, "Title");
        assert_eq!(body, "\nBody line\nsecond");
    }

    #[test]
    fn test_81_char_title_truncated() {
        let message = format!("{}Z", "a".repeat(80));
        let (title, body) = split_title_and_body(&message);
        assert_eq!(title, format!("{}…", "a".repeat(80)));
        assert_eq!(body, "Z");
    }

    #[test]
    fn test_long_title_tail_prepended_to_body() {
        let message = format!("{}tail end\nrest of body", "a".repeat(80));
        let (title, body) = split_title_and_body(&message);
        assert_eq!(title.chars().count(), 81);
        assert!(title.ends_with('…'));
        assert_eq!(body, "tail end\nrest of body");
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let message = "é".repeat(85);
        let (title, body) = split_title_and_body(&message);
        assert_eq!(title, format!("{}…", "é".repeat(80)));
        assert_eq!(body, "é".repeat(5));
    }

    #[test]
    fn test_classify_files() {
        let files = classify_files(
            "https://github.com/o/r/commit/abc",
            &["b.txt".to_string()],
            &["a.txt".to_string()],
            &["c.txt".to_string()],
        );

        let summary: Vec<(&str, FileChange, &str)> = files
            .iter()
            .map(|f| (f.path.as_str(), f.change, f.url.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a.txt", FileChange::Removed, "https://github.com/o/r/commit/abc#diff-0"),
                ("b.txt", FileChange::Added, "https://github.com/o/r/commit/abc#diff-1"),
                ("c.txt", FileChange::Modified, "https://github.com/o/r/commit/abc#diff-2"),
            ]
        );
    }

    #[test]
    fn test_classify_sort_is_case_sensitive() {
        let files = classify_files(
            "u",
            &["b".to_string(), "B".to_string()],
            &[],
            &["a".to_string()],
        );
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["B", "a", "b"]);
    }

    #[test]
    fn test_file_change_presentation() {
        assert_eq!(FileChange::Added.letter(), "+");
        assert_eq!(FileChange::Removed.letter(), "-");
        assert_eq!(FileChange::Modified.letter(), "•");
        assert_eq!(FileChange::Removed.style_key(), "commit.files.file.type.removed");
    }

    #[test]
    fn test_resolve_avatar() {
        let sender = WebHookUser {
            login: Some("alice".to_string()),
            avatar_url: Some("https://avatars.example.com/alice".to_string()),
            ..Default::default()
        };

        assert_eq!(
            resolve_avatar("alice", Some(&sender)),
            "https://avatars.example.com/alice"
        );
        assert_eq!(
            resolve_avatar("bob", Some(&sender)),
            "https://github.com/identicons/bob.png"
        );
        assert_eq!(
            resolve_avatar("alice", None),
            "https://github.com/identicons/alice.png"
        );

        let no_avatar = WebHookUser {
            login: Some("alice".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_avatar("alice", Some(&no_avatar)),
            "https://github.com/identicons/alice.png"
        );
    }

    #[test]
    fn test_safe_formatted_date() {
        assert_eq!(safe_formatted_date("3:04pm"), "3:\u{200b}04\u{200b}pm");
        assert_eq!(safe_formatted_date("11:04pm"), "11\u{200b}:0\u{200b}4p\u{200b}m");
        assert_eq!(safe_formatted_date("ab cd"), "ab\u{200b} cd");
        assert_eq!(safe_formatted_date("a bc"), "a bc");
        assert_eq!(safe_formatted_date(""), "");
    }

    #[test]
    fn test_display_dates() {
        let date = in_zone(
            Utc.with_ymd_and_hms(2024, 1, 2, 23, 4, 0).unwrap(),
            chrono_tz::America::Los_Angeles,
        );
        assert_eq!(display_date(&date), "3:\u{200b}04\u{200b}pm");
        assert_eq!(display_date_tooltip(&date), "Tuesday January 2 3:04pm");
    }

    #[tokio::test]
    async fn test_build_display_commit() {
        let sender = WebHookUser {
            login: Some("alice".to_string()),
            avatar_url: Some("https://avatars.example.com/alice".to_string()),
            ..Default::default()
        };
        let display = build_display_commit(
            &commit("Fix the thing\nWith details"),
            Some(&sender),
            Some(&repo()),
            chrono_tz::America::Los_Angeles,
            &renderer(),
        )
        .await
        .unwrap();

        assert_eq!(display.sha, "deadbeefcafe0123");
        assert_eq!(display.short_sha, "deadbee");
        assert_eq!(display.title, "Fix the thing");
        assert_eq!(
            display.message_html,
            "<p style=\"white-space:pre-wrap;\">With details</p>"
        );
        assert_eq!(display.committer.login, "alice");
        assert_eq!(display.committer.name, "Alice A.");
        assert_eq!(display.committer.avatar_url, "https://avatars.example.com/alice");
        assert_eq!(display.files.len(), 3);
        assert_eq!(display.files[0].path, "a.txt");
        assert_eq!(display.display_date_tooltip(), "Tuesday January 2 3:04pm");
    }

    #[tokio::test]
    async fn test_empty_body_skips_renderer() {
        let service = Arc::new(ParagraphService::default());
        let renderer = MarkdownRenderer::new(service.clone(), test_styles());

        let display = build_display_commit(
            &commit("Just a title"),
            None,
            Some(&repo()),
            chrono_tz::UTC,
            &renderer,
        )
        .await
        .unwrap();

        assert_eq!(display.message_html, "");
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_renderer_failure_degrades() {
        let renderer = MarkdownRenderer::new(Arc::new(FailingService), test_styles());
        let display = build_display_commit(
            &commit("Title\n<script>"),
            None,
            Some(&repo()),
            chrono_tz::UTC,
            &renderer,
        )
        .await
        .unwrap();

        assert_eq!(
            display.message_html,
            "<div style=\"white-space:pre-wrap;\">&lt;script&gt;</div>"
        );
    }

    #[tokio::test]
    async fn test_short_id_falls_back_to_full() {
        let mut raw = commit("Title");
        raw.id = Some("abc".to_string());
        let display = build_display_commit(&raw, None, None, chrono_tz::UTC, &renderer())
            .await
            .unwrap();
        assert_eq!(display.short_sha, "abc");
    }

    #[tokio::test]
    async fn test_missing_fields_are_malformed() {
        let cases: [(fn(&mut WebHookCommit), &str); 4] = [
            (|c| c.id = None, "id"),
            (|c| c.message = None, "message"),
            (|c| c.url = None, "url"),
            (|c| c.author = None, "author.username"),
        ];

        for (strip, field) in cases {
            let mut raw = commit("Title");
            strip(&mut raw);
            let err = build_display_commit(&raw, None, None, chrono_tz::UTC, &renderer())
                .await
                .unwrap_err();
            assert_eq!(err.field, field);
        }
    }

    #[tokio::test]
    async fn test_missing_author_name_uses_username() {
        let mut raw = commit("Title");
        raw.author = Some(WebHookAuthor {
            username: Some("alice".to_string()),
            ..Default::default()
        });
        let display = build_display_commit(&raw, None, None, chrono_tz::UTC, &renderer())
            .await
            .unwrap();
        assert_eq!(display.committer.name, "alice");
    }

    #[tokio::test]
    async fn test_build_is_deterministic() {
        let raw = commit("Title\nBody with #12");
        let renderer = renderer();
        let first = build_display_commit(&raw, None, Some(&repo()), chrono_tz::UTC, &renderer)
            .await
            .unwrap();
        let second = build_display_commit(&raw, None, Some(&repo()), chrono_tz::UTC, &renderer)
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
