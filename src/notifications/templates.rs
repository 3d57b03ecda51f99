//! HTML bodies for push and commit comment notifications.
//!
//! Every element is styled inline from the [`StyleSheet`]; text that came
//! from the payload is escaped here, while rendered markdown arrives already
//! safe.

use crate::config::StyleSheet;
use crate::display::DisplayCommit;
use crate::utils::html_escape;

pub struct PushView<'a> {
    pub repo_full_name: &'a str,
    pub repo_url: Option<&'a str>,
    pub branch_name: Option<&'a str>,
    pub branch_url: Option<String>,
    pub pushed_date: String,
    pub pushed_date_tooltip: String,
    pub commits: &'a [DisplayCommit],
    pub extension_link: Option<&'a str>,
}

pub struct CommentView<'a> {
    pub repo_full_name: &'a str,
    pub repo_url: Option<&'a str>,
    pub commenter_login: &'a str,
    pub avatar_url: String,
    pub comment_url: Option<&'a str>,
    pub short_sha: &'a str,
    pub commit_url: Option<String>,
    /// Title of the commented commit, when it could be looked up
    pub commit_title: Option<String>,
    pub date: String,
    pub date_tooltip: String,
    pub body_html: &'a str,
}

pub fn render_push_html(view: &PushView<'_>, styles: &StyleSheet) -> String {
    let repo = link_or_text(view.repo_url, view.repo_full_name, styles);
    let branch = match view.branch_name {
        Some(name) => format!(
            " &middot; {}",
            link_or_text(view.branch_url.as_deref(), name, styles)
        ),
        None => String::new(),
    };
    let pushed = if view.pushed_date.is_empty() {
        String::new()
    } else {
        format!(
            " &middot; <span style=\"{}\" title=\"{}\">{}</span>",
            styles.get("date"),
            html_escape(&view.pushed_date_tooltip),
            view.pushed_date
        )
    };

    let commits: String = view
        .commits
        .iter()
        .map(|commit| render_commit(commit, styles))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="{body_style}">
<div style="{header_style}">{repo}{branch}{pushed}</div>
{commits}{footer}
</body>
</html>"#,
        body_style = styles.get("body"),
        header_style = styles.get("header"),
        repo = repo,
        branch = branch,
        pushed = pushed,
        commits = commits,
        footer = render_footer(view.extension_link, styles),
    )
}

fn render_commit(commit: &DisplayCommit, styles: &StyleSheet) -> String {
    let date = if commit.date.is_some() {
        format!(
            " <span style=\"{}\" title=\"{}\">{}</span>",
            styles.get("date"),
            html_escape(&commit.display_date_tooltip()),
            commit.display_date()
        )
    } else {
        String::new()
    };

    let files = if commit.files.is_empty() {
        String::new()
    } else {
        let items: String = commit
            .files
            .iter()
            .map(|file| {
                format!(
                    "<li style=\"{}\"><span style=\"{}\">{}</span> <a style=\"{}\" href=\"{}\">{}</a></li>\n",
                    styles.get("commit.files.file"),
                    styles.get(file.change.style_key()),
                    file.change.letter(),
                    styles.get("link"),
                    html_escape(&file.url),
                    html_escape(&file.path),
                )
            })
            .collect();
        format!("<ul style=\"{}\">\n{}</ul>\n", styles.get("commit.files"), items)
    };

    format!(
        r#"<div style="{commit_style}">
<div><img src="{avatar}" alt="" width="20" height="20" style="{avatar_style}"><span style="{author_style}">{name}</span>{date}</div>
<div><a style="{title_style}" href="{url}">{title}</a> <a style="{link_style}" href="{url}">{short_sha}</a></div>
{message}
{files}</div>
"#,
        commit_style = styles.get("commit"),
        avatar = html_escape(&commit.committer.avatar_url),
        avatar_style = styles.get("commit.avatar"),
        author_style = styles.get("commit.author"),
        name = html_escape(&commit.committer.name),
        date = date,
        title_style = styles.get("commit.title"),
        link_style = styles.get("link"),
        url = html_escape(&commit.url),
        title = html_escape(&commit.title),
        short_sha = html_escape(&commit.short_sha),
        message = commit.message_html,
        files = files,
    )
}

pub fn render_comment_html(view: &CommentView<'_>, styles: &StyleSheet) -> String {
    let repo = link_or_text(view.repo_url, view.repo_full_name, styles);
    let commit = link_or_text(view.commit_url.as_deref(), view.short_sha, styles);
    let commented = link_or_text(view.comment_url, "commented", styles);
    let date = if view.date.is_empty() {
        String::new()
    } else {
        format!(
            " <span style=\"{}\" title=\"{}\">{}</span>",
            styles.get("date"),
            html_escape(&view.date_tooltip),
            view.date
        )
    };

    let title = match (&view.commit_title, &view.commit_url) {
        (Some(title), Some(url)) => format!(
            "<div><a style=\"{}\" href=\"{}\">{}</a></div>\n",
            styles.get("commit.title"),
            html_escape(url),
            html_escape(title)
        ),
        (Some(title), None) => format!(
            "<div style=\"{}\">{}</div>\n",
            styles.get("commit.title"),
            html_escape(title)
        ),
        _ => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="{body_style}">
<div style="{header_style}">{repo}</div>
<div style="{comment_style}">
<div><img src="{avatar}" alt="" width="20" height="20" style="{avatar_style}"><span style="{author_style}">{login}</span> {commented} on {commit}{date}</div>
{title}{body}
</div>
</body>
</html>"#,
        body_style = styles.get("body"),
        header_style = styles.get("header"),
        repo = repo,
        comment_style = styles.get("comment"),
        avatar = html_escape(&view.avatar_url),
        avatar_style = styles.get("commit.avatar"),
        author_style = styles.get("commit.author"),
        login = html_escape(view.commenter_login),
        commented = commented,
        commit = commit,
        date = date,
        title = title,
        body = view.body_html,
    )
}

fn render_footer(extension_link: Option<&str>, styles: &StyleSheet) -> String {
    match extension_link {
        Some(url) => format!(
            "<div style=\"{}\"><a style=\"{}\" href=\"{}\">View on GitHub</a></div>",
            styles.get("footer"),
            styles.get("link"),
            html_escape(url)
        ),
        None => String::new(),
    }
}

fn link_or_text(url: Option<&str>, text: &str, styles: &StyleSheet) -> String {
    match url {
        Some(url) => format!(
            "<a style=\"{}\" href=\"{}\">{}</a>",
            styles.get("link"),
            html_escape(url),
            html_escape(text)
        ),
        None => html_escape(text),
    }
}
