//! Markdown rendering for commit messages and comments.
//!
//! Text is HTML-escaped before it is sent out, because the GitHub markdown
//! endpoint passes stray `<`, `>` and `&` through untouched. The rendered
//! HTML then gets inline styles injected, since mail clients do not load
//! stylesheets. When the service is unreachable the escaped text is shown
//! in a single pre-wrapped block instead; rendering never fails.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StyleSheet;
use crate::utils::html_escape;

/// Something that turns markdown into HTML.
#[async_trait]
pub trait MarkdownService: Send + Sync {
    /// Render `text`, resolving references against the `context` repository.
    async fn render(&self, text: &str, context: Option<&str>) -> Result<String>;
}

/// Escapes, renders and styles free text for inclusion in an email.
#[derive(Clone)]
pub struct MarkdownRenderer {
    service: Arc<dyn MarkdownService>,
    styles: Arc<StyleSheet>,
}

impl MarkdownRenderer {
    pub fn new(service: Arc<dyn MarkdownService>, styles: Arc<StyleSheet>) -> Self {
        Self { service, styles }
    }

    pub async fn render(&self, body: &str, repo_full_name: Option<&str>) -> String {
        let escaped = html_escape(body);
        match self.service.render(&escaped, repo_full_name).await {
            Ok(rendered) => self.apply_styles(&rendered),
            Err(e) => {
                tracing::warn!(error = %e, "Could not do markdown rendering, using plain text");
                self.fallback(&escaped)
            }
        }
    }

    fn apply_styles(&self, rendered: &str) -> String {
        let link = format!("<a style=\"{}\" ", self.styles.get("link"));
        let block = self.styles.get("commit.message.block");
        rendered
            .replace("<a ", &link)
            // Blocks keep their whitespace...
            .replace("<p>", &format!("<p style=\"{}\">", block))
            .replace("<li>", &format!("<li style=\"{}\">", block))
            // ...so the newline after a line break would show twice.
            .replace("<br>\n", "<br>")
    }

    fn fallback(&self, escaped: &str) -> String {
        format!(
            "<div style=\"{}\">{}</div>",
            self.styles.get("commit.message.block"),
            escaped
        )
    }
}
