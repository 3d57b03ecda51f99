//! Outgoing notification email and its SMTP delivery.
//!
//! Each notification is sent from `"{display name}" <{login}@{sender_domain}>`
//! to the single configured recipient, so a mail client groups messages by
//! the GitHub user who caused them.

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;

use super::NotifyError;
use crate::config::MailConfig;

/// A composed notification, ready to hand to a [`MailTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    sender_name: String,
    sender_local: String,
    subject: String,
    html_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_reply_to: Option<String>,
}

impl OutgoingEmail {
    pub fn new(
        sender_name: impl Into<String>,
        sender_local: impl Into<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(NotifyError::EmptySubject);
        }
        Ok(Self {
            sender_name: sender_name.into(),
            sender_local: sender_local.into(),
            subject,
            html_body: html_body.into(),
            in_reply_to: None,
        })
    }

    /// Thread this email under an earlier message.
    pub fn with_in_reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.in_reply_to = Some(message_id.into());
        self
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    pub fn sender_local(&self) -> &str {
        &self.sender_local
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn html_body(&self) -> &str {
        &self.html_body
    }

    pub fn in_reply_to(&self) -> Option<&str> {
        self.in_reply_to.as_deref()
    }

    /// Extra headers beyond From/To/Subject.
    pub fn headers(&self) -> Vec<(&'static str, &str)> {
        match self.in_reply_to.as_deref() {
            Some(id) => vec![("In-Reply-To", id), ("References", id)],
            None => Vec::new(),
        }
    }
}

/// Local part usable in a sender address for a GitHub login.
///
/// Logins are mostly dot-atom safe already, but app accounts are not
/// (`github-actions[bot]` becomes `github-actions-bot`). Anything outside
/// letters, digits, `-`, `_` and `.` turns into `-`, and dots never lead,
/// trail or repeat.
pub fn mailbox_local_part(login: &str) -> String {
    let mapped: String = login
        .chars()
        .filter(|c| *c != ']')
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' => c,
            _ => '-',
        })
        .collect();
    let local = mapped
        .split('.')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".");
    if local.is_empty() {
        FALLBACK_LOCAL_PART.to_string()
    } else {
        local
    }
}

const FALLBACK_LOCAL_PART: &str = "github";

/// Delivers an email and reports the Message-ID it went out with.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<String>;
}

/// SMTP delivery using the `[mail]` configuration
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    /// Check if a recipient is configured
    pub fn is_enabled(&self) -> bool {
        self.config.recipient.is_some()
    }

    /// Build the wire message and the Message-ID assigned to it.
    fn build_message(&self, email: &OutgoingEmail) -> Result<(Message, String)> {
        let recipient = self
            .config
            .recipient
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Mail recipient not configured"))?;

        let address = Address::new(
            mailbox_local_part(email.sender_local()),
            &self.config.sender_domain,
        )?;
        let from = Mailbox::new(Some(email.sender_name().to_string()), address);
        let to: Mailbox = recipient.parse()?;

        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), self.config.sender_domain);

        let mut builder = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject())
            .message_id(Some(message_id.clone()));
        if let Some(parent) = email.in_reply_to() {
            builder = builder
                .in_reply_to(parent.to_string())
                .references(parent.to_string());
        }

        let message = builder
            .header(ContentType::TEXT_HTML)
            .body(email.html_body().to_string())?;

        Ok((message, message_id))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<String> {
        let (message, message_id) = self.build_message(email)?;

        // Build SMTP transport
        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(message).await?;

        tracing::info!(
            subject = %email.subject(),
            message_id = %message_id,
            "Email sent successfully"
        );

        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> SmtpMailer {
        SmtpMailer::new(MailConfig {
            sender_domain: "mail.example.com".to_string(),
            recipient: Some("eng+commits@example.com".to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_subject_rejected() {
        assert!(matches!(
            OutgoingEmail::new("Alice", "alice", "", "<p>x</p>"),
            Err(NotifyError::EmptySubject)
        ));
        assert!(matches!(
            OutgoingEmail::new("Alice", "alice", "   ", "<p>x</p>"),
            Err(NotifyError::EmptySubject)
        ));
    }

    #[test]
    fn test_headers() {
        let email = OutgoingEmail::new("Alice", "alice", "subj", "").unwrap();
        assert!(email.headers().is_empty());

        let email = email.with_in_reply_to("msg-1");
        assert_eq!(email.in_reply_to(), Some("msg-1"));
        assert_eq!(
            email.headers(),
            vec![("In-Reply-To", "msg-1"), ("References", "msg-1")]
        );
    }

    #[test]
    fn test_build_message() {
        let email = OutgoingEmail::new(
            "Alice A.",
            "alice",
            "[owner/repo] deadbee: Fix",
            "<p>hello</p>",
        )
        .unwrap()
        .with_in_reply_to("<parent@mail.example.com>");

        let (message, message_id) = mailer().build_message(&email).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(message_id.starts_with('<'));
        assert!(message_id.ends_with("@mail.example.com>"));
        assert!(raw.contains("alice@mail.example.com"));
        assert!(raw.contains("Alice A."));
        assert!(raw.contains("To: eng+commits@example.com"));
        assert!(raw.contains("Subject: [owner/repo] deadbee: Fix"));
        assert!(raw.contains(&format!("Message-ID: {}", message_id)));
        assert!(raw.contains("In-Reply-To: <parent@mail.example.com>"));
        assert!(raw.contains("References: <parent@mail.example.com>"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_mailbox_local_part() {
        assert_eq!(mailbox_local_part("alice"), "alice");
        assert_eq!(mailbox_local_part("Alice-B_2"), "Alice-B_2");
        assert_eq!(mailbox_local_part("github-actions[bot]"), "github-actions-bot");
        assert_eq!(mailbox_local_part("dependabot[bot]"), "dependabot-bot");
        assert_eq!(mailbox_local_part(".a..b."), "a.b");
        assert_eq!(mailbox_local_part("名前"), "--");
        assert_eq!(mailbox_local_part(""), "github");
        assert_eq!(mailbox_local_part("..."), "github");
    }

    #[test]
    fn test_bot_login_builds_valid_sender() {
        let email = OutgoingEmail::new(
            "github-actions[bot]",
            "github-actions[bot]",
            "[owner/repo] deadbee: Bump",
            "<p>x</p>",
        )
        .unwrap();

        let (message, _) = mailer().build_message(&email).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("github-actions-bot@mail.example.com"));
        assert!(raw.contains("github-actions[bot]"));
        assert_eq!(email.sender_local(), "github-actions[bot]");
    }

    #[test]
    fn test_message_ids_are_unique() {
        let email = OutgoingEmail::new("Alice", "alice", "subj", "").unwrap();
        let (_, first) = mailer().build_message(&email).unwrap();
        let (_, second) = mailer().build_message(&email).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_missing_recipient() {
        let mailer = SmtpMailer::new(MailConfig::default());
        assert!(!mailer.is_enabled());
        let email = OutgoingEmail::new("Alice", "alice", "subj", "").unwrap();
        assert!(mailer.build_message(&email).is_err());
    }
}
