//! Notification pipeline: decode an event, compose its email, deliver it,
//! and remember which message each pushed commit was announced in.
//!
//! Each event is one independent unit of work. Thread records are written
//! only after a successful delivery, since they need the Message-ID the
//! transport assigned.

pub mod compose;
pub mod email;
mod error;
pub mod templates;

pub use compose::{Composer, Composition};
pub use email::{MailTransport, OutgoingEmail, SmtpMailer};
pub use error::NotifyError;

use std::sync::Arc;

use crate::payloads::parse_event;
use crate::threads::ThreadStore;

/// What happened to an accepted webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Email delivered with this Message-ID
    Sent { message_id: String },
    /// Event type we do not notify about
    Unhandled { event_type: String },
    /// Known event type with nothing to say (e.g. a branch deletion)
    Ignored { reason: &'static str },
}

pub struct NotificationService {
    composer: Composer,
    transport: Arc<dyn MailTransport>,
    store: Arc<dyn ThreadStore>,
}

impl NotificationService {
    pub fn new(
        composer: Composer,
        transport: Arc<dyn MailTransport>,
        store: Arc<dyn ThreadStore>,
    ) -> Self {
        Self {
            composer,
            transport,
            store,
        }
    }

    /// Process one webhook delivery end to end.
    pub async fn handle(&self, event_type: &str, payload: &[u8]) -> Result<Outcome, NotifyError> {
        let Some(event) = parse_event(event_type, payload)? else {
            tracing::warn!(event_type = %event_type, "Unhandled event type");
            return Ok(Outcome::Unhandled {
                event_type: event_type.to_string(),
            });
        };
        tracing::debug!(event_type = event.event_type(), "Decoded webhook payload");

        let Some(composition) = self.composer.compose(&event).await? else {
            return Ok(Outcome::Ignored {
                reason: "push contained no commits",
            });
        };

        let message_id = self
            .transport
            .deliver(&composition.email)
            .await
            .map_err(NotifyError::Delivery)?;

        self.record_threads(&composition, &message_id).await;

        tracing::info!(
            event_type = %event_type,
            subject = %composition.email.subject(),
            message_id = %message_id,
            "Notification sent"
        );
        Ok(Outcome::Sent { message_id })
    }

    /// Compose the email an event would produce, without sending it or
    /// touching thread records.
    pub async fn preview(
        &self,
        event_type: &str,
        payload: &[u8],
    ) -> Result<Option<OutgoingEmail>, NotifyError> {
        let Some(event) = parse_event(event_type, payload)? else {
            return Ok(None);
        };
        Ok(self
            .composer
            .compose(&event)
            .await?
            .map(|composition| composition.email))
    }

    /// The email is already out, so a failed write only costs threading
    /// for later comments; it is logged rather than returned.
    async fn record_threads(&self, composition: &Composition, message_id: &str) {
        for commit_id in &composition.thread_commits {
            match self
                .store
                .create_thread(commit_id, composition.email.subject(), message_id)
                .await
            {
                Ok(true) => {}
                Ok(false) => tracing::debug!(
                    commit = %commit_id,
                    "Commit already has a thread, keeping the original"
                ),
                Err(e) => tracing::error!(
                    commit = %commit_id,
                    error = %e,
                    "Failed to record thread"
                ),
            }
        }
    }
}
