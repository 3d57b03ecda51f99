use thiserror::Error;

use crate::display::MalformedCommit;
use crate::payloads::DecodeError;

/// Why an event did not produce a delivered notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    MalformedCommit(#[from] MalformedCommit),

    #[error("malformed event: missing {field}")]
    MalformedEvent { field: &'static str },

    #[error("refusing to build an email without a subject")]
    EmptySubject,

    #[error("mail delivery failed: {0:#}")]
    Delivery(anyhow::Error),

    #[error("thread store error: {0:#}")]
    Store(anyhow::Error),
}

impl NotifyError {
    pub fn missing(field: &'static str) -> Self {
        NotifyError::MalformedEvent { field }
    }

    /// Errors caused by the payload rather than by our own infrastructure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NotifyError::Decode(_)
                | NotifyError::MalformedCommit(_)
                | NotifyError::MalformedEvent { .. }
                | NotifyError::EmptySubject
        )
    }
}
