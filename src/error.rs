//! Error taxonomy for the reply pipeline.

use crate::domain::email::MessageId;

/// A mailbox or completion call did not produce a usable response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request to {service} failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("authentication failed: {0}")]
    Auth(String),
}

/// The data needed to carry on with an email is missing or malformed.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("thread {0} has no inbound message")]
    NoMessage(String),

    #[error("message {0} has no readable body")]
    NoBody(MessageId),

    #[error("reply for message {id} could not be built: {reason}")]
    Compose { id: MessageId, reason: String },
}

/// The reply went out, but a follow-up step did not complete.
#[derive(Debug, thiserror::Error)]
pub enum PartialFailure {
    #[error("reply sent but message {id} could not be marked read: {source}")]
    MarkRead {
        id: MessageId,
        #[source]
        source: TransportError,
    },

    #[error("reply sent but message {id} could not be recorded in the ledger: {reason}")]
    Ledger { id: MessageId, reason: String },
}

/// Anything that ends the processing of a single email early.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("ledger error: {0}")]
    Ledger(String),
}
