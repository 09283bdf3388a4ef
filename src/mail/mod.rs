pub mod compose;
pub mod decoders;
pub mod extract;
pub mod gmail;
pub mod thread;

use crate::domain::email::{Message, MessageRef, Thread};
use crate::error::TransportError;

/// Mailbox operations the pipeline relies on. Every call is a blocking round trip.
pub trait Mailbox {
    /// Stubs of the messages matching a search query, newest first.
    fn list_unread(&self, query: &str) -> Result<Vec<MessageRef>, TransportError>;

    /// Full message including its payload tree.
    fn get_message(&self, id: &str) -> Result<Message, TransportError>;

    /// All messages in a thread, oldest first.
    fn get_thread(&self, id: &str) -> Result<Thread, TransportError>;

    /// Send an RFC 5322 message, optionally into an existing thread.
    fn send(&self, raw: &[u8], thread_id: Option<&str>) -> Result<MessageRef, TransportError>;

    /// Drop the UNREAD label.
    fn mark_read(&self, id: &str) -> Result<(), TransportError>;
}
