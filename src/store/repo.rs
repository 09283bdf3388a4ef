use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashSet;

use crate::domain::email::{MessageId, ThreadId};

/// One reply that went out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsweredEntry {
    pub thread_id: ThreadId,
    /// The customer message that was answered.
    pub message_id: MessageId,
    pub category: String,
    pub recipient: String,
    pub answered_at_epoch: i64,
}

/// Remembers which customer messages already received a reply.
pub trait ReplyLedger {
    fn is_answered(&self, thread_id: &str, message_id: &str) -> Result<bool>;
    fn record_answered(&self, entry: &AnsweredEntry) -> Result<()>;
}

/// Ledger that forgets everything when the process exits.
#[derive(Default)]
pub struct MemoryLedger {
    answered: RefCell<HashSet<(ThreadId, MessageId)>>,
}

impl ReplyLedger for MemoryLedger {
    fn is_answered(&self, thread_id: &str, message_id: &str) -> Result<bool> {
        Ok(self
            .answered
            .borrow()
            .contains(&(thread_id.to_string(), message_id.to_string())))
    }

    fn record_answered(&self, entry: &AnsweredEntry) -> Result<()> {
        self.answered
            .borrow_mut()
            .insert((entry.thread_id.clone(), entry.message_id.clone()));
        Ok(())
    }
}
