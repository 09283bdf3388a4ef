//! One pass over the unread mail: resolve, read, classify, reply, mark read.

pub mod report;

use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Settings;
use crate::domain::email::{Message, MessageRef, Thread, ThreadId};
use crate::error::{ContentError, PartialFailure, PipelineError, TransportError};
use crate::llm::CompletionService;
use crate::llm::classifier::{Category, classify};
use crate::llm::responder::{Persona, generate_reply};
use crate::mail::Mailbox;
use crate::mail::compose::{OutgoingReply, build_reply, reply_subject};
use crate::mail::decoders::{decode_mime_words, normalize_snippet, sender_address};
use crate::mail::extract::extract_body;
use crate::mail::thread::latest_inbound;
use crate::store::repo::{AnsweredEntry, ReplyLedger};

pub use report::{EmailReport, Outcome, RunReport};

/// Where a drafted reply is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyRouting {
    /// Every reply goes to one review inbox.
    Operator(String),
    /// Reply to the customer inside their thread.
    Sender,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Our own address; messages from it are never answered.
    pub mailbox: String,
    pub query: String,
    pub routing: ReplyRouting,
    pub persona: Persona,
}

impl From<&Settings> for PipelineConfig {
    fn from(s: &Settings) -> Self {
        Self {
            mailbox: s.mailbox.clone(),
            query: s.query.clone(),
            routing: s.routing.clone(),
            persona: s.persona.clone(),
        }
    }
}

/// Threads already picked up during the current listing.
#[derive(Debug, Default)]
pub struct ProcessedThreads {
    seen: HashSet<ThreadId>,
}

impl ProcessedThreads {
    /// Records `thread_id`; false when it was seen before.
    pub fn observe(&mut self, thread_id: &str) -> bool {
        self.seen.insert(thread_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Keep the first stub of every thread, in listing order.
pub fn dedup_listing(stubs: Vec<MessageRef>, seen: &mut ProcessedThreads) -> Vec<MessageRef> {
    stubs
        .into_iter()
        .filter(|m| {
            let fresh = seen.observe(&m.thread_id);
            if !fresh {
                info!("Skipping thread {}, already processed.", m.thread_id);
            }
            fresh
        })
        .collect()
}

pub struct Pipeline<'a> {
    mailbox: &'a dyn Mailbox,
    llm: &'a dyn CompletionService,
    ledger: &'a dyn ReplyLedger,
    cfg: &'a PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        mailbox: &'a dyn Mailbox,
        llm: &'a dyn CompletionService,
        ledger: &'a dyn ReplyLedger,
        cfg: &'a PipelineConfig,
    ) -> Self {
        Self {
            mailbox,
            llm,
            ledger,
            cfg,
        }
    }

    /// Process every unread thread once. Only a failed listing aborts the
    /// pass; failures inside one email are recorded and the pass moves on.
    pub fn run_once(&self) -> Result<RunReport, TransportError> {
        let stubs = self.mailbox.list_unread(&self.cfg.query)?;
        let mut report = RunReport {
            listed: stubs.len(),
            ..Default::default()
        };

        if stubs.is_empty() {
            info!("No new emails found.");
            return Ok(report);
        }

        let mut seen = ProcessedThreads::default();
        let todo = dedup_listing(stubs, &mut seen);
        report.duplicates = report.listed - todo.len();

        for stub in todo {
            let outcome = match self.process_thread(&stub.thread_id) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("thread {}: {e}", stub.thread_id);
                    Outcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.emails.push(EmailReport {
                thread_id: stub.thread_id,
                outcome,
            });
        }

        Ok(report)
    }

    fn process_thread(&self, thread_id: &str) -> Result<Outcome, PipelineError> {
        let thread = self.mailbox.get_thread(thread_id)?;
        let Some(latest) = latest_inbound(&thread, &self.cfg.mailbox) else {
            info!("{}. Skipping.", ContentError::NoMessage(thread_id.to_string()));
            return Ok(Outcome::SkippedNoMessage);
        };
        let message_id = latest.id.clone();
        info!(
            "Processing message ID: {message_id} ({})",
            normalize_snippet(&latest.snippet, 140)
        );

        if self
            .ledger
            .is_answered(thread_id, &message_id)
            .map_err(|e| PipelineError::Ledger(e.to_string()))?
        {
            info!("message {message_id} was answered in an earlier run. Skipping.");
            return Ok(Outcome::SkippedAlreadyAnswered { message_id });
        }

        let message = self.mailbox.get_message(&message_id)?;
        let payload = message.payload.clone().unwrap_or_default();
        let Some(body) = extract_body(&payload).into_option() else {
            info!("{}. Skipping.", ContentError::NoBody(message_id.clone()));
            return Ok(Outcome::SkippedNoBody { message_id });
        };
        debug!("message {message_id}: {} chars of body", body.len());

        let classification = classify(self.llm, &body)?;
        info!(
            "message {message_id} classified as {} (model said '{}')",
            classification.category, classification.label
        );
        if classification.category == Category::Other {
            return Ok(Outcome::SkippedOther {
                message_id,
                label: classification.label,
            });
        }

        let draft = generate_reply(self.llm, &self.cfg.persona, &body)?;
        let recipient = self.recipient_for(&message)?;
        let reply_in_thread = self.cfg.routing == ReplyRouting::Sender;
        // Gmail only files the reply into the thread when the subject follows it
        let subject = if reply_in_thread {
            message
                .header("Subject")
                .and_then(|s| reply_subject(&decode_mime_words(s)))
                .unwrap_or_else(|| draft.subject.clone())
        } else {
            draft.subject.clone()
        };
        let raw = build_reply(&OutgoingReply {
            answering: &message_id,
            from: &self.cfg.mailbox,
            to: &recipient,
            in_reply_to: if reply_in_thread {
                message.header("Message-ID")
            } else {
                None
            },
            subject: &subject,
            body: &draft.body,
        })?;

        let sent = self
            .mailbox
            .send(&raw, reply_in_thread.then_some(thread.id.as_str()))?;
        info!(
            "reply '{subject}' sent to {recipient} as message {}",
            sent.id
        );

        self.record(&thread, &message_id, classification.category, &recipient);
        let marked_read = self.mark_read(&message_id);

        Ok(Outcome::Responded {
            message_id,
            category: classification.category,
            recipient,
            marked_read,
        })
    }

    fn recipient_for(&self, message: &Message) -> Result<String, ContentError> {
        match &self.cfg.routing {
            ReplyRouting::Operator(address) => Ok(address.clone()),
            ReplyRouting::Sender => message
                .header("from")
                .and_then(sender_address)
                .ok_or_else(|| ContentError::Compose {
                    id: message.id.clone(),
                    reason: "message has no usable From address".to_string(),
                }),
        }
    }

    fn record(&self, thread: &Thread, message_id: &str, category: Category, recipient: &str) {
        let entry = AnsweredEntry {
            thread_id: thread.id.clone(),
            message_id: message_id.to_string(),
            category: category.to_string(),
            recipient: recipient.to_string(),
            answered_at_epoch: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default(),
        };
        if let Err(e) = self.ledger.record_answered(&entry) {
            let failure = PartialFailure::Ledger {
                id: message_id.to_string(),
                reason: e.to_string(),
            };
            warn!("{failure}");
        }
    }

    /// Best effort: a failure is logged and the sent reply stands.
    fn mark_read(&self, message_id: &str) -> bool {
        info!("Marking email {message_id} as read.");
        match self.mailbox.mark_read(message_id) {
            Ok(()) => {
                info!("Email {message_id} marked as read successfully.");
                true
            }
            Err(source) => {
                let failure = PartialFailure::MarkRead {
                    id: message_id.to_string(),
                    source,
                };
                warn!("{failure}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub(id: &str, thread: &str) -> MessageRef {
        MessageRef {
            id: id.to_string(),
            thread_id: thread.to_string(),
        }
    }

    #[test]
    fn dedup_keeps_first_of_each_thread() {
        let mut seen = ProcessedThreads::default();
        let kept = dedup_listing(
            vec![stub("m1", "t1"), stub("m2", "t2"), stub("m3", "t1")],
            &mut seen,
        );
        assert_eq!(kept, vec![stub("m1", "t1"), stub("m2", "t2")]);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn observe_reports_repeats() {
        let mut seen = ProcessedThreads::default();
        assert!(seen.is_empty());
        assert!(seen.observe("t1"));
        assert!(!seen.observe("t1"));
    }
}
