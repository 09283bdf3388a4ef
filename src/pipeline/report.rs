use std::fmt;

use crate::domain::email::{MessageId, ThreadId};
use crate::llm::classifier::Category;

/// How a listed thread ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Responded {
        message_id: MessageId,
        category: Category,
        recipient: String,
        /// False when the reply went out but the UNREAD label stayed.
        marked_read: bool,
    },
    SkippedOther {
        message_id: MessageId,
        label: String,
    },
    SkippedNoBody {
        message_id: MessageId,
    },
    SkippedNoMessage,
    SkippedAlreadyAnswered {
        message_id: MessageId,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailReport {
    pub thread_id: ThreadId,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Stubs returned by the listing, duplicates included.
    pub listed: usize,
    pub duplicates: usize,
    pub emails: Vec<EmailReport>,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.emails.iter().filter(|e| pred(&e.outcome)).count()
    }

    pub fn responded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Responded { .. }))
    }

    /// Replies sent whose source message could not be marked read.
    pub fn left_unread(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                Outcome::Responded {
                    marked_read: false,
                    ..
                }
            )
        })
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.emails.len() - self.responded() - self.failed()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listed {} (duplicates {}), responded {} (left unread {}), skipped {}, failed {}",
            self.listed,
            self.duplicates,
            self.responded(),
            self.left_unread(),
            self.skipped(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_outcomes() {
        let report = RunReport {
            listed: 5,
            duplicates: 1,
            emails: vec![
                EmailReport {
                    thread_id: "t1".into(),
                    outcome: Outcome::Responded {
                        message_id: "m1".into(),
                        category: Category::OrderTracking,
                        recipient: "ops@shop.example".into(),
                        marked_read: false,
                    },
                },
                EmailReport {
                    thread_id: "t2".into(),
                    outcome: Outcome::SkippedNoMessage,
                },
                EmailReport {
                    thread_id: "t3".into(),
                    outcome: Outcome::Failed {
                        reason: "boom".into(),
                    },
                },
                EmailReport {
                    thread_id: "t4".into(),
                    outcome: Outcome::SkippedOther {
                        message_id: "m4".into(),
                        label: "Other".into(),
                    },
                },
            ],
        };
        assert_eq!(
            report.to_string(),
            "listed 5 (duplicates 1), responded 1 (left unread 1), skipped 2, failed 1"
        );
    }
}
