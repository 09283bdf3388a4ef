use anyhow::Result;
use rusqlite::{Connection, params};

use crate::store::repo::{AnsweredEntry, ReplyLedger};

pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        let ledger = Self { conn };
        ledger.migrate()?;
        Ok(ledger)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS answered (
                thread_id    TEXT NOT NULL,
                message_id   TEXT NOT NULL,
                category     TEXT NOT NULL,
                recipient    TEXT NOT NULL,
                answered_at  INTEGER NOT NULL,
                PRIMARY KEY (thread_id, message_id)
            );
            "#,
        )?;
        Ok(())
    }
}

impl ReplyLedger for SqliteLedger {
    fn is_answered(&self, thread_id: &str, message_id: &str) -> Result<bool> {
        let mut stmt = self.conn.prepare(
            r#"SELECT 1 FROM answered WHERE thread_id=?1 AND message_id=?2"#,
        )?;
        let mut rows = stmt.query(params![thread_id, message_id])?;
        Ok(rows.next()?.is_some())
    }

    fn record_answered(&self, entry: &AnsweredEntry) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO answered (thread_id, message_id, category, recipient, answered_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(thread_id, message_id) DO UPDATE SET
              category=excluded.category,
              recipient=excluded.recipient,
              answered_at=excluded.answered_at
            "#,
            params![
                entry.thread_id,
                entry.message_id,
                entry.category,
                entry.recipient,
                entry.answered_at_epoch
            ],
        )?;
        Ok(())
    }
}
