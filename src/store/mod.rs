pub mod repo;
pub mod sqlite;

use anyhow::Result;
use log::info;
use std::path::Path;

use crate::store::repo::{MemoryLedger, ReplyLedger};
use crate::store::sqlite::SqliteLedger;

/// SQLite ledger when a path is configured, otherwise an in-process one.
pub fn open_ledger(path: Option<&Path>) -> Result<Box<dyn ReplyLedger>> {
    match path {
        Some(p) => {
            info!("recording answered messages in {}", p.display());
            Ok(Box::new(SqliteLedger::open(p)?))
        }
        None => Ok(Box::new(MemoryLedger::default())),
    }
}
