use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::config_dir;

/// Non-secret access token cache stored in ~/.config/mail_responder/tokens.json
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TokensFile {
    #[serde(default)]
    pub mailboxes: BTreeMap<String, CachedToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at_epoch: i64, // epoch seconds
}

impl CachedToken {
    /// Usable for at least `margin_secs` more seconds.
    pub fn is_fresh(&self, now: i64, margin_secs: i64) -> bool {
        now + margin_secs < self.expires_at_epoch
    }
}

pub fn tokens_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("tokens.json");
    Ok(p)
}

/// Cached token for `mailbox`, if the file has one
pub fn load_token(path: &Path, mailbox: &str) -> Result<Option<CachedToken>> {
    Ok(load_file(path)?.mailboxes.get(mailbox).cloned())
}

/// Replace the cached token for `mailbox`, keeping the others
pub fn save_token(path: &Path, mailbox: &str, token: &CachedToken) -> Result<()> {
    let mut tf = load_file(path)?;
    tf.mailboxes.insert(mailbox.to_string(), token.clone());
    let s = serde_json::to_string_pretty(&tf)?;
    fs::write(path, s)?;
    Ok(())
}

fn load_file(path: &Path) -> Result<TokensFile> {
    if !path.exists() {
        return Ok(TokensFile::default());
    }
    let s = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&s)?)
}
