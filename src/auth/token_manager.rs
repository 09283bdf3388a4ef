use anyhow::Result;
use log::{debug, info};
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::credentials::{Credentials, load_credentials};
use crate::auth::tokens_file::{self, CachedToken};
use crate::auth::{GMAIL_SCOPES, oauth, service_account, token_store};
use crate::config::Settings;

/// Seconds before expiry at which a cached token is no longer handed out.
const EXPIRY_MARGIN_SECS: i64 = 60;
/// Assumed lifetime when the provider omits `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 3500;

pub struct TokenManager {
    credentials: Credentials,
    mailbox: String,
    redirect_uri: String,
    cache_path: PathBuf,
    current: RefCell<Option<CachedToken>>,
}

impl TokenManager {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            credentials: load_credentials(&settings.credentials_file)?,
            mailbox: settings.mailbox.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            cache_path: tokens_file::tokens_path()?,
            current: RefCell::new(None),
        })
    }

    /// Returns a valid access token; refreshes/re-authorises if needed.
    pub fn get_access_token(&self) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

        // 1) in memory
        if let Some(t) = self.current.borrow().as_ref()
            && t.is_fresh(now, EXPIRY_MARGIN_SECS)
        {
            return Ok(t.access_token.clone());
        }

        // 2) on disk
        if let Some(t) = tokens_file::load_token(&self.cache_path, &self.mailbox)?
            && t.is_fresh(now, EXPIRY_MARGIN_SECS)
        {
            debug!("using cached access token for {}", self.mailbox);
            let access = t.access_token.clone();
            *self.current.borrow_mut() = Some(t);
            return Ok(access);
        }

        // 3) fresh grant
        let tokens = self.fetch_tokens()?;
        let cached = CachedToken {
            expires_at_epoch: expiry_epoch(now, tokens.expires_in),
            access_token: tokens.access_token,
        };
        tokens_file::save_token(&self.cache_path, &self.mailbox, &cached)?;
        let access = cached.access_token.clone();
        *self.current.borrow_mut() = Some(cached);
        Ok(access)
    }

    fn fetch_tokens(&self) -> Result<oauth::Tokens> {
        match &self.credentials {
            Credentials::ServiceAccount(key) => {
                info!(
                    "requesting delegated token for {} via {}",
                    self.mailbox, key.client_email
                );
                service_account::fetch_delegated_token(key, &self.mailbox, GMAIL_SCOPES)
            }
            Credentials::OAuthClient(client) => {
                let client_secret = match &client.client_secret {
                    Some(s) => Some(s.clone()),
                    None => token_store::load_client_secret(&client.client_id)?
                        .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok()),
                };

                if let Some(rt) = token_store::load_refresh_token(&self.mailbox)? {
                    info!("refreshing access token for {}", self.mailbox);
                    let t = oauth::refresh_access_token(client, client_secret.as_deref(), &rt)?;
                    if let Some(new_rt) = &t.refresh_token {
                        token_store::save_refresh_token(&self.mailbox, new_rt)?;
                    }
                    return Ok(t);
                }

                info!(
                    "no refresh token for {}; running interactive PKCE flow",
                    self.mailbox
                );
                oauth::perform_pkce_flow(
                    client,
                    client_secret.as_deref(),
                    &self.redirect_uri,
                    GMAIL_SCOPES,
                    &self.mailbox,
                )
            }
        }
    }
}

/// Absolute expiry for a grant issued at `now`, clamped instead of wrapping.
fn expiry_epoch(now: i64, expires_in: Option<u64>) -> i64 {
    let lifetime = match expires_in {
        Some(s) => i64::try_from(s).unwrap_or(i64::MAX),
        None => DEFAULT_LIFETIME_SECS,
    };
    now.saturating_add(lifetime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_uses_provider_lifetime_or_default() {
        assert_eq!(expiry_epoch(1_000, Some(3_600)), 4_600);
        assert_eq!(expiry_epoch(1_000, None), 1_000 + DEFAULT_LIFETIME_SECS);
    }

    #[test]
    fn huge_lifetime_saturates() {
        assert_eq!(expiry_epoch(1_000, Some(u64::MAX)), i64::MAX);
        assert_eq!(expiry_epoch(1_000, Some(i64::MAX as u64)), i64::MAX);
    }
}
