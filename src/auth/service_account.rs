use anyhow::{Result, anyhow};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::credentials::ServiceAccountKey;
use crate::auth::oauth::Tokens;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Claims {
    iss: String,
    sub: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

fn assertion_claims(key: &ServiceAccountKey, subject: &str, scopes: &[&str], now: u64) -> Claims {
    Claims {
        iss: key.client_email.clone(),
        sub: subject.to_string(),
        scope: scopes.join(" "),
        aud: key.token_uri.clone(),
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    }
}

/// Exchange a signed assertion for an access token acting as `subject`.
pub fn fetch_delegated_token(
    key: &ServiceAccountKey,
    subject: &str,
    scopes: &[&str],
) -> Result<Tokens> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let claims = assertion_claims(key, subject, scopes, now);

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| anyhow!("invalid service account private key: {e}"))?;
    let assertion = encode(&header, &claims, &signing_key)?;

    let resp = reqwest::blocking::Client::new()
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp
            .text()
            .unwrap_or_else(|e| format!("<body read error: {e}>"));
        return Err(anyhow!(
            "token exchange for {subject} failed (HTTP {}): {body}",
            status.as_u16()
        ));
    }

    let token: TokenResponse = resp.json()?;
    Ok(Tokens {
        access_token: token.access_token,
        refresh_token: None,
        expires_in: token.expires_in,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_impersonate_subject() {
        let key = ServiceAccountKey {
            client_email: "bot@proj.iam.gserviceaccount.com".into(),
            private_key: String::new(),
            private_key_id: None,
            token_uri: "https://oauth2.googleapis.com/token".into(),
        };
        let c = assertion_claims(&key, "hello@shop.example", &["a", "b"], 1_000);
        assert_eq!(
            c,
            Claims {
                iss: "bot@proj.iam.gserviceaccount.com".into(),
                sub: "hello@shop.example".into(),
                scope: "a b".into(),
                aud: "https://oauth2.googleapis.com/token".into(),
                iat: 1_000,
                exp: 4_600,
            }
        );
    }

    #[test]
    fn rejects_garbage_private_key() {
        let key = ServiceAccountKey {
            client_email: "bot@proj.iam.gserviceaccount.com".into(),
            private_key: "not a pem".into(),
            private_key_id: None,
            token_uri: "http://127.0.0.1:9/token".into(),
        };
        let err = fetch_delegated_token(&key, "hello@shop.example", &["a"]).unwrap_err();
        assert!(err.to_string().contains("invalid service account private key"));
    }
}
