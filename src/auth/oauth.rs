use anyhow::{Result, anyhow};
use log::{info, warn};
use oauth2::TokenResponse;
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, PkceCodeChallenge, RedirectUrl,
    RefreshToken, Scope, TokenUrl,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use url::Url;

use crate::auth::credentials::OAuthClient;
use crate::auth::token_store;

/// Tokens returned by an auth flow (in-memory)
#[derive(Debug)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

fn basic_client(client: &OAuthClient, client_secret: Option<&str>) -> Result<BasicClient> {
    let client_id = ClientId::new(client.client_id.clone());
    let client_secret = client_secret.map(|s| ClientSecret::new(s.to_string()));
    let auth_url = AuthUrl::new(client.auth_uri.clone())?;
    let token_url = TokenUrl::new(client.token_uri.clone())?;
    Ok(BasicClient::new(
        client_id,
        client_secret,
        auth_url,
        Some(token_url),
    ))
}

/// Exchange a refresh token for a new access token using the oauth2 crate
pub fn refresh_access_token(
    client: &OAuthClient,
    client_secret: Option<&str>,
    refresh_token: &str,
) -> Result<Tokens> {
    let oauth_client = basic_client(client, client_secret)?;

    let rt = RefreshToken::new(refresh_token.to_string());
    let token = oauth_client
        .exchange_refresh_token(&rt)
        .request(http_client)?;

    Ok(Tokens {
        access_token: token.access_token().secret().to_string(),
        refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        expires_in: token.expires_in().map(|d| d.as_secs()),
    })
}

/// Loopback address the callback server must bind to for `redirect_uri`.
fn callback_bind_addr(redirect: &Url) -> Result<SocketAddr> {
    let host = redirect
        .host_str()
        .ok_or_else(|| anyhow!("redirect_uri missing host: {redirect}"))?;

    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| anyhow!("redirect_uri missing/unknown port: {redirect}"))?;

    let bind_ip: IpAddr = match host {
        "localhost" | "127.0.0.1" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other.parse::<IpAddr>().map_err(|_| {
            anyhow!("redirect_uri host must be localhost/127.0.0.1 or an IP: {other}")
        })?,
    };

    Ok(SocketAddr::new(bind_ip, port))
}

/// Perform Authorization Code + PKCE flow for `mailbox`. Opens the system
/// browser and captures the code via a tiny loopback server.
pub fn perform_pkce_flow(
    client: &OAuthClient,
    client_secret: Option<&str>,
    redirect_uri: &str,
    scopes: &[&str],
    mailbox: &str,
) -> Result<Tokens> {
    let redirect = Url::parse(redirect_uri)
        .map_err(|e| anyhow!("Invalid redirect_uri '{redirect_uri}': {e}"))?;
    let bind_addr = callback_bind_addr(&redirect)?;

    // Listen before handing out the URL so the redirect cannot race us
    let server = Server::http(bind_addr)
        .map_err(|e| anyhow!("Failed to bind OAuth callback server on {bind_addr}: {e:?}"))?;

    let oauth_client = basic_client(client, client_secret)?
        .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let mut request = oauth_client
        .authorize_url(oauth2::CsrfToken::new_random)
        .set_pkce_challenge(pkce_challenge)
        .add_extra_param("access_type", "offline")
        .add_extra_param("login_hint", mailbox);
    for scope in scopes {
        request = request.add_scope(Scope::new(scope.to_string()));
    }
    let (auth_url, _csrf_token) = request.url();

    println!("Open this URL in your browser to authorise {mailbox}:\n{auth_url}");
    if let Err(e) = open::that(auth_url.as_str()) {
        warn!("could not open browser automatically: {e}");
    }

    let mut code_opt: Option<String> = None;
    let wait_until = Instant::now() + Duration::from_secs(120);

    while Instant::now() < wait_until {
        let Ok(maybe_request) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };

        let Some(request) = maybe_request else {
            continue;
        };

        // request.url() is only path+query
        let full = format!(
            "{}://{}{}",
            redirect.scheme(),
            bind_addr,
            request.url()
        );

        match Url::parse(&full) {
            Ok(parsed) => {
                code_opt = parsed
                    .query_pairs()
                    .find(|(k, _)| k == "code")
                    .map(|(_, v)| v.into_owned());

                let reply = if code_opt.is_some() {
                    "Authorization received. You can close this tab."
                } else {
                    "No code found in redirect. You can close this tab."
                };
                let _ = request.respond(Response::from_string(reply));
                if code_opt.is_some() {
                    break;
                }
            }
            Err(_) => {
                let _ = request.respond(Response::from_string("Bad redirect"));
            }
        }
    }

    let code = code_opt.ok_or_else(|| anyhow!("No code received within timeout"))?;

    let token = oauth_client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request(http_client)
        .map_err(|e| anyhow!("Token exchange failed: {e:?}"))?;

    let refresh = token.refresh_token().map(|r| r.secret().to_string());
    if let Some(ref_token) = &refresh {
        match token_store::save_refresh_token(mailbox, ref_token) {
            Ok(()) => info!("saved refresh token into keyring for {mailbox}"),
            Err(e) => warn!("could not store refresh token in keyring: {e}"),
        }
    }

    Ok(Tokens {
        access_token: token.access_token().secret().to_string(),
        refresh_token: refresh,
        expires_in: token.expires_in().map(|d| d.as_secs()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_loopback_for_localhost() {
        let url = Url::parse("http://localhost:8080/callback").unwrap();
        assert_eq!(
            callback_bind_addr(&url).unwrap(),
            "127.0.0.1:8080".parse().unwrap()
        );
    }

    #[test]
    fn rejects_hostname_redirects() {
        let url = Url::parse("http://auth.example.com/callback").unwrap();
        assert!(callback_bind_addr(&url).is_err());
    }
}
