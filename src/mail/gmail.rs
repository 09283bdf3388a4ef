use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::auth::token_manager::TokenManager;
use crate::domain::email::{Message, MessageRef, Thread};
use crate::error::TransportError;
use crate::mail::Mailbox;
use crate::mail::compose::encode_raw;

const SERVICE: &str = "gmail";
const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

/// Gmail REST client acting as the mailbox the token manager authorises.
pub struct GmailClient {
    http: Client,
    base_url: String,
    tokens: TokenManager,
}

impl GmailClient {
    pub fn new(tokens: TokenManager) -> Self {
        Self {
            http: Client::new(),
            base_url: GMAIL_API.to_string(),
            tokens,
        }
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, TransportError> {
        let token = self
            .tokens
            .get_access_token()
            .map_err(|e| TransportError::Auth(e.to_string()))?;
        Ok(req.bearer_auth(token))
    }

    fn execute(&self, req: RequestBuilder) -> Result<Response, TransportError> {
        let resp = self
            .authorized(req)?
            .send()
            .map_err(|source| TransportError::Http {
                service: SERVICE,
                source,
            })?;
        check_status(resp)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, TransportError> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = self.execute(self.http.get(&url).query(query))?;
        resp.json().map_err(|e| TransportError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })
    }
}

fn check_status(resp: Response) -> Result<Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = if status.as_u16() == 401 || status.as_u16() == 403 {
        format!("authentication failed (HTTP {})", status.as_u16())
    } else {
        resp.text()
            .unwrap_or_else(|e| format!("<body read error: {e}>"))
    };
    Err(TransportError::Status {
        service: SERVICE,
        status: status.as_u16(),
        message,
    })
}

impl Mailbox for GmailClient {
    fn list_unread(&self, query: &str) -> Result<Vec<MessageRef>, TransportError> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: ListMessagesResponse = {
                let mut params = vec![("q", query)];
                if let Some(t) = page_token.as_deref() {
                    params.push(("pageToken", t));
                }
                self.get_json("messages", &params)?
            };
            out.extend(page.messages);

            match page.next_page_token {
                Some(t) if !t.is_empty() => page_token = Some(t),
                _ => break,
            }
        }

        debug!("query '{query}' matched {} messages", out.len());
        Ok(out)
    }

    fn get_message(&self, id: &str) -> Result<Message, TransportError> {
        self.get_json(&format!("messages/{id}"), &[("format", "full")])
    }

    fn get_thread(&self, id: &str) -> Result<Thread, TransportError> {
        self.get_json(&format!("threads/{id}"), &[("format", "full")])
    }

    fn send(&self, raw: &[u8], thread_id: Option<&str>) -> Result<MessageRef, TransportError> {
        let mut body = json!({ "raw": encode_raw(raw) });
        if let Some(t) = thread_id {
            body["threadId"] = json!(t);
        }
        let url = format!("{}/messages/send", self.base_url);
        let resp = self.execute(self.http.post(&url).json(&body))?;
        resp.json().map_err(|e| TransportError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })
    }

    fn mark_read(&self, id: &str) -> Result<(), TransportError> {
        let url = format!("{}/messages/{id}/modify", self.base_url);
        let body = json!({ "removeLabelIds": ["UNREAD"] });
        self.execute(self.http.post(&url).json(&body))?;
        Ok(())
    }
}
