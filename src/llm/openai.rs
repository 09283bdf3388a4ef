use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiSettings;
use crate::error::TransportError;
use crate::llm::{ChatMessage, CompletionRequest, CompletionService};

const SERVICE: &str = "openai";

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiClient {
    http: Client,
    settings: OpenAiSettings,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(settings: OpenAiSettings) -> Self {
        Self {
            http: Client::new(),
            settings,
        }
    }
}

impl CompletionService for OpenAiClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        let body = ChatRequest {
            model: &self.settings.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let mut req = self
            .http
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body);
        if let Some(org) = &self.settings.organization {
            req = req.header("OpenAI-Organization", org);
        }
        if let Some(project) = &self.settings.project {
            req = req.header("OpenAI-Project", project);
        }

        let resp = req.send().map_err(|source| TransportError::Http {
            service: SERVICE,
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            // auth failure bodies may quote the key
            let message = if status.as_u16() == 401 || status.as_u16() == 403 {
                format!("authentication failed (HTTP {})", status.as_u16())
            } else {
                resp.text()
                    .unwrap_or_else(|e| format!("<body read error: {e}>"))
            };
            return Err(TransportError::Status {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = resp.json().map_err(|e| TransportError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })?;
        let text = first_completion(parsed)?;
        debug!("completion ({} chars) from {}", text.len(), self.settings.model);
        Ok(text)
    }
}

fn first_completion(resp: ChatResponse) -> Result<String, TransportError> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| TransportError::Decode {
            service: SERVICE,
            message: "response has no completion text".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape_matches_api() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            max_tokens: 50,
            temperature: None,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "s"},
                    {"role": "user", "content": "u"}
                ],
                "max_tokens": 50
            })
        );
    }

    #[test]
    fn takes_first_choice_trimmed() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "  1. Order Tracking \n"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_completion(resp).unwrap(), "1. Order Tracking");
    }

    #[test]
    fn empty_choices_is_decode_error() {
        let resp: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            first_completion(resp),
            Err(TransportError::Decode { .. })
        ));
    }
}
