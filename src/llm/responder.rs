//! Drafts the customer-facing reply and splits it into subject and body.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::domain::email::DraftReply;
use crate::error::TransportError;
use crate::llm::{ChatMessage, CompletionRequest, CompletionService};

pub const NO_SUBJECT: &str = "no subject found";
const REPLY_MAX_TOKENS: u32 = 250;
const REPLY_TEMPERATURE: f32 = 0.7;

/// Marker pairs the model is told to use, English first.
const MARKERS: [(&str, &str); 2] = [("subject:", "body:"), ("asunto:", "cuerpo:")];

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"));

/// Who the replies speak for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub brand: String,
    pub signer: String,
    pub signer_role: String,
    /// Self-service page for tracking, returns and exchanges.
    pub returns_url: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            brand: "Shameless Collective".to_string(),
            signer: "Santiago".to_string(),
            signer_role: "Co-founder".to_string(),
            returns_url: "https://e.amphoralogistics.com/457409f7-05cb-48b1-8805-6ac8f214552f"
                .to_string(),
        }
    }
}

impl Persona {
    pub fn system_prompt(&self) -> String {
        let Persona {
            brand,
            signer,
            signer_role,
            returns_url,
        } = self;
        let sign_off = format!("{signer} \n{signer_role} {brand}");
        format!(
            r#"You are a helpful and friendly assistant for an e-commerce clothing brand called {brand}.
Your tone is warm, empathetic, and professional.
Please structure your response as:
    - "subject": The subject line for the email.
    - "body": The email body text.

You respond to customer inquiries in a complete email format with:
1. A polite and appropriate subject line.
2. A greeting that addresses the customer warmly and, if the mood is good, a bit informally (e.g., "Dear Customer" or "Hi there").
3. A clear and structured response in the email body, based on the customer's query.
4. A closing message that thanks the customer for supporting the brand and encourages further communication.
5. A sign-off including your name and role ("{sign_off}").

Use the same language as the customer's query:
- If the query is in English, respond in English.
- If the query is in Spanish, respond in Spanish.
Don't translate the structure of the response, always keep the "subject" and "body" structure.

Use the following rules when responding:
- For tracking an order, always include this link: {returns_url} .
- For returns or exchanges, include this link: {returns_url} and explain the steps for requesting a return or exchange.
- For issues like wrong or stained items, apologize, assure the customer the issue will be resolved, and include instructions on how to request a replacement using the returns link. Also say that the change or return is completely free of charge.
- Use formatting like bullet points or numbered steps when helpful.
- Keep the response below 250 tokens.
- Do not use bold."#
        )
    }
}

pub fn generate_reply(
    llm: &dyn CompletionService,
    persona: &Persona,
    customer_text: &str,
) -> Result<DraftReply, TransportError> {
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(persona.system_prompt()),
            ChatMessage::user(customer_text),
        ],
        max_tokens: REPLY_MAX_TOKENS,
        temperature: Some(REPLY_TEMPERATURE),
    };
    let completion = llm.complete(&request)?;
    let mut draft = parse_reply(&completion);
    draft.body = bold_to_html(&draft.body);
    Ok(draft)
}

/// Split a completion on its subject/body markers (English or Spanish,
/// any case). Without a full marker pair the whole text is the body.
pub fn parse_reply(completion: &str) -> DraftReply {
    let text = completion.trim();
    MARKERS
        .iter()
        .find_map(|(subject, body)| split_on_markers(text, subject, body))
        .unwrap_or_else(|| DraftReply {
            subject: NO_SUBJECT.to_string(),
            body: text.to_string(),
        })
}

fn split_on_markers(text: &str, subject_marker: &str, body_marker: &str) -> Option<DraftReply> {
    // ASCII lowering keeps byte offsets valid for `text`
    let lower = text.to_ascii_lowercase();
    if !lower.contains(subject_marker) {
        return None;
    }
    let body_at = lower.find(body_marker)?;

    let head = &text[..body_at];
    let head_lower = &lower[..body_at];
    let subject = match head_lower.find(subject_marker) {
        Some(at) => format!("{}{}", &head[..at], &head[at + subject_marker.len()..]),
        None => head.to_string(),
    };

    let rest = &text[body_at + body_marker.len()..];
    let rest = rest.strip_prefix("**").unwrap_or(rest);

    Some(DraftReply {
        subject: subject
            .trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '"')
            .to_string(),
        body: rest.trim().to_string(),
    })
}

/// `**x**` -> `<b>x</b>`, pairwise. A dangling `**` stays as written.
pub fn bold_to_html(body: &str) -> String {
    BOLD.replace_all(body, "<b>$1</b>").into_owned()
}
