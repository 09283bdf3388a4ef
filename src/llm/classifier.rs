//! Sorts a customer message into one of the support categories.

use std::fmt;

use crate::error::TransportError;
use crate::llm::{ChatMessage, CompletionRequest, CompletionService};

const CLASSIFIER_SYSTEM: &str = "You are a helpful assistant.";
const CLASSIFIER_MAX_TOKENS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    OrderTracking,
    ReturnsOrExchanges,
    ComplaintAboutProducts,
    Other,
}

impl Category {
    const ANSWERABLE: [Category; 3] = [
        Category::OrderTracking,
        Category::ReturnsOrExchanges,
        Category::ComplaintAboutProducts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::OrderTracking => "Order Tracking",
            Category::ReturnsOrExchanges => "Returns or Exchanges",
            Category::ComplaintAboutProducts => "Complaint About Products",
            Category::Other => "Other",
        }
    }

    fn number(self) -> Option<u32> {
        match self {
            Category::OrderTracking => Some(1),
            Category::ReturnsOrExchanges => Some(2),
            Category::ComplaintAboutProducts => Some(3),
            Category::Other => None,
        }
    }

    /// Decode a model reply such as "1. Order Tracking", "order tracking" or "2".
    /// Anything unrecognised is `Other`.
    pub fn parse(raw: &str) -> Category {
        let markup = |c: char| matches!(c, '"' | '\'' | '*' | '`' | '_');
        let s = raw.trim().trim_matches(markup).trim().to_lowercase();

        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        // "1. **Order Tracking**" leaves emphasis between the number and the name
        let rest = s[digits.len()..]
            .trim_start_matches(|c: char| {
                matches!(c, '.' | ')' | ':' | '-') || markup(c) || c.is_whitespace()
            })
            .trim_end_matches(|c: char| matches!(c, '.' | '!') || markup(c) || c.is_whitespace());

        if let Some(cat) = Self::ANSWERABLE
            .into_iter()
            .find(|c| rest.starts_with(&c.name().to_lowercase()))
        {
            return cat;
        }

        if rest.is_empty()
            && let Ok(n) = digits.parse::<u32>()
            && let Some(cat) = Self::ANSWERABLE.into_iter().find(|c| c.number() == Some(n))
        {
            return cat;
        }

        Category::Other
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    /// Reply text as the model produced it.
    pub label: String,
}

pub fn classification_prompt(body: &str) -> String {
    format!(
        r#"You are a helpful assistant. Categorize the following email into one of these categories:
1. Order Tracking
2. Returns or Exchanges
3. Complaint About Products
If the email does not match any of these categories, label it as 'Other'.

Email Content: "{body}"
Provide only the category number and name as the response."#
    )
}

pub fn classify(
    llm: &dyn CompletionService,
    body: &str,
) -> Result<Classification, TransportError> {
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(CLASSIFIER_SYSTEM),
            ChatMessage::user(classification_prompt(body)),
        ],
        max_tokens: CLASSIFIER_MAX_TOKENS,
        temperature: None,
    };
    let label = llm.complete(&request)?.trim().to_string();
    Ok(Classification {
        category: Category::parse(&label),
        label,
    })
}
