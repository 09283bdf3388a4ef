use serde::{Deserialize, Serialize};

pub type MessageId = String;
pub type ThreadId = String;

/// Entry of a `messages.list` page: just enough to locate the thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: MessageId,
    pub thread_id: ThreadId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    #[serde(default)]
    pub thread_id: ThreadId,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

impl Message {
    /// First header value with this name (case-insensitive) on the top-level payload.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.header(name))
    }
}

/// One node of the payload tree. A node normally carries body data or
/// child parts; both may be present or absent in practice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Option<Vec<MessagePart>>,
}

impl MessagePart {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// The base64url body data, if any.
    pub fn data(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.data.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attachment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    /// Arrival order, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Result of body extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyText {
    Found(String),
    Unavailable,
}

impl BodyText {
    pub fn into_option(self) -> Option<String> {
        match self {
            BodyText::Found(s) => Some(s),
            BodyText::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftReply {
    pub subject: String,
    pub body: String,
}
