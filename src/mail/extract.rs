//! Picks the most readable text out of a multipart payload tree.

use log::debug;

use crate::domain::email::{BodyText, MessagePart};
use crate::mail::decoders::decode_body_data;

const TEXT_PLAIN: &str = "text/plain";
const TEXT_HTML: &str = "text/html";

/// Best textual body of `payload`.
///
/// Among the direct children a `text/plain` leaf wins over a `text/html`
/// leaf, whichever comes first. Failing both, the children are searched
/// recursively in order, and last the node's own body data is tried.
/// Leaves that are empty or fail to decode are passed over.
pub fn extract_body(payload: &MessagePart) -> BodyText {
    match find_body(payload) {
        Some(text) => BodyText::Found(text),
        None => BodyText::Unavailable,
    }
}

fn find_body(payload: &MessagePart) -> Option<String> {
    if let Some(parts) = payload.parts.as_deref() {
        for mime in [TEXT_PLAIN, TEXT_HTML] {
            let hit = parts
                .iter()
                .filter(|p| p.mime_type.eq_ignore_ascii_case(mime))
                .find_map(decode_leaf);
            if hit.is_some() {
                return hit;
            }
        }

        for part in parts.iter().filter(|p| p.parts.is_some()) {
            if let Some(text) = find_body(part) {
                return Some(text);
            }
        }
    }

    decode_leaf(payload)
}

fn decode_leaf(part: &MessagePart) -> Option<String> {
    let data = part.data()?;
    match decode_body_data(data) {
        Some(text) if !text.trim().is_empty() => Some(text),
        Some(_) => None,
        None => {
            debug!(
                "skipping {} leaf: body data is not base64url UTF-8",
                part.mime_type
            );
            None
        }
    }
}
