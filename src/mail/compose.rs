use base64::{Engine as _, engine::general_purpose};
use lettre::message::Mailbox as MailAddress;
use lettre::message::header::ContentType;

use crate::domain::email::MessageId;
use crate::error::ContentError;

/// Everything needed to put a reply on the wire.
pub struct OutgoingReply<'a> {
    /// Gmail id of the message being answered.
    pub answering: &'a str,
    pub from: &'a str,
    pub to: &'a str,
    /// `Message-ID` of the customer's message when replying in-thread.
    pub in_reply_to: Option<&'a str>,
    pub subject: &'a str,
    pub body: &'a str,
}

impl OutgoingReply<'_> {
    fn compose_error(&self, reason: String) -> ContentError {
        ContentError::Compose {
            id: MessageId::from(self.answering),
            reason,
        }
    }
}

/// Subject for an in-thread answer: `Re: <original>`, never `Re: Re:`.
/// `None` when the original carries no subject to follow.
pub fn reply_subject(original: &str) -> Option<String> {
    let original = original.trim();
    if original.is_empty() {
        return None;
    }
    let already_reply = original
        .get(..3)
        .is_some_and(|p| p.eq_ignore_ascii_case("re:"));
    if already_reply {
        Some(original.to_string())
    } else {
        Some(format!("Re: {original}"))
    }
}

/// Render the reply as a text/plain RFC 5322 message.
pub fn build_reply(reply: &OutgoingReply<'_>) -> Result<Vec<u8>, ContentError> {
    let from: MailAddress = reply
        .from
        .parse()
        .map_err(|e| reply.compose_error(format!("invalid from address '{}': {e}", reply.from)))?;
    let to: MailAddress = reply
        .to
        .parse()
        .map_err(|e| reply.compose_error(format!("invalid to address '{}': {e}", reply.to)))?;

    let mut builder = lettre::Message::builder()
        .from(from)
        .to(to)
        .subject(reply.subject);

    if let Some(id) = reply.in_reply_to {
        builder = builder
            .in_reply_to(id.to_string())
            .references(id.to_string());
    }

    let message = builder
        .header(ContentType::TEXT_PLAIN)
        .body(reply.body.to_string())
        .map_err(|e| reply.compose_error(format!("failed to build email: {e}")))?;

    Ok(message.formatted())
}

/// Transport envelope for the Gmail `raw` field.
pub fn encode_raw(rfc822: &[u8]) -> String {
    general_purpose::URL_SAFE.encode(rfc822)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailparse::MailHeaderMap;

    #[test]
    fn builds_plain_text_reply() {
        let raw = build_reply(&OutgoingReply {
            answering: "m1",
            from: "hello@shop.example",
            to: "ops@shop.example",
            in_reply_to: None,
            subject: "Your order",
            body: "Thanks!",
        })
        .unwrap();

        let parsed = mailparse::parse_mail(&raw).unwrap();
        assert_eq!(
            parsed.headers.get_first_value("To").as_deref(),
            Some("ops@shop.example")
        );
        assert_eq!(
            parsed.headers.get_first_value("Subject").as_deref(),
            Some("Your order")
        );
        assert_eq!(parsed.ctype.mimetype, "text/plain");
        assert_eq!(parsed.get_body().unwrap().trim(), "Thanks!");
        assert!(parsed.headers.get_first_value("In-Reply-To").is_none());
    }

    #[test]
    fn threads_reply_headers() {
        let raw = build_reply(&OutgoingReply {
            answering: "m1",
            from: "hello@shop.example",
            to: "ana@example.com",
            in_reply_to: Some("<abc@mail.example>"),
            subject: "Re: pedido",
            body: "¡Gracias por tu compra!",
        })
        .unwrap();

        let parsed = mailparse::parse_mail(&raw).unwrap();
        assert_eq!(
            parsed.headers.get_first_value("In-Reply-To").as_deref(),
            Some("<abc@mail.example>")
        );
        assert!(parsed.get_body().unwrap().contains("¡Gracias"));
    }

    #[test]
    fn rejects_bad_recipient() {
        let err = build_reply(&OutgoingReply {
            answering: "m9",
            from: "hello@shop.example",
            to: "not an address",
            in_reply_to: None,
            subject: "s",
            body: "b",
        })
        .unwrap_err();
        match err {
            ContentError::Compose { id, reason } => {
                assert_eq!(id, "m9");
                assert!(reason.contains("invalid to address"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reply_subject_prefixes_once() {
        assert_eq!(
            reply_subject("Where is my order").as_deref(),
            Some("Re: Where is my order")
        );
        assert_eq!(reply_subject("RE: pedido").as_deref(), Some("RE: pedido"));
        assert_eq!(reply_subject("  "), None);
    }

    #[test]
    fn raw_envelope_is_url_safe() {
        let encoded = encode_raw(&[0xfb, 0xff, 0xfe]);
        assert!(!encoded.contains('+') && !encoded.contains('/'));
    }
}
