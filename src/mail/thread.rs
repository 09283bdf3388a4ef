use crate::domain::email::{Message, Thread};

/// Latest message in `thread` that was not sent by `own_address`.
///
/// A message without a `From` header counts as inbound.
pub fn latest_inbound<'a>(thread: &'a Thread, own_address: &str) -> Option<&'a Message> {
    let own = own_address.to_ascii_lowercase();
    thread
        .messages
        .iter()
        .rev()
        .find(|m| !is_self_authored(m, &own))
}

fn is_self_authored(message: &Message, own_lowercase: &str) -> bool {
    let sender = message.header("from").unwrap_or_default();
    sender.to_ascii_lowercase().contains(own_lowercase)
}
