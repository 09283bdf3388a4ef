use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

/// Gmail hands out base64url both with and without trailing `=`.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64url body into UTF-8 text. `None` on either decoding failure.
pub fn decode_body_data(data: &str) -> Option<String> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = URL_SAFE_LENIENT.decode(compact.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}

pub fn normalize_snippet(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(line);
        if out.chars().count() >= max_chars {
            break;
        }
    }
    out.chars().take(max_chars).collect()
}

/// Decode RFC 2047 encoded-words in a header value.
pub fn decode_mime_words(raw: &str) -> String {
    let mut line = b"X: ".to_vec();
    line.extend_from_slice(raw.as_bytes());
    line.extend_from_slice(b"\r\n");

    match mailparse::parse_header(&line) {
        Ok((h, _idx)) => h.get_value(),
        Err(_) => raw.to_string(),
    }
}

/// Bare address out of a `From`-style header ("Jane <jane@example.com>" -> "jane@example.com").
pub fn sender_address(from: &str) -> Option<String> {
    let decoded = decode_mime_words(from);
    mailparse::addrparse(&decoded)
        .ok()
        .and_then(|list| list.extract_single_info())
        .map(|info| info.addr)
        .filter(|a| a.contains('@'))
}
