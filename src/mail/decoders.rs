use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Local, TimeZone, Utc};

use crate::mail::api::{ApiMessage, Payload};

const HTML_WRAP_WIDTH: usize = 80;

/// Decode a Gmail base64url payload. Padding is optional on the wire.
pub fn decode_base64url(data: &str) -> Option<Vec<u8>> {
    let trimmed = data.trim().trim_end_matches('=');
    general_purpose::URL_SAFE_NO_PAD.decode(trimmed).ok()
}

pub fn encode_base64url(raw: &[u8]) -> String {
    general_purpose::URL_SAFE.encode(raw)
}

/// Message body as text.
///
/// The first MIME part that carries data wins, then the top-level payload
/// body, then the snippet.
pub fn extract_body(msg: &ApiMessage) -> String {
    if let Some(text) = msg.payload.parts.iter().find_map(part_text) {
        return text;
    }
    if let Some(text) = payload_text(&msg.payload) {
        return text;
    }
    unescape_snippet(&msg.snippet)
}

fn part_text(p: &Payload) -> Option<String> {
    if let Some(text) = payload_text(p) {
        return Some(text);
    }
    p.parts.iter().find_map(part_text)
}

fn payload_text(p: &Payload) -> Option<String> {
    let bytes = decode_base64url(p.data()?)?;
    let is_html = p
        .mime_type
        .as_deref()
        .is_some_and(|m| m.eq_ignore_ascii_case("text/html"));
    if is_html {
        let lossy = String::from_utf8_lossy(&bytes).into_owned();
        return Some(html2text::from_read(bytes.as_slice(), HTML_WRAP_WIDTH).unwrap_or(lossy));
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Display name of an address header, e.g. `"Jane Doe" <jane@x.org>` -> `Jane Doe`.
pub fn addr_name(raw: &str) -> String {
    if let Ok(list) = mailparse::addrparse(raw) {
        if let Some(mailparse::MailAddr::Single(info)) = list.first() {
            return match &info.display_name {
                Some(n) if !n.trim().is_empty() => n.trim().to_string(),
                _ => info.addr.clone(),
            };
        }
    }
    match raw.find('<') {
        Some(i) => raw[..i].trim().trim_matches('"').to_string(),
        None => raw.trim().to_string(),
    }
}

/// Bare address of a header value: the text inside `<...>`, or the value itself.
pub fn addr_spec(raw: &str) -> String {
    let raw = raw.trim();
    match (raw.find('<'), raw.rfind('>')) {
        (Some(start), Some(end)) if start < end => raw[start + 1..end].trim().to_string(),
        _ => raw.to_string(),
    }
}

/// Parse a `Date` header, falling back to Gmail's `internalDate` (ms).
pub fn message_date(header: Option<&str>, internal_date: Option<&str>) -> Option<DateTime<Utc>> {
    let parsed = header
        .and_then(|h| mailparse::dateparse(h).ok())
        .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single());
    if parsed.is_some() {
        return parsed;
    }
    let ms = internal_date?.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(ms).single()
}

/// `19 Oct 2026 14:05`, in local time.
pub fn format_local(date: &DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%d %b %Y %H:%M").to_string()
}

/// Gmail snippets come HTML-escaped.
pub fn unescape_snippet(s: &str) -> String {
    s.replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
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

pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::api::PartBody;

    fn body(data: &str) -> Option<PartBody> {
        Some(PartBody {
            data: Some(data.to_string()),
            size: None,
        })
    }

    fn message(payload: Payload) -> ApiMessage {
        ApiMessage {
            id: "m1".into(),
            thread_id: "t1".into(),
            snippet: "snippet &amp; more".into(),
            payload,
            ..ApiMessage::default()
        }
    }

    #[test]
    fn body_prefers_part_over_payload() {
        let msg = message(Payload {
            body: body(&encode_base64url(b"top level")),
            parts: vec![Payload {
                mime_type: Some("text/plain".into()),
                body: body(&encode_base64url(b"from part")),
                ..Payload::default()
            }],
            ..Payload::default()
        });
        assert_eq!(extract_body(&msg), "from part");
    }

    #[test]
    fn body_walks_nested_parts() {
        let msg = message(Payload {
            parts: vec![Payload {
                mime_type: Some("multipart/alternative".into()),
                parts: vec![Payload {
                    mime_type: Some("text/plain".into()),
                    body: body(&encode_base64url(b"nested")),
                    ..Payload::default()
                }],
                ..Payload::default()
            }],
            ..Payload::default()
        });
        assert_eq!(extract_body(&msg), "nested");
    }

    #[test]
    fn body_falls_back_to_payload_then_snippet() {
        let msg = message(Payload {
            body: body(&encode_base64url(b"single part")),
            ..Payload::default()
        });
        assert_eq!(extract_body(&msg), "single part");

        let msg = message(Payload::default());
        assert_eq!(extract_body(&msg), "snippet & more");
    }

    #[test]
    fn base64url_accepts_missing_padding() {
        assert_eq!(decode_base64url("aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode_base64url("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_base64url("-_8").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn address_helpers() {
        assert_eq!(addr_name("\"Jane Doe\" <jane@example.com>"), "Jane Doe");
        assert_eq!(addr_name("jane@example.com"), "jane@example.com");
        assert_eq!(addr_spec("Jane Doe <jane@example.com>"), "jane@example.com");
        assert_eq!(addr_spec(" jane@example.com "), "jane@example.com");
    }

    #[test]
    fn date_uses_header_then_internal_date() {
        let d = message_date(Some("Tue, 14 Nov 2023 22:13:20 +0000"), None).unwrap();
        assert_eq!(d.timestamp(), 1_700_000_000);

        let d = message_date(None, Some("1700000000000")).unwrap();
        assert_eq!(d.timestamp(), 1_700_000_000);

        let d = message_date(Some("Tue, 14 Foo 2023 22:13:20 +0000"), Some("1700000000000"));
        assert_eq!(d.unwrap().timestamp(), 1_700_000_000);

        assert!(message_date(None, None).is_none());
    }

    #[test]
    fn snippet_normalization() {
        assert_eq!(normalize_snippet("  a\n\n  b  \nc", 100), "a b c");
        assert_eq!(normalize_snippet("abcdef", 3), "abc");
    }
}
