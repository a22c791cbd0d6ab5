//! Embedded state payload located by its script marker.

use serde_json::Value;

pub(crate) const PAYLOAD_MARKER: &str = "window.__PINIA__";

/// Returns the byte offset just past the object that opens at the start of
/// `s`, or `None` if `s` does not start with `{` or the object never closes.
///
/// Braces inside string literals are ignored, and a backslash inside a
/// string escapes the following character.
pub(crate) fn find_json_end(s: &str) -> Option<usize> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth: u32 = 0;
    let mut in_string = false;
    let mut escape = false;
    for (i, c) in s.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses the payload assigned after [`PAYLOAD_MARKER`].
pub(crate) fn extract_payload(html: &str) -> Option<Value> {
    let marker = html.find(PAYLOAD_MARKER)?;
    let start = marker + html[marker..].find('{')?;
    let end = start + find_json_end(&html[start..])?;
    match serde_json::from_str(&html[start..end]) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "extract: embedded payload is not valid JSON");
            None
        }
    }
}

/// First entry (in document order) of `page.structures`.
pub(crate) fn listing_root(payload: &Value) -> Option<&Value> {
    payload
        .get("page")?
        .get("structures")?
        .as_object()?
        .values()
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanner_ignores_braces_inside_strings() {
        let s = r#"{"a":"x{y}z","b":1} trailing"#;
        assert_eq!(find_json_end(s), Some(r#"{"a":"x{y}z","b":1}"#.len()));
    }

    #[test]
    fn scanner_honours_escaped_quotes() {
        let s = r#"{"a":"say \"}\" now"} rest"#;
        let end = find_json_end(s).unwrap();
        assert_eq!(&s[..end], r#"{"a":"say \"}\" now"}"#);
    }

    #[test]
    fn scanner_handles_nesting_and_multibyte_text() {
        let s = r#"{"t":"пробіг","n":{"m":{}}};"#;
        let end = find_json_end(s).unwrap();
        assert_eq!(&s[end..], ";");
    }

    #[test]
    fn scanner_rejects_unterminated_object() {
        assert_eq!(find_json_end(r#"{"a":{"b":1}"#), None);
        assert_eq!(find_json_end("no brace"), None);
    }

    #[test]
    fn payload_is_parsed_after_marker() {
        let html = r#"<script>window.__PINIA__ = {"page":{"structures":{"s1":{"k":1},"s2":{"k":2}}}};</script>"#;
        let payload = extract_payload(html).unwrap();
        let root = listing_root(&payload).unwrap();
        assert_eq!(root["k"], 1);
    }

    #[test]
    fn invalid_payload_is_absent() {
        assert!(extract_payload("<script>window.__PINIA__ = {page: undefined};</script>").is_none());
        assert!(extract_payload("<html></html>").is_none());
    }
}
