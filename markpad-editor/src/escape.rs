//! String escaping for script arguments and script results.

use std::str::Chars;

/// Convert CRLF and lone CR to LF. Document content is normalized before it
/// is escaped, so the surface only ever sees LF line endings.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Escape `s` for embedding inside a double-quoted script string literal.
///
/// The substitution order matters: backslashes first, so the escapes added by
/// the later steps are not escaped again.
pub fn escape_script_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Inverse of [`escape_script_string`].
///
/// Scans left to right so that an escaped backslash followed by a literal
/// `n` decodes back to `\n` rather than a newline. Also understands the
/// additional escapes a JSON encoder may produce (`\/`, `\b`, `\f`, `\uXXXX`).
/// Unknown escapes are kept verbatim.
pub fn unescape_script_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => match decode_unicode_escape(&mut chars) {
                Some(ch) => out.push(ch),
                None => out.push_str("\\u"),
            },
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Decode a script result as returned by the surface.
///
/// String results arrive JSON-encoded: exactly one leading and one trailing
/// quote are stripped and the rest is unescaped. A bare `null` means the
/// surface had nothing to return. Any other unquoted result is passed
/// through unchanged.
pub fn decode_script_result(raw: &str) -> Option<String> {
    if raw == "null" {
        return None;
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return Some(unescape_script_string(&raw[1..raw.len() - 1]));
    }
    Some(raw.to_string())
}

fn take_hex4(chars: &mut Chars<'_>) -> Option<u32> {
    let mut lookahead = chars.clone();
    let mut value = 0u32;
    for _ in 0..4 {
        value = value * 16 + lookahead.next()?.to_digit(16)?;
    }
    *chars = lookahead;
    Some(value)
}

fn decode_unicode_escape(chars: &mut Chars<'_>) -> Option<char> {
    let high = take_hex4(chars)?;
    if (0xD800..0xDC00).contains(&high) {
        let mut lookahead = chars.clone();
        if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
            if let Some(low) = take_hex4(&mut lookahead) {
                if (0xDC00..0xE000).contains(&low) {
                    *chars = lookahead;
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    return Some(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
            }
        }
        return Some(char::REPLACEMENT_CHARACTER);
    }
    Some(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPHABET: [char; 10] = ['\\', '"', '\n', '\r', '\t', 'n', 'r', 't', 'u', 'a'];

    /// Every string over `ALPHABET` up to `max_len` characters.
    fn all_strings(max_len: usize) -> Vec<String> {
        let mut all = vec![String::new()];
        let mut frontier = vec![String::new()];
        for _ in 0..max_len {
            let mut next = Vec::new();
            for prefix in &frontier {
                for c in ALPHABET {
                    let mut s = prefix.clone();
                    s.push(c);
                    next.push(s);
                }
            }
            all.extend(next.iter().cloned());
            frontier = next;
        }
        all
    }

    #[test]
    fn escape_uses_fixed_substitutions() {
        assert_eq!(
            escape_script_string("a\\b\"c\nd\re\tf"),
            "a\\\\b\\\"c\\nd\\re\\tf"
        );
    }

    #[test]
    fn escape_is_a_bijection_on_special_characters() {
        for s in all_strings(4) {
            assert_eq!(unescape_script_string(&escape_script_string(&s)), s, "{:?}", s);
        }
    }

    #[test]
    fn escaped_backslash_before_letter_n_is_not_a_newline() {
        let original = "C:\\notes\\readme.md";
        let escaped = escape_script_string(original);
        assert_eq!(escaped, "C:\\\\notes\\\\readme.md");
        assert_eq!(unescape_script_string(&escaped), original);
    }

    #[test]
    fn normalize_line_endings_converts_crlf_and_cr() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn decode_script_result_strips_one_quote_pair() {
        assert_eq!(
            decode_script_result("\"line 1\\nline \\\"2\\\"\"").as_deref(),
            Some("line 1\nline \"2\"")
        );
        assert_eq!(decode_script_result("\"\"").as_deref(), Some(""));
        assert_eq!(decode_script_result("\"\"\"\"").as_deref(), Some("\"\""));
    }

    #[test]
    fn decode_script_result_null_is_none() {
        assert_eq!(decode_script_result("null"), None);
        assert_eq!(decode_script_result("\"null\"").as_deref(), Some("null"));
    }

    #[test]
    fn decode_script_result_passes_unquoted_values_through() {
        assert_eq!(decode_script_result("42").as_deref(), Some("42"));
        assert_eq!(decode_script_result("\"").as_deref(), Some("\""));
    }

    #[test]
    fn decode_script_result_reads_json_encoder_output() {
        let content = "# Title\r\n\tcode \\ \"quoted\" / \u{1}\u{1F600} é";
        let encoded = serde_json::to_string(content).unwrap();
        assert_eq!(decode_script_result(&encoded).as_deref(), Some(content));
    }

    #[test]
    fn unicode_escapes_decode_including_surrogate_pairs() {
        assert_eq!(unescape_script_string("\\u00e9"), "é");
        assert_eq!(unescape_script_string("\\ud83d\\ude00"), "\u{1F600}");
        assert_eq!(unescape_script_string("\\ud83dx"), "\u{FFFD}x");
        assert_eq!(unescape_script_string("\\u12"), "\\u12");
    }

    #[test]
    fn unknown_escapes_are_kept() {
        assert_eq!(unescape_script_string("\\q"), "\\q");
        assert_eq!(unescape_script_string("trailing\\"), "trailing\\");
    }
}
