//! Text helpers for producing JavaScript source

/// Strips the byte order mark from the start of a string if present.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{FEFF}').unwrap_or(text)
}

/// Escapes a string for embedding between double quotes in a JavaScript string literal.
///
/// Besides quotes, backslashes and control characters this also escapes U+2028 and
/// U+2029, which terminate string literals in engines that predate ES2019.
pub fn escape_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\u{2028}' => result.push_str("\\u2028"),
            '\u{2029}' => result.push_str("\\u2029"),
            c if c < '\x20' => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

/// Wrap text in double quotes as a JavaScript string literal
pub fn quote_js_string(s: &str) -> String {
    format!("\"{}\"", escape_js_string(s))
}
