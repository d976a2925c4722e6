//! Utility functions for the stylec compiler

use crate::types::{FILE_HASH_LEN, FINGERPRINT_LEN};
use once_cell::sync::Lazy;
use regex::Regex;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

static CSS_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[A-Za-z_][A-Za-z0-9_-]*$").unwrap());

/// Hex md5 digest of `input`, truncated to `len` characters
pub fn short_hash(input: &str, len: usize) -> String {
    let digest = md5::compute(input.as_bytes());
    let mut encoded = hex::encode(digest.0);
    encoded.truncate(len);
    encoded
}

/// Fingerprint of exact CSS text; whitespace is significant
pub fn fingerprint(css: &str) -> String {
    short_hash(css, FINGERPRINT_LEN)
}

/// Hash identifying one source file in emitted unit keys
pub fn file_hash(path: &str) -> String {
    short_hash(&normalize_path(path), FILE_HASH_LEN)
}

/// Forward slashes only, so hashes agree across platforms
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Path relative to `root` when it lives under it, unchanged otherwise
pub fn relativize_path(path: &str, root: Option<&Path>) -> String {
    match root {
        Some(root) => Path::new(path)
            .strip_prefix(root)
            .map(|relative| relative.to_string_lossy().into_owned())
            .unwrap_or_else(|_| path.to_string()),
        None => path.to_string(),
    }
}

/// Keeps only `[A-Za-z0-9-]`
pub fn sanitize_class_segment(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

pub fn is_valid_css_identifier(name: &str) -> bool {
    CSS_IDENTIFIER.is_match(name)
}

/// Variant names end up inside class names, so they are restricted
pub fn is_valid_variant_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// JS string literal for `value`
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Decodes a quoted JS string literal's source text. Returns None for text
/// that is not a single- or double-quoted literal, or whose escapes are not
/// valid in module code.
pub fn unquote_js_string(literal: &str) -> Option<String> {
    let quote = literal.chars().next()?;
    if (quote != '"' && quote != '\'') || literal.len() < 2 || !literal.ends_with(quote) {
        return None;
    }

    let inner = &literal[1..literal.len() - 1];
    // UTF-16 units, so `\uD83D\uDE00` pairs combine the way JS does
    let mut units: Vec<u16> = Vec::with_capacity(inner.len());
    let mut buf = [0u16; 2];
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            units.extend_from_slice(ch.encode_utf16(&mut buf));
            continue;
        }
        match chars.next()? {
            'n' => units.push(0x0A),
            't' => units.push(0x09),
            'r' => units.push(0x0D),
            'b' => units.push(0x08),
            'f' => units.push(0x0C),
            'v' => units.push(0x0B),
            '0' if !chars.peek().is_some_and(char::is_ascii_digit) => units.push(0),
            // legacy octal escapes are errors in strict code
            '0'..='9' => return None,
            'x' => units.push(hex_value(&mut chars, 2)? as u16),
            'u' if chars.peek() == Some(&'{') => {
                chars.next();
                let mut value: u32 = 0;
                let mut digits = 0;
                loop {
                    let digit = chars.next()?;
                    if digit == '}' {
                        break;
                    }
                    value = value.checked_mul(16)?.checked_add(digit.to_digit(16)?)?;
                    digits += 1;
                }
                if digits == 0 || value > 0x10FFFF {
                    return None;
                }
                push_code_point(&mut units, value);
            }
            'u' => units.push(hex_value(&mut chars, 4)? as u16),
            // line continuations
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => units.extend_from_slice(other.encode_utf16(&mut buf)),
        }
    }
    Some(String::from_utf16_lossy(&units))
}

fn hex_value(chars: &mut Peekable<Chars<'_>>, count: usize) -> Option<u32> {
    (0..count).try_fold(0u32, |value, _| Some(value * 16 + chars.next()?.to_digit(16)?))
}

/// Lone surrogates are kept as single units
fn push_code_point(units: &mut Vec<u16>, value: u32) {
    match char::from_u32(value) {
        Some(ch) => {
            let mut buf = [0u16; 2];
            units.extend_from_slice(ch.encode_utf16(&mut buf));
        }
        None => units.push(value as u16),
    }
}

/// Line start table for converting byte offsets to line/column positions
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { text, line_starts }
    }

    /// Zero-based line and UTF-16 column of a byte offset
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let column = self
            .text
            .get(line_start..offset)
            .map(|prefix| prefix.encode_utf16().count())
            .unwrap_or(0);
        (line as u32, column as u32)
    }

    pub fn line_starts(&self) -> &[usize] {
        &self.line_starts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic_and_whitespace_sensitive() {
        let css = "padding: 1rem;";
        assert_eq!(fingerprint(css), fingerprint(&css.to_string()));
        assert_eq!(fingerprint(css).len(), FINGERPRINT_LEN);
        assert_ne!(fingerprint(css), fingerprint("padding:  1rem;"));
        assert_ne!(fingerprint(css), fingerprint("padding: 1rem;\n"));
        assert!(fingerprint(css).chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_file_hash_ignores_separator_style() {
        assert_eq!(file_hash("src\\Button.tsx"), file_hash("src/Button.tsx"));
        assert_ne!(file_hash("src/Button.tsx"), file_hash("src/Card.tsx"));
    }

    #[test]
    fn test_relativize_path() {
        let root = Path::new("/project");
        assert_eq!(relativize_path("/project/src/a.tsx", Some(root)), "src/a.tsx");
        assert_eq!(relativize_path("/elsewhere/a.tsx", Some(root)), "/elsewhere/a.tsx");
        assert_eq!(relativize_path("/project/a.tsx", None), "/project/a.tsx");
    }

    #[test]
    fn test_sanitize_class_segment() {
        assert_eq!(sanitize_class_segment("primary"), "primary");
        assert_eq!(
            sanitize_class_segment("primary; background:url(javascript:evil)"),
            "primarybackgroundurljavascriptevil"
        );
        assert_eq!(sanitize_class_segment("x-large"), "x-large");
        assert_eq!(sanitize_class_segment("<>;"), "");
    }

    #[test]
    fn test_identifier_checks() {
        assert!(is_valid_css_identifier("ss"));
        assert!(is_valid_css_identifier("my-app_1"));
        assert!(!is_valid_css_identifier("1abc"));
        assert!(!is_valid_css_identifier("a b"));

        assert!(is_valid_variant_name("size"));
        assert!(!is_valid_variant_name("size large"));
        assert!(!is_valid_variant_name(""));
    }

    #[test]
    fn test_unquote_js_string() {
        assert_eq!(unquote_js_string(r#""color: red;""#).as_deref(), Some("color: red;"));
        assert_eq!(unquote_js_string("'it\\'s'").as_deref(), Some("it's"));
        assert_eq!(unquote_js_string(r#""a\nb""#).as_deref(), Some("a\nb"));
        assert_eq!(unquote_js_string("`tpl`"), None);
        assert_eq!(unquote_js_string("\"unterminated"), None);
    }

    #[test]
    fn test_unquote_js_string_escape_grammar() {
        assert_eq!(
            unquote_js_string(r#"'content: "\u2014";'"#).as_deref(),
            Some("content: \"\u{2014}\";")
        );
        assert_eq!(unquote_js_string(r#""\u{1F600}""#).as_deref(), Some("\u{1F600}"));
        assert_eq!(unquote_js_string(r#""\uD83D\uDE00""#).as_deref(), Some("\u{1F600}"));
        assert_eq!(unquote_js_string(r#""\x41\x2d""#).as_deref(), Some("A-"));
        assert_eq!(unquote_js_string(r#""\b\f\v\0""#).as_deref(), Some("\u{8}\u{c}\u{b}\0"));
        assert_eq!(unquote_js_string("'a\\\r\nb'").as_deref(), Some("ab"));
        assert_eq!(unquote_js_string("'a\\\nb'").as_deref(), Some("ab"));
        assert_eq!(unquote_js_string(r#""\q\\""#).as_deref(), Some("q\\"));

        assert_eq!(unquote_js_string(r#""\xZZ""#), None);
        assert_eq!(unquote_js_string(r#""\u12""#), None);
        assert_eq!(unquote_js_string(r#""\u{110000}""#), None);
        assert_eq!(unquote_js_string(r#""\07""#), None);
    }

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("button"), "\"button\"");
        assert_eq!(js_string("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn test_line_index_positions() {
        let text = "ab\ncdé\nf";
        let index = LineIndex::new(text);
        assert_eq!(index.position(0), (0, 0));
        assert_eq!(index.position(3), (1, 0));
        assert_eq!(index.position(7), (1, 3));
        assert_eq!(index.position(text.len()), (2, 1));
        assert_eq!(index.line_starts(), &[0, 3, 8]);
    }
}
