//! Function-call wrapping pre-pass
//!
//! A value such as `sum(a, b) * 2` spans commas and parentheses that the
//! normalizer would otherwise split or mangle. This pass finds value
//! positions containing an unquoted `name(` and replaces the whole value
//! with one marked JSON string, so it can be compiled later as an
//! expression of its own.

use crate::normalize::json_escape;
use crate::tables::{is_ident_part, is_ident_start, is_ws};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object,
    Array,
}

/// Wrap function-call shaped values of `text` as marker-prefixed JSON strings
///
/// Keys, quoted strings and values without a call are copied unchanged.
///
/// # Example
/// ```rust
/// use scalc_jsonx::wrap_function_like_values;
///
/// let wrapped = wrap_function_like_values("{a: max(1, 2), b: c}", "#");
/// assert_eq!(wrapped, r##"{a: "#max(1, 2)", b: c}"##);
/// ```
pub fn wrap_function_like_values(text: &str, marker: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + 16);
    let mut frames: Vec<Frame> = Vec::new();
    let mut expecting_key = false;
    let mut expecting_value = false;
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            // A quote in value position starts a value and is handled below
            b'"' | b'\'' | b'`' if expecting_key || !expecting_value => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'{' => {
                frames.push(Frame::Object);
                expecting_key = true;
                expecting_value = false;
            }
            b'[' => {
                frames.push(Frame::Array);
                expecting_key = false;
                expecting_value = true;
            }
            b'}' | b']' => {
                frames.pop();
                expecting_key = false;
                expecting_value = false;
            }
            b':' => {
                expecting_key = false;
                expecting_value = true;
            }
            b',' => match frames.last() {
                Some(Frame::Object) => {
                    expecting_key = true;
                    expecting_value = false;
                }
                Some(Frame::Array) => {
                    expecting_key = false;
                    expecting_value = true;
                }
                None => {}
            },
            _ if is_ws(c) || expecting_key || !expecting_value => {}
            _ => {
                let end = value_end(bytes, i);
                let segment = text[i..end].trim();
                if has_function_call(segment.as_bytes()) {
                    out.push_str(&text[copied..i]);
                    let mut marked = String::with_capacity(marker.len() + segment.len());
                    marked.push_str(marker);
                    if segment.contains(['{', '[']) {
                        marked.push_str(&single_to_double_quotes(segment));
                    } else {
                        marked.push_str(segment);
                    }
                    out.push_str(&json_escape(&marked));
                    copied = end;
                }
                expecting_value = false;
                expecting_key = frames.last() == Some(&Frame::Object);
                i = end;
                continue;
            }
        }
        i += 1;
    }

    out.push_str(&text[copied..]);
    out
}

/// Index just past the quoted run opened at `start`
fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// End of a value: the first top-level `,`, `}` or `]`
fn value_end(bytes: &[u8], start: usize) -> usize {
    let (mut parens, mut braces, mut brackets) = (0usize, 0usize, 0usize);
    let mut i = start;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'"' | b'\'' | b'`' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            b'{' => braces += 1,
            b'}' => braces = braces.saturating_sub(1),
            b'[' => brackets += 1,
            b']' => brackets = brackets.saturating_sub(1),
            _ => {}
        }
        if parens == 0 && braces == 0 && brackets == 0 && matches!(c, b',' | b'}' | b']') {
            return i;
        }
        i += 1;
    }
    bytes.len()
}

/// True when an unquoted identifier is followed (after whitespace) by `(`
fn has_function_call(segment: &[u8]) -> bool {
    let mut j = 0;
    while j < segment.len() {
        let c = segment[j];
        if matches!(c, b'"' | b'\'' | b'`') {
            j = skip_quoted(segment, j);
            continue;
        }
        if !is_ident_start(c) {
            j += 1;
            continue;
        }
        let mut k = j + 1;
        while k < segment.len() && is_ident_part(segment[k]) {
            k += 1;
        }
        let mut look = k;
        while look < segment.len() && is_ws(segment[look]) {
            look += 1;
        }
        if segment.get(look) == Some(&b'(') {
            return true;
        }
        j = k;
    }
    false
}

/// Turn single-quoted strings into double-quoted ones, outside double quotes
fn single_to_double_quotes(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let (mut in_single, mut in_double, mut escaped) = (false, false, false);
    for c in expr.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                out.push(c);
                escaped = true;
            }
            '"' => {
                out.push(c);
                if !in_single {
                    in_double = !in_double;
                }
            }
            '\'' if !in_double => {
                out.push('"');
                in_single = !in_single;
            }
            _ => out.push(c),
        }
    }
    out
}
