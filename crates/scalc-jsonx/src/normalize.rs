//! Relaxed literal text to strict JSON text
//!
//! A single forward scan over the input bytes. Structural characters are all
//! ASCII, so every slice boundary the scanner produces is a char boundary.

use crate::date::is_date_like;
use crate::tables::{is_ident_start, is_structural, is_ws};
use crate::wrap::wrap_function_like_values;
use scalc_decimal::is_decimal_literal;

/// Rewrite relaxed JSON5-like text into strict JSON text
///
/// - bare object keys are quoted
/// - bare numbers are quoted as strings (`_` separators and a leading `+` dropped)
/// - bare dates followed by a structural boundary are quoted
/// - `true`, `false` and `null` pass through
/// - any other bare value is quoted with `marker` in front of it
/// - single-quoted and backtick strings become double-quoted
/// - comments and trailing commas are dropped
///
/// With `wrap_function_calls`, values shaped like `name(...)` are first wrapped
/// whole as marked strings (see [`wrap_function_like_values`]).
///
/// # Example
/// ```rust
/// use scalc_jsonx::normalize;
///
/// let strict = normalize("{a: 1_000, b: 'x', c: [true, 2025-8-1,],}", "", false);
/// assert_eq!(strict, r#"{"a": "1000", "b": "x", "c": [true, "2025-8-1"]}"#);
/// ```
pub fn normalize(text: &str, marker: &str, wrap_function_calls: bool) -> String {
    if text.is_empty() {
        return String::new();
    }
    if wrap_function_calls {
        let wrapped = wrap_function_like_values(text, marker);
        return Normalizer::new(&wrapped, marker).run();
    }
    Normalizer::new(text, marker).run()
}

/// JSON string literal for `s`, quotes included
pub fn json_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

struct Normalizer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    out: String,
    marker: &'a str,
    /// One entry per open structure, `true` for objects
    stack: Vec<bool>,
    in_object_key: bool,
}

impl<'a> Normalizer<'a> {
    fn new(input: &'a str, marker: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            out: String::with_capacity(input.len() + input.len() / 4),
            marker,
            stack: Vec::new(),
            in_object_key: false,
        }
    }

    fn run(mut self) -> String {
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            match c {
                _ if is_ws(c) => self.copy_byte(),
                b'/' if self.at_comment() => self.skip_comment(),
                b'{' => {
                    self.stack.push(true);
                    self.in_object_key = true;
                    self.copy_byte();
                }
                b'[' => {
                    self.stack.push(false);
                    self.in_object_key = false;
                    self.copy_byte();
                }
                b':' => {
                    self.in_object_key = false;
                    self.copy_byte();
                }
                b',' => {
                    if !self.skip_trailing_comma() {
                        self.in_object_key = self.in_object();
                    }
                }
                b'}' | b']' => {
                    self.stack.pop();
                    self.in_object_key = self.in_object();
                    self.copy_byte();
                }
                b'"' => self.read_double_quoted(),
                b'\'' | b'`' => self.read_relaxed_quoted(c),
                _ => {
                    if c.is_ascii_digit() && self.try_read_date() {
                        continue;
                    }
                    if self.in_object_key {
                        self.read_key();
                    } else {
                        self.read_value();
                    }
                }
            }
        }
        self.out.trim().to_string()
    }

    fn in_object(&self) -> bool {
        self.stack.last().copied().unwrap_or(false)
    }

    fn copy_byte(&mut self) {
        let start = self.pos;
        self.pos += 1;
        self.out.push_str(&self.input[start..self.pos]);
    }

    /// Copy one whole character (used for bytes that start no token)
    fn copy_char(&mut self) {
        let width = self.input[self.pos..]
            .chars()
            .next()
            .map_or(1, char::len_utf8);
        let start = self.pos;
        self.pos += width;
        self.out.push_str(&self.input[start..self.pos]);
    }

    fn at_comment(&self) -> bool {
        self.bytes[self.pos] == b'/'
            && matches!(self.bytes.get(self.pos + 1), Some(b'/') | Some(b'*'))
    }

    fn skip_comment(&mut self) {
        let block = self.bytes[self.pos + 1] == b'*';
        self.pos += 2;
        if block {
            while self.pos + 1 < self.bytes.len() {
                if self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/' {
                    self.pos += 2;
                    return;
                }
                self.pos += 1;
            }
            self.pos = self.bytes.len();
        } else {
            while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                self.pos += 1;
            }
        }
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            while self.pos < self.bytes.len() && is_ws(self.bytes[self.pos]) {
                self.pos += 1;
            }
            if self.pos < self.bytes.len() && self.at_comment() {
                self.skip_comment();
                continue;
            }
            break;
        }
    }

    /// Consume a `,`; drop it when the next meaningful byte closes a structure
    fn skip_trailing_comma(&mut self) -> bool {
        self.pos += 1;
        let after_comma = self.pos;
        self.skip_ws_and_comments();
        if matches!(self.bytes.get(self.pos), Some(b'}') | Some(b']')) {
            return true;
        }
        self.pos = after_comma;
        self.out.push(',');
        false
    }

    fn read_double_quoted(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            self.pos += 1;
            if c == b'\\' {
                self.pos = (self.pos + 1).min(self.bytes.len());
                continue;
            }
            if c == b'"' {
                break;
            }
        }
        self.out.push_str(&self.input[start..self.pos]);
    }

    /// `'...'` or `` `...` `` as a JSON string
    fn read_relaxed_quoted(&mut self, quote: u8) {
        self.pos += 1;
        self.out.push('"');
        let mut run_start = self.pos;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            match c {
                b'\\' => {
                    self.out.push_str(&self.input[run_start..self.pos]);
                    match self.bytes.get(self.pos + 1) {
                        Some(&next) if next == quote => {
                            self.out.push(char::from(quote));
                            self.pos += 2;
                        }
                        Some(_) => {
                            // keep the escape as written; JSON validates it later
                            self.out.push('\\');
                            self.pos += 1;
                            self.copy_char();
                        }
                        None => self.pos += 1,
                    }
                    run_start = self.pos;
                }
                _ if c == quote => break,
                b'"' => {
                    self.out.push_str(&self.input[run_start..self.pos]);
                    self.out.push_str("\\\"");
                    self.pos += 1;
                    run_start = self.pos;
                }
                _ => self.pos += 1,
            }
        }
        let end = self.pos.min(self.bytes.len());
        self.out.push_str(&self.input[run_start..end]);
        self.out.push('"');
        if self.pos < self.bytes.len() {
            self.pos += 1;
        }
    }

    /// Quote a bare date when a structural boundary (or the end) follows it
    fn try_read_date(&mut self) -> bool {
        if self.in_object_key {
            return false;
        }
        let bytes = self.bytes;
        let start = self.pos;
        if start + 6 >= bytes.len() {
            return false;
        }
        if !bytes[start..start + 4].iter().all(u8::is_ascii_digit)
            || !matches!(bytes[start + 4], b'-' | b'.' | b'/')
        {
            return false;
        }

        let mut end = start + 5;
        while end < bytes.len()
            && (bytes[end].is_ascii_digit()
                || matches!(bytes[end], b'-' | b'.' | b'/' | b'T' | b':' | b'Z' | b'z' | b'+'))
        {
            end += 1;
        }
        let candidate = &self.input[start..end];
        if !(8..=35).contains(&candidate.len()) || !is_date_like(candidate) {
            return false;
        }
        if bytes.get(end).map_or(false, |&b| is_ident_start(b)) {
            return false;
        }

        let mut next = end;
        while next < bytes.len() && bytes[next] == b' ' {
            next += 1;
        }
        if next < bytes.len() && !matches!(bytes[next], b',' | b'}' | b']' | b':') {
            return false;
        }

        self.out.push('"');
        self.out.push_str(candidate);
        self.out.push('"');
        self.pos = end;
        true
    }

    fn read_key(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            if is_ws(c) || is_structural(c) || matches!(c, b'"' | b'\'' | b'`') || self.at_comment() {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            self.copy_char();
            return;
        }
        let key = &self.input[start..self.pos];
        self.out.push_str(&json_escape(key));
    }

    /// Advance over a bare value up to the next boundary at this nesting level
    fn scan_value(&mut self) {
        let (mut braces, mut brackets, mut parens) = (0usize, 0usize, 0usize);
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'{' => braces += 1,
                b'[' => brackets += 1,
                b'(' => parens += 1,
                b'}' if braces > 0 => braces -= 1,
                b'}' if brackets == 0 && parens == 0 => break,
                b']' if brackets > 0 => brackets -= 1,
                b']' if braces == 0 && parens == 0 => break,
                b')' if parens > 0 => parens -= 1,
                b',' if !self.stack.is_empty() && braces == 0 && brackets == 0 && parens == 0 => {
                    break
                }
                b'"' | b'\'' | b'`' => break,
                b'/' if self.at_comment() => break,
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn read_value(&mut self) {
        let input = self.input;
        let start = self.pos;
        self.scan_value();
        let raw = &input[start..self.pos];
        let token = raw.trim_start();
        if token.is_empty() {
            if raw.is_empty() {
                self.copy_char();
            } else {
                self.out.push_str(raw);
            }
            return;
        }

        let trimmed = token.trim_end();
        let trailing = &token[trimmed.len()..];

        if is_decimal_literal(trimmed) {
            self.out.push('"');
            let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
            self.out.extend(unsigned.chars().filter(|&c| c != '_'));
            self.out.push('"');
        } else if is_date_like(trimmed) {
            self.out.push_str(&json_escape(trimmed));
        } else if matches!(trimmed, "true" | "false" | "null") {
            self.out.push_str(trimmed);
        } else if self.marker.is_empty() {
            self.out.push_str(&json_escape(trimmed));
        } else {
            let mut marked = String::with_capacity(self.marker.len() + trimmed.len());
            marked.push_str(self.marker);
            marked.push_str(trimmed);
            self.out.push_str(&json_escape(&marked));
        }
        self.out.push_str(trailing);
    }
}
