//! End-to-end tests: relaxed text through strict JSON parsing

use pretty_assertions::assert_eq;
use scalc_jsonx::{normalize, parse_relaxed, JsonxError};
use serde_json::json;

const MARK: &str = "\u{1f}#";

/// Already-strict JSON parses to the same value after normalization
#[test]
fn test_strict_input_round_trips() {
    let strict = r#"{"name": "x", "list": [true, null, {"k": "v"}], "n": "12.5"}"#;
    let direct: serde_json::Value = serde_json::from_str(strict).unwrap();
    assert_eq!(parse_relaxed(strict, "", false).unwrap(), direct);
}

/// Native JSON numbers come out as decimal strings
#[test]
fn test_numbers_become_strings() {
    let value = parse_relaxed("[1, 2.50, -3e2]", "", false).unwrap();
    assert_eq!(value, json!(["1", "2.50", "-3e2"]));
}

/// A date followed by a boundary is a date string
#[test]
fn test_date_values() {
    let value = parse_relaxed("{from: 2025-8-1, to: 2025-12-31T23:59:59Z}", "", false).unwrap();
    assert_eq!(value, json!({"from": "2025-8-1", "to": "2025-12-31T23:59:59Z"}));
}

/// Bare words carry the marker so they can be recompiled later
#[test]
fn test_marker_on_bare_values() {
    let value = parse_relaxed("{a: 1+1, b: \"lit\", c: true}", MARK, false).unwrap();
    assert_eq!(value, json!({"a": "\u{1f}#1+1", "b": "lit", "c": true}));
}

/// Function calls survive with their inner commas when wrapping is enabled
#[test]
fn test_function_call_wrapping() {
    let value = parse_relaxed("{a: round(x, 2), b: [f(1, 2), 3]}", MARK, true).unwrap();
    assert_eq!(
        value,
        json!({"a": "\u{1f}#round(x, 2)", "b": ["\u{1f}#f(1, 2)", "3"]})
    );

    // without the pre-pass the value is still one token
    let plain = normalize("{a: round(x, 2)}", MARK, false);
    assert_eq!(plain, r#"{"a": "\u001f#round(x, 2)"}"#);
}

/// Key order follows the source text
#[test]
fn test_key_order_preserved() {
    let value = parse_relaxed("{z: 1, a: 2, m: 3}", "", false).unwrap();
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["z", "a", "m"]);
}

/// Malformed text surfaces as a JSON error, never a panic
#[test]
fn test_malformed_input() {
    for text in ["{a: 'unterminated", "{a: [1, 2}", "{", "{a: 1} trailing"] {
        assert!(matches!(parse_relaxed(text, "", false), Err(JsonxError::Parse(_))), "{text}");
    }
}

/// Nesting past the JSON depth limit is an error; wide input is fine
#[test]
fn test_size_and_nesting_limits() {
    let deep = format!("{}1{}", "[".repeat(1000), "]".repeat(1000));
    assert!(matches!(parse_relaxed(&deep, MARK, true), Err(JsonxError::Parse(_))));

    let nested = format!("{}1{}", "{a: ".repeat(100), "}".repeat(100));
    assert!(parse_relaxed(&nested, "", false).is_ok());

    let wide = format!("[{}]", vec!["1_0"; 10_000].join(", "));
    let value = parse_relaxed(&wide, "", true).unwrap();
    assert_eq!(value.as_array().map(Vec::len), Some(10_000));
    assert_eq!(value[9_999], json!("10"));
}

/// A date glued to a name is marked like any other bare value
#[test]
fn test_date_followed_by_name() {
    let value = parse_relaxed("{d: 2025-8-1x, e: 2025-8-1 , f: [2025-8-1]}", MARK, false).unwrap();
    assert_eq!(
        value,
        json!({"d": "\u{1f}#2025-8-1x", "e": "2025-8-1", "f": ["2025-8-1"]})
    );
}

/// Backtick strings are strings, commas included
#[test]
fn test_backtick_strings() {
    let value = parse_relaxed("{a: `x, y`, b: `q` + max(1, 2)}", MARK, true).unwrap();
    assert_eq!(value, json!({"a": "x, y", "b": "\u{1f}#`q` + max(1, 2)"}));
}
