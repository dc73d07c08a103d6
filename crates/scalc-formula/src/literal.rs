//! Embedded literal trees
//!
//! `{...}` and `[...]` fragments inside a formula are normalized by
//! `scalc-jsonx`, parsed as strict JSON and turned into a [`LiteralNode`]
//! tree. Values the normalizer flagged with [`LITERAL_MARKER`] are compiled as
//! nested expressions and evaluated with the enclosing formula's context.

use crate::error::{FormulaError, FormulaResult};
use crate::expression::Expression;
use crate::value::{Context, Value};
use indexmap::IndexMap;
use scalc_decimal::{is_decimal_literal, ScaledDecimal};

/// Prefix the normalizer puts on bare values that must be re-parsed
pub const LITERAL_MARKER: &str = "\u{1f}#";

/// One node of an embedded literal
#[derive(Debug, Clone)]
pub enum LiteralNode {
    Literal(Value),
    Array(Vec<LiteralNode>),
    Object(IndexMap<String, LiteralNode>),
    /// Nested expression and its source text
    Expr { expression: Expression, source: String },
}

impl LiteralNode {
    /// Build a tree from strict JSON
    ///
    /// `compile` is called for every marker-carrying string; when it fails the
    /// string is kept, minus the marker. Nesting past the parser limit is the
    /// one compile failure that is returned instead.
    pub(crate) fn from_json<F>(json: serde_json::Value, compile: &mut F) -> FormulaResult<Self>
    where
        F: FnMut(&str) -> FormulaResult<Expression>,
    {
        Ok(match json {
            serde_json::Value::String(s) => match s.strip_prefix(LITERAL_MARKER) {
                Some(source) => match compile(source) {
                    Ok(expression) => LiteralNode::Expr {
                        expression,
                        source: source.to_string(),
                    },
                    Err(e @ FormulaError::NestingTooDeep(_)) => return Err(e),
                    Err(e) => {
                        log::debug!("literal value {:?} kept as text: {}", source, e);
                        LiteralNode::Literal(Value::String(source.to_string()))
                    }
                },
                None => LiteralNode::Literal(string_value(s)),
            },
            serde_json::Value::Array(items) => LiteralNode::Array(
                items
                    .into_iter()
                    .map(|item| LiteralNode::from_json(item, compile))
                    .collect::<FormulaResult<_>>()?,
            ),
            serde_json::Value::Object(map) => LiteralNode::Object(
                map.into_iter()
                    .map(|(key, value)| LiteralNode::from_json(value, compile).map(|node| (key, node)))
                    .collect::<FormulaResult<_>>()?,
            ),
            scalar => LiteralNode::Literal(Value::from(scalar)),
        })
    }

    /// True when no node needs a context
    pub fn is_constant(&self) -> bool {
        match self {
            LiteralNode::Literal(_) => true,
            LiteralNode::Array(items) => items.iter().all(LiteralNode::is_constant),
            LiteralNode::Object(map) => map.values().all(LiteralNode::is_constant),
            LiteralNode::Expr { .. } => false,
        }
    }

    /// Evaluate against `ctx`
    ///
    /// A nested expression naming something the context lacks evaluates to
    /// its own source text, so bare words stay words.
    pub fn evaluate(&self, ctx: &Context) -> FormulaResult<Value> {
        match self {
            LiteralNode::Literal(value) => Ok(value.clone()),
            LiteralNode::Array(items) => items
                .iter()
                .map(|item| item.evaluate(ctx))
                .collect::<FormulaResult<Vec<_>>>()
                .map(Value::Array),
            LiteralNode::Object(map) => map
                .iter()
                .map(|(key, node)| Ok((key.clone(), node.evaluate(ctx)?)))
                .collect::<FormulaResult<IndexMap<_, _>>>()
                .map(Value::Object),
            LiteralNode::Expr { expression, source } => match expression.evaluate(ctx) {
                Err(FormulaError::UnknownReference(_)) => Ok(Value::String(source.clone())),
                other => other,
            },
        }
    }

    /// Names referenced by nested expressions
    pub(crate) fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            LiteralNode::Literal(_) => {}
            LiteralNode::Array(items) => items.iter().for_each(|item| item.collect_references(out)),
            LiteralNode::Object(map) => map.values().for_each(|node| node.collect_references(out)),
            LiteralNode::Expr { expression, .. } => expression.collect_references(out),
        }
    }
}

/// Plain strings that read as decimals become numbers
fn string_value(s: String) -> Value {
    if is_decimal_literal(&s) {
        if let Ok(n) = ScaledDecimal::parse(&s) {
            return Value::Number(n);
        }
    }
    Value::String(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FormulaEngine;
    use crate::settings::FormulaSettings;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn build(json: serde_json::Value) -> LiteralNode {
        let engine = FormulaEngine::new(FormulaSettings::new()).unwrap();
        LiteralNode::from_json(json, &mut |text: &str| engine.parse(text)).unwrap()
    }

    fn marked(text: &str) -> String {
        format!("{}{}", LITERAL_MARKER, text)
    }

    #[test]
    fn test_scalars() {
        let tree = build(json!(["1.50", "x", true, null, 2]));
        assert!(tree.is_constant());
        assert_eq!(
            tree.evaluate(&Context::new()).unwrap(),
            Value::Array(vec![
                Value::number("1.5").unwrap(),
                Value::from("x"),
                Value::Bool(true),
                Value::Null,
                Value::from(2),
            ])
        );
    }

    #[test]
    fn test_nested_expression() {
        let tree = build(json!({"a": marked("1+1"), "b": "lit", "c": marked("rate * 2")}));
        assert!(!tree.is_constant());

        let value = tree.evaluate(&Context::new().with("rate", 4)).unwrap();
        assert_eq!(value.to_string(), r#"{"a": 2, "b": "lit", "c": 8}"#);
    }

    #[test]
    fn test_bare_word_stays_text() {
        let tree = build(json!({"status": marked("pending")}));
        let value = tree.evaluate(&Context::new()).unwrap();
        assert_eq!(value.to_string(), r#"{"status": "pending"}"#);
    }

    #[test]
    fn test_unparseable_marker_text() {
        let tree = build(json!([marked("1 +")]));
        assert!(tree.is_constant());
        assert_eq!(
            tree.evaluate(&Context::new()).unwrap(),
            Value::Array(vec![Value::from("1 +")])
        );
    }

    #[test]
    fn test_other_errors_propagate() {
        let tree = build(json!([marked("1 / 0")]));
        assert!(matches!(
            tree.evaluate(&Context::new()),
            Err(FormulaError::Arithmetic(_))
        ));
    }

    #[test]
    fn test_nesting_limit_is_not_swallowed() {
        let mut too_deep = |_: &str| -> FormulaResult<Expression> {
            Err(FormulaError::NestingTooDeep(128))
        };
        let built = LiteralNode::from_json(json!({"a": [marked("x")]}), &mut too_deep);
        assert_eq!(built.err(), Some(FormulaError::NestingTooDeep(128)));
    }

    #[test]
    fn test_collect_references() {
        let tree = build(json!({"a": marked("x + y"), "b": [marked("z")]}));
        let mut names = Vec::new();
        tree.collect_references(&mut names);
        assert_eq!(names, vec!["x", "y", "z"]);
    }
}
