//! End-to-end formula parsing and evaluation

use pretty_assertions::assert_eq;
use scalc_formula::{
    Context, ErrorPhase, FormulaEngine, FormulaError, FormulaSettings, ReferenceFn, Single, Value,
    MAX_NESTING_DEPTH, MAX_PLAN_DEPTH,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn engine() -> FormulaEngine {
    FormulaEngine::new(FormulaSettings::new()).unwrap()
}

fn n(text: &str) -> Value {
    Value::number(text).unwrap()
}

/// Multiplication binds tighter than addition; groups override it
#[test]
fn test_precedence() {
    let engine = engine();
    let ctx = Context::new();
    assert_eq!(engine.evaluate("1 + 2 * 3", &ctx).unwrap(), n("7"));
    assert_eq!(engine.evaluate("(1 + 2) * 3", &ctx).unwrap(), n("9"));
    assert_eq!(engine.evaluate("7 % 4 * 2 ^ 2", &ctx).unwrap(), n("12"));
    assert_eq!(engine.evaluate("1 < 2 == 2 > 1", &ctx).unwrap(), Value::Bool(true));
}

/// Decimal arithmetic is exact
#[test]
fn test_exact_decimals() {
    let engine = engine();
    let ctx = Context::new();
    assert_eq!(engine.evaluate("1.005 * 1000", &ctx).unwrap(), n("1005"));
    assert_eq!(engine.evaluate("0.1 + 0.2 == 0.3", &ctx).unwrap(), Value::Bool(true));
    assert_eq!(engine.evaluate("1 / 4 * 4", &ctx).unwrap().to_string(), "1");
    assert_eq!(
        engine.evaluate("2 / 3", &ctx).unwrap().to_string(),
        "0.66666666666666666667"
    );
    assert_eq!(engine.evaluate("'1_000.50' + 1", &ctx).unwrap(), n("1001.5"));
}

/// Prefix operators
#[test]
fn test_unary_operators() {
    let engine = engine();
    let ctx = Context::new().with("x", 10);
    assert_eq!(engine.evaluate("-x", &ctx).unwrap(), n("-10"));
    assert_eq!(engine.evaluate("--x", &ctx).unwrap(), n("10"));
    assert_eq!(engine.evaluate("+'4'", &ctx).unwrap(), n("4"));
    assert_eq!(engine.evaluate("!0", &ctx).unwrap(), Value::Bool(true));
    assert_eq!(engine.evaluate("!1", &ctx).unwrap(), Value::Bool(false));
}

/// Missing references fail unless a default is configured
#[test]
fn test_references() {
    let expr = engine().parse("x + 1").unwrap();
    assert_eq!(expr.evaluate(&Context::new().with("x", 10)).unwrap(), n("11"));

    let err = expr.evaluate(&Context::new()).unwrap_err();
    assert_eq!(err, FormulaError::UnknownReference("x".into()));
    assert_eq!(err.phase(), ErrorPhase::Evaluation);

    let lenient = FormulaEngine::new(FormulaSettings::new().with_default_value(Value::Null)).unwrap();
    assert_eq!(lenient.evaluate("x + 1", &Context::new()).unwrap(), n("1"));
}

/// A bare date outside a literal is arithmetic
#[test]
fn test_date_shaped_formula_is_arithmetic() {
    assert_eq!(engine().evaluate("2025-8-1", &Context::new()).unwrap(), n("2016"));
}

/// Registered functions receive evaluated arguments
#[test]
fn test_function_call() {
    let settings = FormulaSettings::new().with_function("x", |args: &[Value], _ctx: &Context| {
        Ok(Value::Number(args[0].to_number().add(&10.into())))
    });
    let engine = FormulaEngine::new(settings).unwrap();
    assert_eq!(engine.evaluate("x(5) + 1", &Context::new()).unwrap(), n("16"));
    assert_eq!(engine.evaluate("x(x(1); )", &Context::new()).unwrap_err().phase(), ErrorPhase::Parse);
}

/// Functions see the evaluation context
#[test]
fn test_function_receives_context() {
    let settings = FormulaSettings::new().with_function("rate", |_args: &[Value], ctx: &Context| {
        Ok(ctx.get("rate").cloned().unwrap_or(Value::Null))
    });
    let expr = FormulaEngine::new(settings).unwrap().parse("100 * rate()").unwrap();
    let ctx = Context::new().with("rate", n("0.07"));
    assert_eq!(expr.evaluate(&ctx).unwrap(), n("7"));
}

/// Built-in functions
#[test]
fn test_builtins() {
    let engine = engine();
    let ctx = Context::from_json(serde_json::json!({"items": [3, 4.5, "1"], "flag": false})).unwrap();
    assert_eq!(engine.evaluate("sum(items)", &ctx).unwrap(), n("8.5"));
    assert_eq!(engine.evaluate("max(items, 10)", &ctx).unwrap(), n("10"));
    assert_eq!(engine.evaluate("if(flag, 'yes', 'no')", &ctx).unwrap(), Value::from("no"));
    assert_eq!(engine.evaluate("round(2 / 3, 2)", &ctx).unwrap(), n("0.67"));
    assert_eq!(
        engine.evaluate("coalesce(missing ?? 1, 2)", &ctx).unwrap_err(),
        FormulaError::UnknownReference("missing".into())
    );
}

/// Division by zero is an evaluation error, not infinity
#[test]
fn test_divide_by_zero() {
    let expr = engine().parse("a / b").unwrap();
    let ctx = Context::new().with("a", 1).with("b", 0);
    assert!(matches!(expr.evaluate(&ctx), Err(FormulaError::Arithmetic(_))));
}

/// Parse-time errors
#[test]
fn test_parse_errors() {
    let engine = engine();
    for (text, expected) in [
        ("1 +", FormulaError::TrailingOperator),
        ("1 2", FormulaError::MissingOperator),
        ("(1", FormulaError::UnmatchedDelimiter('(')),
        ("nope(1)", FormulaError::UnknownFunction("nope".into())),
        ("a ~ b", FormulaError::InvalidToken("~".into())),
        ("a => b", FormulaError::UnknownOperator("=".into())),
    ] {
        let err = engine.parse(text).unwrap_err();
        assert_eq!(err, expected, "{}", text);
        assert_eq!(err.phase(), ErrorPhase::Parse);
    }
}

/// The same text and context always give the same result
#[test]
fn test_determinism() {
    let engine = engine();
    let ctx = Context::new().with("a", n("1.1")).with("b", n("2.2"));
    let first = engine.evaluate("a * b - a / b", &ctx).unwrap();
    for _ in 0..3 {
        assert_eq!(engine.evaluate("a * b - a / b", &ctx).unwrap(), first);
    }
}

/// Custom resolvers are built once per name and called on every evaluation
#[test]
fn test_custom_reference_resolver() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let settings = FormulaSettings::new().with_reference(move |name: &str| -> Result<ReferenceFn, FormulaError> {
        counter.fetch_add(1, Ordering::SeqCst);
        let key = name.to_uppercase();
        Ok(Arc::new(move |ctx: &Context| {
            ctx.get(&key)
                .cloned()
                .ok_or_else(|| FormulaError::UnknownReference(key.clone()))
        }))
    });
    let engine = FormulaEngine::new(settings).unwrap();

    let expr = engine.parse("a + a * b").unwrap();
    engine.parse("a - b").unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 2);

    let ctx = Context::new().with("A", 2).with("B", 3);
    assert_eq!(expr.evaluate(&ctx).unwrap(), n("8"));
    let stats = engine.cache().stats();
    assert_eq!(stats.resolver_misses, 2);
    assert_eq!(stats.resolver_hits, 3);
}

/// Legacy mode concatenates strings with `+`
#[test]
fn test_legacy_mode() {
    let legacy = FormulaEngine::new(FormulaSettings::new().numeric_mode(false)).unwrap();
    let numeric = engine();
    let ctx = Context::new().with("name", "Ada").with("count", 2).with("none", Value::Null);

    assert_eq!(legacy.evaluate("'Hi ' + name", &ctx).unwrap(), Value::from("Hi Ada"));
    assert_eq!(legacy.evaluate("none + name", &ctx).unwrap(), Value::from("Ada"));
    assert_eq!(legacy.evaluate("count + '3'", &ctx).unwrap(), n("5"));
    assert_eq!(legacy.evaluate("name || 'x'", &ctx).unwrap(), Value::from("Ada"));
    assert_eq!(legacy.evaluate("none ?? name", &ctx).unwrap(), Value::from("Ada"));

    assert_eq!(numeric.evaluate("'Hi ' + name", &ctx).unwrap(), n("0"));
    assert_eq!(numeric.evaluate("name || 'x'", &ctx).unwrap(), n("0"));
    assert_eq!(numeric.evaluate("none ?? count", &ctx).unwrap(), n("2"));
}

/// Named constants replace references
#[test]
fn test_constants() {
    let settings = FormulaSettings::new().with_constant("PI", n("3.14159"));
    let engine = FormulaEngine::new(settings).unwrap();
    assert_eq!(engine.evaluate("2 * PI", &Context::new()).unwrap(), n("6.28318"));
    assert!(matches!(engine.parse("PI").unwrap().single(), Some(Single::Value(_))));
}

/// Interpreter and plan agree, and the plan is used by default
#[test]
fn test_plan_and_interpreter_agree() {
    let expr = engine().parse("(a + 1) * 2 > b && c ?? 4").unwrap();
    assert!(expr.has_plan());
    let ctx = Context::new().with("a", 1).with("b", 3).with("c", Value::Null);
    assert_eq!(expr.evaluate(&ctx).unwrap(), expr.evaluate_interpreted(&ctx).unwrap());

    let no_plan = FormulaEngine::new(FormulaSettings::new().compile(false)).unwrap();
    assert!(!no_plan.parse("a + 1").unwrap().has_plan());
}

/// Long operator chains keep their plan and match the interpreter
#[test]
fn test_long_sum() {
    let engine = engine();
    let ctx = Context::new().with("x", n("0.5"));

    let sum = vec!["x"; 5000].join(" + ");
    let expr = engine.parse(&sum).unwrap();
    assert!(expr.has_plan());
    assert_eq!(expr.evaluate(&ctx).unwrap(), n("2500"));
    assert_eq!(expr.evaluate_interpreted(&ctx).unwrap(), n("2500"));

    let mixed = vec!["x * 2 - 1"; 5000].join(" + ");
    let expr = engine.parse(&mixed).unwrap();
    assert_eq!(expr.evaluate(&ctx).unwrap(), n("0"));
    assert_eq!(expr.evaluate_interpreted(&ctx).unwrap(), n("0"));
}

/// Deep nesting is a parse error instead of a crash
#[test]
fn test_deep_parentheses() {
    let engine = engine();
    let text = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
    let err = engine.parse(&text).unwrap_err();
    assert_eq!(err, FormulaError::NestingTooDeep(MAX_NESTING_DEPTH));
    assert_eq!(err.phase(), ErrorPhase::Parse);

    let unbalanced = "(".repeat(5000);
    assert_eq!(
        engine.parse(&unbalanced).unwrap_err(),
        FormulaError::UnmatchedDelimiter('(')
    );
}

/// Nesting past the plan limit is interpreted
#[test]
fn test_nesting_between_limits() {
    let depth = MAX_PLAN_DEPTH + 1;
    assert!(depth <= MAX_NESTING_DEPTH);
    let text = format!("{}x + 1{}", "(".repeat(depth), ")".repeat(depth));
    let expr = engine().parse(&text).unwrap();
    assert!(!expr.has_plan());
    assert_eq!(expr.evaluate(&Context::new().with("x", 2)).unwrap(), n("3"));
}
