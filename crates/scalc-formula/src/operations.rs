//! Operator semantics shared by the interpreter and the plan

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::error::FormulaResult;
use crate::value::Value;
use scalc_decimal::{is_decimal_literal, ScaledDecimal};
use std::cmp::Ordering;

/// Apply a prefix operator
pub(crate) fn unary(op: UnaryOperator, value: &Value) -> Value {
    match op {
        UnaryOperator::Not => Value::Bool(!value.is_truthy()),
        UnaryOperator::Negate => Value::Number(value.to_number().neg()),
        UnaryOperator::Plus => Value::Number(value.to_number()),
    }
}

/// Outcome of looking at the left side of `&&`, `||` or `??`
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ShortCircuit {
    /// The left side decides the result
    Done(Value),
    /// The right side has to be evaluated and passed to [`settle`]
    Continue,
}

/// Decide a short-circuit operator from its left operand alone, if possible
pub(crate) fn short_circuit(op: BinaryOperator, left: &Value, numeric: bool) -> ShortCircuit {
    let left = if numeric && !(op == BinaryOperator::Coalesce && left.is_null()) {
        Value::Number(left.to_number())
    } else {
        left.clone()
    };
    let decided = match op {
        BinaryOperator::And => !left.is_truthy(),
        BinaryOperator::Or => left.is_truthy(),
        _ => !left.is_null(),
    };
    if decided {
        ShortCircuit::Done(left)
    } else {
        ShortCircuit::Continue
    }
}

/// Result of a short-circuit operator whose left side did not decide
pub(crate) fn settle(op: BinaryOperator, right: Value, numeric: bool) -> Value {
    if !numeric || (op == BinaryOperator::Coalesce && right.is_null()) {
        return right;
    }
    Value::Number(right.to_number())
}

/// Apply a binary operator to two evaluated operands
pub(crate) fn binary(
    op: BinaryOperator,
    left: Value,
    right: Value,
    numeric: bool,
) -> FormulaResult<Value> {
    if op.is_short_circuit() {
        return Ok(match short_circuit(op, &left, numeric) {
            ShortCircuit::Done(value) => value,
            ShortCircuit::Continue => settle(op, right, numeric),
        });
    }
    if numeric {
        return arithmetic(op, &left.to_number(), &right.to_number());
    }

    match op {
        BinaryOperator::Add if is_text(&left) || is_text(&right) => {
            let mut text = left.to_text();
            text.push_str(&right.to_text());
            Ok(Value::String(text))
        }
        BinaryOperator::Equal => Ok(Value::Bool(left == right)),
        BinaryOperator::NotEqual => Ok(Value::Bool(left != right)),
        BinaryOperator::Less
        | BinaryOperator::LessEqual
        | BinaryOperator::Greater
        | BinaryOperator::GreaterEqual => Ok(Value::Bool(matches_ordering(op, compare(&left, &right)))),
        _ => arithmetic(op, &left.to_number(), &right.to_number()),
    }
}

/// Strings that do not read as numbers take part in concatenation
fn is_text(value: &Value) -> bool {
    matches!(value, Value::String(s) if !is_decimal_literal(s.trim()))
}

/// Legacy ordering: strings lexicographically, everything else by number
fn compare(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::String(l), Value::String(r)) => l.cmp(r),
        _ => left.to_number().cmp(&right.to_number()),
    }
}

fn matches_ordering(op: BinaryOperator, ordering: Ordering) -> bool {
    match op {
        BinaryOperator::Less => ordering == Ordering::Less,
        BinaryOperator::LessEqual => ordering != Ordering::Greater,
        BinaryOperator::Greater => ordering == Ordering::Greater,
        BinaryOperator::GreaterEqual => ordering != Ordering::Less,
        BinaryOperator::Equal => ordering == Ordering::Equal,
        _ => ordering != Ordering::Equal,
    }
}

fn arithmetic(op: BinaryOperator, l: &ScaledDecimal, r: &ScaledDecimal) -> FormulaResult<Value> {
    let value = match op {
        BinaryOperator::Power => Value::Number(l.pow(r)?),
        BinaryOperator::Multiply => Value::Number(l.mul(r)),
        BinaryOperator::Divide => Value::Number(l.checked_div(r)?),
        BinaryOperator::Modulo => Value::Number(l.rem(r)?),
        BinaryOperator::Add => Value::Number(l.add(r)),
        BinaryOperator::Subtract => Value::Number(l.sub(r)),
        // Short-circuit operators never get here; compare their numbers anyway
        _ => Value::Bool(matches_ordering(op, l.cmp(r))),
    };
    Ok(value)
}
