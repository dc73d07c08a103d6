//! Math functions

use super::argument;
use crate::error::{FormulaError, FormulaResult};
use crate::value::{Context, Value};
use scalc_decimal::{RoundingMode, ScaledDecimal};

/// Numbers of the arguments, with arrays flattened one level
fn numbers(args: &[Value]) -> Vec<ScaledDecimal> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::Array(items) => out.extend(items.iter().filter_map(Value::as_number)),
            other => out.extend(other.as_number()),
        }
    }
    out
}

/// ABS function
pub fn fn_abs(args: &[Value], _ctx: &Context) -> FormulaResult<Value> {
    Ok(Value::Number(argument(args, 0, "abs")?.to_number().abs()))
}

/// ROUND function: half away from zero, optional number of places
pub fn fn_round(args: &[Value], _ctx: &Context) -> FormulaResult<Value> {
    let value = argument(args, 0, "round")?;
    let places = match args.get(1) {
        Some(arg) => arg
            .to_number()
            .to_i64()
            .and_then(|p| u32::try_from(p).ok())
            .ok_or_else(|| FormulaError::function("round", "places must be a non-negative integer"))?,
        None => 0,
    };
    Ok(Value::Number(value.to_number().round_dp(places, RoundingMode::HalfUp)))
}

/// FLOOR function
pub fn fn_floor(args: &[Value], _ctx: &Context) -> FormulaResult<Value> {
    let n = argument(args, 0, "floor")?.to_number();
    let truncated = n.sub(&n.rem(&ScaledDecimal::one())?);
    if n.is_negative() && truncated != n {
        return Ok(Value::Number(truncated.sub(&ScaledDecimal::one())));
    }
    Ok(Value::Number(truncated))
}

/// CEIL function
pub fn fn_ceil(args: &[Value], _ctx: &Context) -> FormulaResult<Value> {
    let n = argument(args, 0, "ceil")?.to_number();
    let truncated = n.sub(&n.rem(&ScaledDecimal::one())?);
    if !n.is_negative() && truncated != n {
        return Ok(Value::Number(truncated.add(&ScaledDecimal::one())));
    }
    Ok(Value::Number(truncated))
}

/// MIN function
pub fn fn_min(args: &[Value], _ctx: &Context) -> FormulaResult<Value> {
    Ok(numbers(args).into_iter().min().map_or(Value::Null, Value::Number))
}

/// MAX function
pub fn fn_max(args: &[Value], _ctx: &Context) -> FormulaResult<Value> {
    Ok(numbers(args).into_iter().max().map_or(Value::Null, Value::Number))
}

/// SUM function
pub fn fn_sum(args: &[Value], _ctx: &Context) -> FormulaResult<Value> {
    let sum = numbers(args)
        .iter()
        .fold(ScaledDecimal::zero(), |acc, n| acc.add(n));
    Ok(Value::Number(sum))
}

/// AVG function
pub fn fn_avg(args: &[Value], _ctx: &Context) -> FormulaResult<Value> {
    let values = numbers(args);
    if values.is_empty() {
        return Ok(Value::Null);
    }
    let sum = values.iter().fold(ScaledDecimal::zero(), |acc, n| acc.add(n));
    let count = ScaledDecimal::from(values.len() as u64);
    Ok(Value::Number(sum.checked_div(&count)?))
}
