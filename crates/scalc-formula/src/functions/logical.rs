//! Logical functions

use super::argument;
use crate::error::FormulaResult;
use crate::value::{Context, Value};

/// IF function: both branches are evaluated before the call
pub fn fn_if(args: &[Value], _ctx: &Context) -> FormulaResult<Value> {
    if argument(args, 0, "if")?.is_truthy() {
        Ok(argument(args, 1, "if")?.clone())
    } else {
        Ok(args.get(2).cloned().unwrap_or(Value::Bool(false)))
    }
}

/// NOT function
pub fn fn_not(args: &[Value], _ctx: &Context) -> FormulaResult<Value> {
    Ok(Value::Bool(!argument(args, 0, "not")?.is_truthy()))
}

/// COALESCE function: first non-null argument
pub fn fn_coalesce(args: &[Value], _ctx: &Context) -> FormulaResult<Value> {
    Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null))
}
