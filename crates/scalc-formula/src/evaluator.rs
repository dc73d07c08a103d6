//! Tree-walking interpreter
//!
//! Parts are folded into a tree of deferred operations, then forced. Right
//! operands of `&&`, `||` and `??` are only forced when the left side does not
//! decide the result.

use crate::ast::{fold_parts, BinaryOperator, Operand, Part, PartFolder, UnaryOperator};
use crate::error::FormulaResult;
use crate::operations::{self, ShortCircuit};
use crate::value::{Context, Value};
use std::convert::Infallible;

/// Deferred operation; children are indexes into the arena
#[derive(Clone, Copy)]
enum Thunk<'p> {
    Operand(&'p Operand),
    Unary(UnaryOperator, usize),
    Binary(BinaryOperator, usize, usize),
}

struct Arena<'p> {
    thunks: Vec<Thunk<'p>>,
}

impl<'p> Arena<'p> {
    fn push(&mut self, thunk: Thunk<'p>) -> Result<usize, Infallible> {
        self.thunks.push(thunk);
        Ok(self.thunks.len() - 1)
    }
}

impl<'p> PartFolder<'p> for Arena<'p> {
    type Output = usize;
    type Error = Infallible;

    fn leaf(&mut self, operand: &'p Operand) -> Result<usize, Infallible> {
        self.push(Thunk::Operand(operand))
    }

    fn prefix(&mut self, op: UnaryOperator, value: usize) -> Result<usize, Infallible> {
        self.push(Thunk::Unary(op, value))
    }

    fn binary(&mut self, op: BinaryOperator, left: usize, right: usize) -> Result<usize, Infallible> {
        self.push(Thunk::Binary(op, left, right))
    }
}

/// Pending step of [`force`]
enum Task {
    Force(usize),
    Unary(UnaryOperator),
    Binary(BinaryOperator),
    /// Left operand of a short-circuit operator is on the value stack
    Decide(BinaryOperator, usize),
    Settle(BinaryOperator),
}

/// Evaluate validated parts against `ctx`
pub(crate) fn interpret(parts: &[Part], numeric: bool, ctx: &Context) -> FormulaResult<Value> {
    let mut arena = Arena {
        thunks: Vec::with_capacity(parts.len()),
    };
    let root = match fold_parts(parts, &mut arena) {
        Ok(Some(root)) => root,
        Ok(None) => return Ok(Value::Null),
        Err(never) => match never {},
    };
    force(&arena.thunks, root, numeric, ctx)
}

/// Run the thunk tree on explicit stacks, left operands first
fn force(thunks: &[Thunk<'_>], root: usize, numeric: bool, ctx: &Context) -> FormulaResult<Value> {
    let mut tasks = vec![Task::Force(root)];
    let mut values: Vec<Value> = Vec::with_capacity(8);

    while let Some(task) = tasks.pop() {
        match task {
            Task::Force(i) => match thunks[i] {
                Thunk::Operand(operand) => values.push(operand_value(operand, ctx)?),
                Thunk::Unary(op, inner) => {
                    tasks.push(Task::Unary(op));
                    tasks.push(Task::Force(inner));
                }
                Thunk::Binary(op, left, right) if op.is_short_circuit() => {
                    tasks.push(Task::Decide(op, right));
                    tasks.push(Task::Force(left));
                }
                Thunk::Binary(op, left, right) => {
                    tasks.push(Task::Binary(op));
                    tasks.push(Task::Force(right));
                    tasks.push(Task::Force(left));
                }
            },
            Task::Unary(op) => {
                let value = values.pop().unwrap_or_default();
                values.push(operations::unary(op, &value));
            }
            Task::Binary(op) => {
                let right = values.pop().unwrap_or_default();
                let left = values.pop().unwrap_or_default();
                values.push(operations::binary(op, left, right, numeric)?);
            }
            Task::Decide(op, right) => {
                let left = values.pop().unwrap_or_default();
                match operations::short_circuit(op, &left, numeric) {
                    ShortCircuit::Done(value) => values.push(value),
                    ShortCircuit::Continue => {
                        tasks.push(Task::Settle(op));
                        tasks.push(Task::Force(right));
                    }
                }
            }
            Task::Settle(op) => {
                let right = values.pop().unwrap_or_default();
                values.push(operations::settle(op, right, numeric));
            }
        }
    }

    Ok(values.pop().unwrap_or_default())
}

fn operand_value(operand: &Operand, ctx: &Context) -> FormulaResult<Value> {
    match operand {
        Operand::Literal(text) => Ok(Value::String(text.clone())),
        Operand::Constant(value) => Ok(value.clone()),
        Operand::Reference(reference) => reference.resolve(ctx),
        Operand::Call(call) => {
            let args = call
                .args
                .iter()
                .map(|arg| arg.evaluate(ctx))
                .collect::<FormulaResult<Vec<_>>>()?;
            (call.function)(&args, ctx)
        }
        Operand::Segment(expression) => expression.evaluate(ctx),
        Operand::Tree(tree) => tree.evaluate(ctx),
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::FormulaEngine;
    use crate::error::FormulaError;
    use crate::settings::FormulaSettings;
    use crate::value::{Context, Value};
    use pretty_assertions::assert_eq;

    fn eval(text: &str, ctx: &Context) -> Result<Value, FormulaError> {
        let settings = FormulaSettings::new().compile(false);
        let expr = FormulaEngine::new(settings).unwrap().parse(text).unwrap();
        assert!(!expr.has_plan());
        expr.evaluate(ctx)
    }

    fn n(text: &str) -> Value {
        Value::number(text).unwrap()
    }

    #[test]
    fn test_precedence() {
        let ctx = Context::new();
        assert_eq!(eval("1 + 2 * 3", &ctx).unwrap(), n("7"));
        assert_eq!(eval("(1 + 2) * 3", &ctx).unwrap(), n("9"));
        assert_eq!(eval("2 ^ 3 ^ 2", &ctx).unwrap(), n("64"));
        assert_eq!(eval("10 - 4 - 3", &ctx).unwrap(), n("3"));
        assert_eq!(eval("1 + 1 == 2 && 3 > 2", &ctx).unwrap(), n("1"));
    }

    #[test]
    fn test_prefixes() {
        let ctx = Context::new().with("x", 5);
        assert_eq!(eval("-x", &ctx).unwrap(), n("-5"));
        assert_eq!(eval("--x", &ctx).unwrap(), n("5"));
        assert_eq!(eval("!0", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("!1", &ctx).unwrap(), Value::Bool(false));
        assert_eq!(eval("-2 ^ 2", &ctx).unwrap(), n("4"));
        assert_eq!(eval("3 - -x", &ctx).unwrap(), n("8"));
    }

    #[test]
    fn test_short_circuit_skips_right_side() {
        let ctx = Context::new().with("zero", 0).with("one", 1);
        assert_eq!(eval("zero && missing", &ctx).unwrap(), n("0"));
        assert_eq!(eval("one || missing", &ctx).unwrap(), n("1"));
        assert_eq!(eval("one ?? missing", &ctx).unwrap(), n("1"));
        assert_eq!(
            eval("zero || missing", &ctx),
            Err(FormulaError::UnknownReference("missing".into()))
        );
    }

    #[test]
    fn test_long_chains() {
        let ctx = Context::new().with("x", 5).with("zero", 0);
        let sum = vec!["1"; 5000].join(" + ");
        assert_eq!(eval(&sum, &ctx).unwrap(), n("5000"));

        let negated = format!("{}x", "- ".repeat(5001));
        assert_eq!(eval(&negated, &ctx).unwrap(), n("-5"));

        let ands = format!("zero{}", " && missing".repeat(5000));
        assert_eq!(eval(&ands, &ctx).unwrap(), n("0"));
    }

    #[test]
    fn test_calls_and_trees() {
        let ctx = Context::new().with("a", 2);
        assert_eq!(eval("max(a, 7) + round(1.25, 1)", &ctx).unwrap(), n("8.3"));
        assert_eq!(eval("{k: a * 2}", &ctx).unwrap().to_string(), r#"{"k": 4}"#);
    }
}
