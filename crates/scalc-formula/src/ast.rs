//! Parsed formula parts and precedence folding

use crate::error::{FormulaError, FormulaResult};
use crate::expression::Expression;
use crate::functions::FunctionImpl;
use crate::literal::LiteralNode;
use crate::settings::ReferenceFn;
use crate::value::{Context, Value};
use std::fmt;
use std::sync::Arc;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Power,
    Multiply,
    Divide,
    Modulo,
    Add,
    Subtract,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    And,
    Or,
    Coalesce,
}

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "^" => BinaryOperator::Power,
            "*" => BinaryOperator::Multiply,
            "/" => BinaryOperator::Divide,
            "%" => BinaryOperator::Modulo,
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Subtract,
            "<" => BinaryOperator::Less,
            "<=" => BinaryOperator::LessEqual,
            ">" => BinaryOperator::Greater,
            ">=" => BinaryOperator::GreaterEqual,
            "==" => BinaryOperator::Equal,
            "!=" => BinaryOperator::NotEqual,
            "&&" => BinaryOperator::And,
            "||" => BinaryOperator::Or,
            "??" => BinaryOperator::Coalesce,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Power => "^",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Coalesce => "??",
        }
    }

    /// Binding strength, `^` = 7 down to `||`/`??` = 1
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Power => 7,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 6,
            BinaryOperator::Add | BinaryOperator::Subtract => 5,
            BinaryOperator::Less
            | BinaryOperator::LessEqual
            | BinaryOperator::Greater
            | BinaryOperator::GreaterEqual => 4,
            BinaryOperator::Equal | BinaryOperator::NotEqual => 3,
            BinaryOperator::And => 2,
            BinaryOperator::Or | BinaryOperator::Coalesce => 1,
        }
    }

    /// `&&`, `||` and `??` may skip their right operand
    pub fn is_short_circuit(self) -> bool {
        matches!(
            self,
            BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Coalesce
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
}

impl UnaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "!" => Some(UnaryOperator::Not),
            "-" => Some(UnaryOperator::Negate),
            "+" => Some(UnaryOperator::Plus),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Not => "!",
            UnaryOperator::Negate => "-",
            UnaryOperator::Plus => "+",
        }
    }
}

/// How a reference gets its value
#[derive(Clone)]
pub(crate) enum Resolution {
    /// Read the context, falling back to the default-value policy
    Context { default: Option<Value> },
    /// Resolver obtained from the settings' reference factory
    Custom(ReferenceFn),
}

/// A variable reference
#[derive(Clone)]
pub(crate) struct Reference {
    pub name: String,
    pub resolution: Resolution,
}

impl Reference {
    pub fn resolve(&self, ctx: &Context) -> FormulaResult<Value> {
        match &self.resolution {
            Resolution::Context { default } => match ctx.get(&self.name) {
                Some(value) => Ok(value.clone()),
                None => default
                    .clone()
                    .ok_or_else(|| FormulaError::UnknownReference(self.name.clone())),
            },
            Resolution::Custom(resolver) => resolver(ctx),
        }
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let custom = matches!(self.resolution, Resolution::Custom(_));
        f.debug_struct("Reference")
            .field("name", &self.name)
            .field("custom", &custom)
            .finish()
    }
}

/// A function call with its argument expressions
#[derive(Clone)]
pub(crate) struct Call {
    pub name: String,
    pub function: FunctionImpl,
    pub args: Vec<Expression>,
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Non-operator part
#[derive(Debug, Clone)]
pub(crate) enum Operand {
    /// Quoted string, or embedded literal text that could not be built
    Literal(String),
    /// Numeric literal or named constant
    Constant(Value),
    Reference(Reference),
    Call(Call),
    /// Parenthesized group
    Segment(Expression),
    /// Embedded object or array
    Tree(Arc<LiteralNode>),
}

/// One part of a validated formula
#[derive(Debug, Clone)]
pub(crate) enum Part {
    Binary(BinaryOperator),
    Prefix(UnaryOperator),
    Operand(Operand),
}

/// Formula made of one part, for callers that skip evaluation
#[derive(Debug, Clone)]
pub enum Single {
    /// A bare reference name
    Reference(String),
    /// A string literal, number or constant
    Value(Value),
    /// An embedded object or array
    Tree(Arc<LiteralNode>),
}

/// Callbacks for [`fold_parts`]
pub(crate) trait PartFolder<'p> {
    type Output;
    type Error;

    fn leaf(&mut self, operand: &'p Operand) -> Result<Self::Output, Self::Error>;

    fn prefix(&mut self, op: UnaryOperator, value: Self::Output) -> Result<Self::Output, Self::Error>;

    fn binary(
        &mut self,
        op: BinaryOperator,
        left: Self::Output,
        right: Self::Output,
    ) -> Result<Self::Output, Self::Error>;
}

/// Fold a validated part list into one output
///
/// Prefixes bind to the operand that follows them, innermost (rightmost)
/// first. Binary operators bind by precedence, from `^` down to `||`/`??`,
/// and left to right within a level. One pass with an operator stack, so the
/// work is linear in the number of parts. Returns `None` for an empty list.
pub(crate) fn fold_parts<'p, F: PartFolder<'p>>(
    parts: &'p [Part],
    folder: &mut F,
) -> Result<Option<F::Output>, F::Error> {
    let mut operands: Vec<F::Output> = Vec::with_capacity(parts.len() / 2 + 1);
    let mut operators: Vec<BinaryOperator> = Vec::with_capacity(parts.len() / 2);
    let mut pending: Vec<UnaryOperator> = Vec::new();

    for part in parts {
        match part {
            Part::Prefix(op) => pending.push(*op),
            Part::Binary(op) => {
                while operators
                    .last()
                    .map_or(false, |top| top.precedence() >= op.precedence())
                {
                    reduce(&mut operands, &mut operators, folder)?;
                }
                operators.push(*op);
            }
            Part::Operand(operand) => {
                let mut value = folder.leaf(operand)?;
                while let Some(op) = pending.pop() {
                    value = folder.prefix(op, value)?;
                }
                operands.push(value);
            }
        }
    }
    while !operators.is_empty() {
        reduce(&mut operands, &mut operators, folder)?;
    }

    Ok(operands.pop())
}

/// Combine the top operator with the two operands under it
fn reduce<'p, F: PartFolder<'p>>(
    operands: &mut Vec<F::Output>,
    operators: &mut Vec<BinaryOperator>,
    folder: &mut F,
) -> Result<(), F::Error> {
    let Some(op) = operators.pop() else {
        return Ok(());
    };
    let right = operands.pop();
    let left = operands.pop();
    match (left, right) {
        (Some(left), Some(right)) => operands.push(folder.binary(op, left, right)?),
        // An operator without a left operand is dropped; validation rules it out
        (None, Some(right)) => operands.push(right),
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: &str) -> Part {
        Part::Operand(Operand::Literal(n.to_string()))
    }

    /// Renders the fold as a fully parenthesized string
    struct Shape;

    impl<'p> PartFolder<'p> for Shape {
        type Output = String;
        type Error = ();

        fn leaf(&mut self, operand: &'p Operand) -> Result<String, ()> {
            match operand {
                Operand::Literal(s) => Ok(s.clone()),
                _ => Ok("?".to_string()),
            }
        }

        fn prefix(&mut self, op: UnaryOperator, value: String) -> Result<String, ()> {
            Ok(format!("{}{}", op.symbol(), value))
        }

        fn binary(&mut self, op: BinaryOperator, left: String, right: String) -> Result<String, ()> {
            Ok(format!("({} {} {})", left, op, right))
        }
    }

    fn shape(parts: &[Part]) -> String {
        fold_parts(parts, &mut Shape).unwrap().unwrap()
    }

    #[test]
    fn test_symbols_round_trip() {
        for symbol in ["^", "*", "/", "%", "+", "-", "<", "<=", ">", ">=", "==", "!=", "&&", "||", "??"] {
            let op = BinaryOperator::from_symbol(symbol).unwrap();
            assert_eq!(op.symbol(), symbol);
        }
        assert_eq!(BinaryOperator::from_symbol("=<"), None);
        assert_eq!(UnaryOperator::from_symbol("!"), Some(UnaryOperator::Not));
    }

    #[test]
    fn test_precedence_ladder() {
        let parts = [
            num("1"),
            Part::Binary(BinaryOperator::Add),
            num("2"),
            Part::Binary(BinaryOperator::Multiply),
            num("3"),
            Part::Binary(BinaryOperator::Power),
            num("4"),
        ];
        assert_eq!(shape(&parts), "(1 + (2 * (3 ^ 4)))");
    }

    #[test]
    fn test_left_to_right_within_level() {
        let parts = [
            num("8"),
            Part::Binary(BinaryOperator::Subtract),
            num("2"),
            Part::Binary(BinaryOperator::Add),
            num("1"),
            Part::Binary(BinaryOperator::Or),
            num("x"),
            Part::Binary(BinaryOperator::Coalesce),
            num("y"),
        ];
        assert_eq!(shape(&parts), "((((8 - 2) + 1) || x) ?? y)");
    }

    #[test]
    fn test_prefixes_apply_innermost_first() {
        let parts = [
            Part::Prefix(UnaryOperator::Not),
            Part::Prefix(UnaryOperator::Negate),
            num("x"),
            Part::Binary(BinaryOperator::Power),
            num("2"),
        ];
        assert_eq!(shape(&parts), "(!-x ^ 2)");
    }

    #[test]
    fn test_mixed_levels() {
        // a * b + c ^ d - e == f && g
        let parts = [
            num("a"),
            Part::Binary(BinaryOperator::Multiply),
            num("b"),
            Part::Binary(BinaryOperator::Add),
            num("c"),
            Part::Binary(BinaryOperator::Power),
            num("d"),
            Part::Binary(BinaryOperator::Subtract),
            num("e"),
            Part::Binary(BinaryOperator::Equal),
            num("f"),
            Part::Binary(BinaryOperator::And),
            num("g"),
        ];
        assert_eq!(shape(&parts), "(((((a * b) + (c ^ d)) - e) == f) && g)");
    }

    #[test]
    fn test_long_chain() {
        let mut parts = vec![num("0")];
        for _ in 0..2_000 {
            parts.push(Part::Binary(BinaryOperator::Add));
            parts.push(num("1"));
        }
        let folded = shape(&parts);
        assert!(folded.starts_with(&"(".repeat(2_000)));
        assert!(folded.ends_with("+ 1)"));
    }

    #[test]
    fn test_empty() {
        assert_eq!(fold_parts(&[], &mut Shape), Ok(None));
    }

    #[test]
    fn test_reference_resolution() {
        let ctx = Context::new().with("x", 3);
        let plain = Reference {
            name: "x".into(),
            resolution: Resolution::Context { default: None },
        };
        assert_eq!(plain.resolve(&ctx).unwrap(), Value::from(3));

        let missing = Reference {
            name: "y".into(),
            resolution: Resolution::Context { default: None },
        };
        assert_eq!(
            missing.resolve(&ctx),
            Err(FormulaError::UnknownReference("y".into()))
        );

        let defaulted = Reference {
            name: "y".into(),
            resolution: Resolution::Context {
                default: Some(Value::Null),
            },
        };
        assert_eq!(defaulted.resolve(&ctx).unwrap(), Value::Null);
    }
}
