//! Formula error types

use scalc_decimal::DecimalError;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// When an error can happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    /// While building an [`Expression`](crate::Expression) or an engine
    Parse,
    /// While evaluating against a context
    Evaluation,
}

/// Errors that can occur during formula parsing or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    // === Parse time ===
    /// Operator characters that form no known operator
    #[error("Formula contains an unknown operator {0}")]
    UnknownOperator(String),

    /// Operator where an operand was expected
    #[error("Formula contains an operator in invalid position: {0}")]
    OperatorPosition(String),

    /// Two operands without an operator between them
    #[error("Formula missing expected operator")]
    MissingOperator,

    /// Formula ends on an operator
    #[error("Formula contains invalid trailing operator")]
    TrailingOperator,

    /// Unclosed or stray quote, parenthesis, bracket or brace
    #[error("Formula contains unmatched '{0}'")]
    UnmatchedDelimiter(char),

    /// Token outside the reference grammar
    #[error("Formula contains invalid token: {0}")]
    InvalidToken(String),

    /// Reference rejected by the configured token pattern
    #[error("Formula contains invalid reference {0}")]
    InvalidReference(String),

    /// Call to a function missing from the function table
    #[error("Formula contains unknown function {0}")]
    UnknownFunction(String),

    /// Empty argument or wrong argument count
    #[error("Formula contains function {function} with invalid arguments: {reason}")]
    InvalidArguments { function: String, reason: String },

    /// Empty formula or empty parenthesized group
    #[error("Formula is empty")]
    EmptyExpression,

    /// Constant that is not a scalar
    #[error("Formula constant {0} contains an invalid value type")]
    InvalidConstant(String),

    /// Groups, calls or embedded literals nested past the parser limit
    #[error("Formula nests deeper than {0} levels")]
    NestingTooDeep(usize),

    /// Token pattern that does not compile
    #[error("Invalid token pattern: {0}")]
    InvalidPattern(String),

    // === Evaluation time ===
    /// Reference missing from the context with no default
    #[error("Unknown reference {0}")]
    UnknownReference(String),

    /// Decimal arithmetic failure such as division by zero
    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] DecimalError),

    /// Operator that cannot be applied
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Failure reported by a registered function
    #[error("Function {name} failed: {message}")]
    Function { name: String, message: String },

    /// Context built from something other than a JSON object
    #[error("Invalid context: {0}")]
    InvalidContext(String),
}

impl FormulaError {
    /// Error for a registered function to return
    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        FormulaError::Function {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether the error is raised while parsing or while evaluating
    pub fn phase(&self) -> ErrorPhase {
        match self {
            FormulaError::UnknownOperator(_)
            | FormulaError::OperatorPosition(_)
            | FormulaError::MissingOperator
            | FormulaError::TrailingOperator
            | FormulaError::UnmatchedDelimiter(_)
            | FormulaError::InvalidToken(_)
            | FormulaError::InvalidReference(_)
            | FormulaError::UnknownFunction(_)
            | FormulaError::InvalidArguments { .. }
            | FormulaError::EmptyExpression
            | FormulaError::InvalidConstant(_)
            | FormulaError::NestingTooDeep(_)
            | FormulaError::InvalidPattern(_) => ErrorPhase::Parse,
            FormulaError::UnknownReference(_)
            | FormulaError::Arithmetic(_)
            | FormulaError::UnsupportedOperator(_)
            | FormulaError::Function { .. }
            | FormulaError::InvalidContext(_) => ErrorPhase::Evaluation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase() {
        assert_eq!(FormulaError::MissingOperator.phase(), ErrorPhase::Parse);
        assert_eq!(FormulaError::NestingTooDeep(128).phase(), ErrorPhase::Parse);
        assert_eq!(
            FormulaError::UnknownReference("x".into()).phase(),
            ErrorPhase::Evaluation
        );
        assert_eq!(
            FormulaError::from(DecimalError::DivideByZero).phase(),
            ErrorPhase::Evaluation
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            FormulaError::UnmatchedDelimiter('(').to_string(),
            "Formula contains unmatched '('"
        );
        assert_eq!(
            FormulaError::function("round", "expects a number").to_string(),
            "Function round failed: expects a number"
        );
    }
}
