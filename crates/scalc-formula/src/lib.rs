//! # scalc-formula
//!
//! Formula parsing and evaluation over exact scaled decimals.
//!
//! Formulas combine arithmetic, comparison and logical operators, function
//! calls, references into a caller-supplied [`Context`] and embedded
//! JSON5-like literals:
//!
//! ```text
//! price * qty * (1 - discount)
//! if(total > 100, total * 0.9, total)
//! {net: amount, gross: amount * 1.2, tags: [a, b]}
//! ```
//!
//! A formula is parsed once into an [`Expression`] and evaluated any number of
//! times. When enabled (the default), parsing also builds a specialized plan:
//! constants are folded and the operator tree is lowered to a small bytecode
//! program. Expressions that cannot be planned fall back to the interpreter.
//!
//! ## Example
//!
//! ```rust
//! use scalc_formula::{Context, FormulaEngine, FormulaSettings, Value};
//!
//! let engine = FormulaEngine::new(FormulaSettings::new()).unwrap();
//! let expr = engine.parse("1.005 * qty").unwrap();
//!
//! let ctx = Context::new().with("qty", 1000);
//! assert_eq!(expr.evaluate(&ctx).unwrap(), Value::from(1005));
//! ```

pub mod ast;
pub mod cache;
pub mod compiler;
pub mod engine;
pub mod error;
mod evaluator;
pub mod expression;
pub mod functions;
pub mod literal;
mod operations;
mod parser;
pub mod settings;
pub mod value;

pub use ast::{BinaryOperator, Single, UnaryOperator};
pub use cache::{CacheStats, ParseCache, DEFAULT_CAPACITY};
pub use compiler::{PlanError, Program, MAX_PLAN_DEPTH};
pub use engine::{parse_formula, FormulaEngine};
pub use error::{ErrorPhase, FormulaError, FormulaResult};
pub use expression::Expression;
pub use functions::{FunctionDef, FunctionImpl, FunctionTable};
pub use literal::{LiteralNode, LITERAL_MARKER};
pub use parser::MAX_NESTING_DEPTH;
pub use settings::{FormulaOptions, FormulaSettings, ReferenceFactory, ReferenceFn};
pub use value::{Context, Value};

pub use scalc_decimal::{RoundingMode, ScaledDecimal};
