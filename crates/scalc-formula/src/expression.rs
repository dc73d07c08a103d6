//! Parsed, immutable formulas

use crate::ast::{Operand, Part, Single};
use crate::compiler::Program;
use crate::error::FormulaResult;
use crate::evaluator::interpret;
use crate::value::{Context, Value};
use indexmap::IndexSet;
use std::fmt;
use std::sync::Arc;

/// A parsed formula
///
/// Cheap to clone; clones share the parsed parts and the plan. The context
/// is borrowed for each evaluation only, so one expression can be evaluated
/// from many threads at once.
#[derive(Clone)]
pub struct Expression {
    inner: Arc<ExpressionInner>,
}

struct ExpressionInner {
    source: String,
    parts: Vec<Part>,
    single: Option<Single>,
    numeric: bool,
    plan: Option<Program>,
}

impl Expression {
    pub(crate) fn new(
        source: &str,
        parts: Vec<Part>,
        single: Option<Single>,
        numeric: bool,
        plan: Option<Program>,
    ) -> Self {
        Self {
            inner: Arc::new(ExpressionInner {
                source: source.to_string(),
                parts,
                single,
                numeric,
                plan,
            }),
        }
    }

    /// Formula text this expression was parsed from
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// The lone reference, value or literal tree, for one-part formulas
    pub fn single(&self) -> Option<&Single> {
        self.inner.single.as_ref()
    }

    pub fn is_numeric_mode(&self) -> bool {
        self.inner.numeric
    }

    /// True when evaluation runs a specialized plan
    pub fn has_plan(&self) -> bool {
        self.inner.plan.is_some()
    }

    pub fn plan(&self) -> Option<&Program> {
        self.inner.plan.as_ref()
    }

    pub(crate) fn parts(&self) -> &[Part] {
        &self.inner.parts
    }

    /// Evaluate against `ctx`, through the plan when there is one
    pub fn evaluate(&self, ctx: &Context) -> FormulaResult<Value> {
        match &self.inner.plan {
            Some(plan) => plan.run(ctx),
            None => self.evaluate_interpreted(ctx),
        }
    }

    /// Evaluate with the interpreter even when a plan exists
    pub fn evaluate_interpreted(&self, ctx: &Context) -> FormulaResult<Value> {
        interpret(&self.inner.parts, self.inner.numeric, ctx)
    }

    /// Owned evaluation function
    ///
    /// # Example
    /// ```rust
    /// use scalc_formula::{parse_formula, Context, FormulaSettings, Value};
    ///
    /// let price = parse_formula("qty * 1.25", FormulaSettings::new()).unwrap().to_callable();
    /// let ctx = Context::new().with("qty", 4);
    /// assert_eq!(price(&ctx).unwrap(), Value::from(5));
    /// ```
    pub fn to_callable(&self) -> impl Fn(&Context) -> FormulaResult<Value> + Send + Sync + 'static {
        let expression = self.clone();
        move |ctx: &Context| expression.evaluate(ctx)
    }

    /// Distinct referenced names in order of first use
    ///
    /// Names inside groups, call arguments and embedded literals are included.
    pub fn references(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_references(&mut names);
        names
            .into_iter()
            .collect::<IndexSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        for part in &self.inner.parts {
            match part {
                Part::Operand(Operand::Reference(reference)) => out.push(&reference.name),
                Part::Operand(Operand::Call(call)) => {
                    call.args.iter().for_each(|arg| arg.collect_references(out))
                }
                Part::Operand(Operand::Segment(expression)) => expression.collect_references(out),
                Part::Operand(Operand::Tree(tree)) => tree.collect_references(out),
                _ => {}
            }
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("source", &self.inner.source)
            .field("numeric", &self.inner.numeric)
            .field("plan", &self.inner.plan.as_ref().map(Program::len))
            .finish()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.source)
    }
}
