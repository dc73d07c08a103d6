//! Specialized evaluation plans
//!
//! A validated part list is folded once into an expression tree (with
//! constant folding), then lowered to a flat program for a small stack
//! machine. Groups and call arguments are inlined; `&&`, `||` and `??` become
//! conditional jumps so their right side is only evaluated when needed.

use crate::ast::{fold_parts, BinaryOperator, Operand, Part, PartFolder, Reference, UnaryOperator};
use crate::error::FormulaResult;
use crate::functions::FunctionImpl;
use crate::literal::LiteralNode;
use crate::operations::{self, ShortCircuit};
use crate::value::{Context, Value};
use std::fmt;
use std::mem;
use std::sync::Arc;
use thiserror::Error;

/// Deepest group and call nesting a plan is built for
///
/// Operator chains do not count; `a + b + c` is as shallow as `a + b`.
pub const MAX_PLAN_DEPTH: usize = 64;

/// Why no plan could be built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
}

/// Expression tree with precedence resolved; children are arena indexes
#[derive(Debug)]
enum Node {
    Const(Value),
    Load(usize),
    Call { function: usize, args: Vec<usize> },
    Tree(usize),
    Unary(UnaryOperator, usize),
    Binary(BinaryOperator, usize, usize),
}

/// Node index plus its group and call nesting depth
type Built = (usize, usize);

/// Pending step of [`Builder::emit`]
enum Emit {
    Visit(usize),
    Push(Instr),
    /// Left side is emitted; add the jump, then the right side
    Jump(BinaryOperator, usize),
    /// Aim the jump at this code index at the end of the code so far
    Patch(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Instr {
    /// Push a constant from the pool
    Const(usize),
    /// Push the value of a reference
    Load(usize),
    /// Pop `argc` arguments, push the call result
    Call { function: usize, argc: usize },
    /// Push an evaluated literal tree
    Tree(usize),
    Unary(UnaryOperator),
    Binary(BinaryOperator),
    /// Pop the left operand; if it decides `op`, push the result and jump to `end`
    ShortCircuit { op: BinaryOperator, end: usize },
    /// Pop the right operand of an undecided `op` and push the result
    Settle(BinaryOperator),
}

/// Compiled form of one formula
#[derive(Clone)]
pub struct Program {
    code: Vec<Instr>,
    constants: Vec<Value>,
    references: Vec<Reference>,
    functions: Vec<(String, FunctionImpl)>,
    trees: Vec<Arc<LiteralNode>>,
    numeric: bool,
}

impl Program {
    /// Number of instructions
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// True when the whole formula folded to one constant
    pub fn is_constant(&self) -> bool {
        matches!(self.code.as_slice(), [Instr::Const(_)])
    }

    /// Run the program against `ctx`
    pub fn run(&self, ctx: &Context) -> FormulaResult<Value> {
        let mut stack: Vec<Value> = Vec::with_capacity(8);
        let mut pc = 0;
        while pc < self.code.len() {
            match self.code[pc] {
                Instr::Const(i) => stack.push(self.constants[i].clone()),
                Instr::Load(i) => stack.push(self.references[i].resolve(ctx)?),
                Instr::Call { function, argc } => {
                    let args = stack.split_off(stack.len().saturating_sub(argc));
                    let (_, implementation) = &self.functions[function];
                    stack.push(implementation(&args, ctx)?);
                }
                Instr::Tree(i) => stack.push(self.trees[i].evaluate(ctx)?),
                Instr::Unary(op) => {
                    let value = stack.pop().unwrap_or_default();
                    stack.push(operations::unary(op, &value));
                }
                Instr::Binary(op) => {
                    let right = stack.pop().unwrap_or_default();
                    let left = stack.pop().unwrap_or_default();
                    stack.push(operations::binary(op, left, right, self.numeric)?);
                }
                Instr::ShortCircuit { op, end } => {
                    let left = stack.pop().unwrap_or_default();
                    if let ShortCircuit::Done(value) = operations::short_circuit(op, &left, self.numeric) {
                        stack.push(value);
                        pc = end;
                        continue;
                    }
                }
                Instr::Settle(op) => {
                    let right = stack.pop().unwrap_or_default();
                    stack.push(operations::settle(op, right, self.numeric));
                }
            }
            pc += 1;
        }
        Ok(stack.pop().unwrap_or_default())
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let functions: Vec<&str> = self.functions.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("Program")
            .field("code", &self.code)
            .field("constants", &self.constants)
            .field("references", &self.references)
            .field("functions", &functions)
            .field("trees", &self.trees.len())
            .field("numeric", &self.numeric)
            .finish()
    }
}

/// Build a program from validated parts
pub(crate) fn compile(parts: &[Part], numeric: bool) -> Result<Program, PlanError> {
    let mut builder = Builder {
        program: Program {
            code: Vec::new(),
            constants: Vec::new(),
            references: Vec::new(),
            functions: Vec::new(),
            trees: Vec::new(),
            numeric,
        },
        nodes: Vec::with_capacity(parts.len()),
    };
    let (root, _) = builder.fold(parts)?;
    builder.emit(root);
    Ok(builder.program)
}

struct Builder {
    program: Program,
    nodes: Vec<Node>,
}

/// One level deeper than `depth`, within the plan limit
fn nested(depth: usize) -> Result<usize, PlanError> {
    let depth = depth + 1;
    if depth > MAX_PLAN_DEPTH {
        return Err(PlanError::TooDeep(MAX_PLAN_DEPTH));
    }
    Ok(depth)
}

impl<'p> PartFolder<'p> for Builder {
    type Output = Built;
    type Error = PlanError;

    fn leaf(&mut self, operand: &'p Operand) -> Result<Built, PlanError> {
        let node = match operand {
            Operand::Literal(text) => Node::Const(Value::String(text.clone())),
            Operand::Constant(value) => Node::Const(value.clone()),
            Operand::Reference(reference) => Node::Load(self.reference_slot(reference)),
            Operand::Segment(expression) => {
                let (index, depth) = self.fold(expression.parts())?;
                return Ok((index, nested(depth)?));
            }
            Operand::Call(call) => {
                let mut args = Vec::with_capacity(call.args.len());
                let mut depth = 0;
                for arg in &call.args {
                    let (index, d) = self.fold(arg.parts())?;
                    depth = depth.max(d);
                    args.push(index);
                }
                self.program
                    .functions
                    .push((call.name.clone(), call.function.clone()));
                let function = self.program.functions.len() - 1;
                return Ok((self.push(Node::Call { function, args }), nested(depth)?));
            }
            Operand::Tree(tree) if tree.is_constant() => match tree.evaluate(&Context::new()) {
                Ok(value) => Node::Const(value),
                Err(_) => self.tree_slot(tree),
            },
            Operand::Tree(tree) => self.tree_slot(tree),
        };
        Ok((self.push(node), 0))
    }

    fn prefix(&mut self, op: UnaryOperator, (index, depth): Built) -> Result<Built, PlanError> {
        if let Node::Const(value) = &mut self.nodes[index] {
            *value = operations::unary(op, value);
            return Ok((index, depth));
        }
        Ok((self.push(Node::Unary(op, index)), depth))
    }

    fn binary(
        &mut self,
        op: BinaryOperator,
        (left, left_depth): Built,
        (right, right_depth): Built,
    ) -> Result<Built, PlanError> {
        let node = match self.fold_binary(op, left, right) {
            Some(value) => Node::Const(value),
            None => Node::Binary(op, left, right),
        };
        Ok((self.push(node), left_depth.max(right_depth)))
    }
}

impl Builder {
    fn fold(&mut self, parts: &[Part]) -> Result<Built, PlanError> {
        match fold_parts(parts, self)? {
            Some(built) => Ok(built),
            None => Ok((self.push(Node::Const(Value::Null)), 0)),
        }
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Value of `left op right` when constant operands decide it
    fn fold_binary(&self, op: BinaryOperator, left: usize, right: usize) -> Option<Value> {
        let numeric = self.program.numeric;
        match (&self.nodes[left], &self.nodes[right]) {
            // A failing operation stays in the plan and fails at run time
            (Node::Const(l), Node::Const(r)) => {
                operations::binary(op, l.clone(), r.clone(), numeric).ok()
            }
            (Node::Const(l), _) if op.is_short_circuit() => {
                match operations::short_circuit(op, l, numeric) {
                    ShortCircuit::Done(value) => Some(value),
                    ShortCircuit::Continue => None,
                }
            }
            _ => None,
        }
    }

    fn reference_slot(&mut self, reference: &Reference) -> usize {
        let references = &mut self.program.references;
        match references.iter().position(|r| r.name == reference.name) {
            Some(i) => i,
            None => {
                references.push(reference.clone());
                references.len() - 1
            }
        }
    }

    fn tree_slot(&mut self, tree: &Arc<LiteralNode>) -> Node {
        self.program.trees.push(Arc::clone(tree));
        Node::Tree(self.program.trees.len() - 1)
    }

    /// Lower the tree under `root` to code, without recursion
    fn emit(&mut self, root: usize) {
        let mut nodes = mem::take(&mut self.nodes);
        let code = &mut self.program.code;
        let constants = &mut self.program.constants;
        let mut work = vec![Emit::Visit(root)];

        while let Some(step) = work.pop() {
            match step {
                Emit::Visit(i) => match mem::replace(&mut nodes[i], Node::Const(Value::Null)) {
                    Node::Const(value) => {
                        constants.push(value);
                        code.push(Instr::Const(constants.len() - 1));
                    }
                    Node::Load(slot) => code.push(Instr::Load(slot)),
                    Node::Call { function, args } => {
                        work.push(Emit::Push(Instr::Call {
                            function,
                            argc: args.len(),
                        }));
                        work.extend(args.into_iter().rev().map(Emit::Visit));
                    }
                    Node::Tree(slot) => code.push(Instr::Tree(slot)),
                    Node::Unary(op, operand) => {
                        work.push(Emit::Push(Instr::Unary(op)));
                        work.push(Emit::Visit(operand));
                    }
                    Node::Binary(op, left, right) if op.is_short_circuit() => {
                        work.push(Emit::Jump(op, right));
                        work.push(Emit::Visit(left));
                    }
                    Node::Binary(op, left, right) => {
                        work.push(Emit::Push(Instr::Binary(op)));
                        work.push(Emit::Visit(right));
                        work.push(Emit::Visit(left));
                    }
                },
                Emit::Push(instr) => code.push(instr),
                Emit::Jump(op, right) => {
                    work.push(Emit::Patch(code.len()));
                    code.push(Instr::ShortCircuit { op, end: 0 });
                    work.push(Emit::Push(Instr::Settle(op)));
                    work.push(Emit::Visit(right));
                }
                Emit::Patch(at) => {
                    let end = code.len();
                    if let Instr::ShortCircuit { op, .. } = code[at] {
                        code[at] = Instr::ShortCircuit { op, end };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FormulaEngine;
    use crate::settings::FormulaSettings;
    use crate::Expression;
    use pretty_assertions::assert_eq;

    fn program(text: &str) -> Program {
        parse(text).plan().cloned().unwrap()
    }

    fn parse(text: &str) -> Expression {
        FormulaEngine::new(FormulaSettings::new()).unwrap().parse(text).unwrap()
    }

    #[test]
    fn test_constant_folding() {
        let plan = program("1 + 2 * 3");
        assert!(plan.is_constant());
        assert_eq!(plan.run(&Context::new()).unwrap(), Value::from(7));

        let plan = program("-(2 ^ 3) + max(1, 2)");
        assert_eq!(plan.code.first(), Some(&Instr::Const(0)));
        assert_eq!(plan.run(&Context::new()).unwrap(), Value::from(-6));
    }

    #[test]
    fn test_failed_fold_is_kept() {
        let plan = program("1 / 0 + x");
        assert!(!plan.is_constant());
        assert!(plan.run(&Context::new().with("x", 1)).is_err());
    }

    #[test]
    fn test_short_circuit_jumps() {
        let plan = program("x && missing");
        let ctx = Context::new().with("x", 0);
        assert_eq!(plan.run(&ctx).unwrap(), Value::from(0));
        let ctx = Context::new().with("x", 1);
        assert!(plan.run(&ctx).is_err());

        let plan = program("x ?? 5");
        assert_eq!(plan.run(&Context::new().with("x", Value::Null)).unwrap(), Value::from(5));
        assert_eq!(plan.run(&Context::new().with("x", 2)).unwrap(), Value::from(2));
    }

    #[test]
    fn test_constant_left_side_decides() {
        let plan = program("0 && missing");
        assert!(plan.is_constant());
        assert_eq!(plan.run(&Context::new()).unwrap(), Value::from(0));
    }

    #[test]
    fn test_references_share_a_slot() {
        let plan = program("x * x + y");
        assert_eq!(plan.references.len(), 2);
        let ctx = Context::new().with("x", 3).with("y", 1);
        assert_eq!(plan.run(&ctx).unwrap(), Value::from(10));
    }

    #[test]
    fn test_call_arguments_inline() {
        let plan = program("sum(a, (b + 1) * 2, 3)");
        assert_eq!(plan.functions.len(), 1);
        let ctx = Context::new().with("a", 1).with("b", 2);
        assert_eq!(plan.run(&ctx).unwrap(), Value::from(10));
    }

    #[test]
    fn test_too_deep_falls_back() {
        let text = format!("{}x{}", "(".repeat(MAX_PLAN_DEPTH + 1), ")".repeat(MAX_PLAN_DEPTH + 1));
        let expr = parse(&text);
        assert!(!expr.has_plan());
        assert_eq!(expr.evaluate(&Context::new().with("x", 4)).unwrap(), Value::from(4));

        let text = format!("{}x{}", "(".repeat(MAX_PLAN_DEPTH), ")".repeat(MAX_PLAN_DEPTH));
        assert!(parse(&text).has_plan());
    }

    #[test]
    fn test_call_nesting_counts() {
        let text = format!("{}x{}", "abs(".repeat(MAX_PLAN_DEPTH + 1), ")".repeat(MAX_PLAN_DEPTH + 1));
        let expr = parse(&text);
        assert!(!expr.has_plan());
        assert_eq!(expr.evaluate(&Context::new().with("x", -4)).unwrap(), Value::from(4));
    }

    #[test]
    fn test_operator_chains_do_not_count() {
        let sum = vec!["x"; 300].join(" + ");
        let plan = program(&sum);
        assert_eq!(plan.run(&Context::new().with("x", 2)).unwrap(), Value::from(600));

        let negated = format!("{}x", "-".repeat(301));
        let plan = program(&negated);
        assert_eq!(plan.run(&Context::new().with("x", 2)).unwrap(), Value::from(-2));

        let ors = format!("x{}", " || missing".repeat(300));
        let plan = program(&ors);
        assert_eq!(plan.run(&Context::new().with("x", 1)).unwrap(), Value::from(1));
    }

    #[test]
    fn test_long_chain_folds() {
        let one = || Part::Operand(Operand::Constant(Value::from(1)));
        let mut parts = vec![one()];
        for _ in 0..5000 {
            parts.push(Part::Binary(BinaryOperator::Subtract));
            parts.push(one());
        }
        let plan = compile(&parts, true).unwrap();
        assert!(plan.is_constant());
        assert_eq!(plan.run(&Context::new()).unwrap(), Value::from(-4999));
    }
}
