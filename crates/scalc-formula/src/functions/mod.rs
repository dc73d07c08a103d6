//! Callable functions available to formulas

pub mod logical;
pub mod math;

use crate::error::{FormulaError, FormulaResult};
use crate::value::{Context, Value};
use ahash::AHashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Function implementation signature
///
/// Arguments are evaluated left to right before the call; the context is the
/// one passed to the current evaluation.
pub type FunctionImpl = Arc<dyn Fn(&[Value], &Context) -> FormulaResult<Value> + Send + Sync>;

/// Argument `index` of a call to `function`
///
/// Registered arities keep direct callers in range; this guards the rest.
pub(crate) fn argument<'a>(args: &'a [Value], index: usize, function: &str) -> FormulaResult<&'a Value> {
    args.get(index)
        .ok_or_else(|| FormulaError::function(function, format!("missing argument {}", index + 1)))
}

/// Function definition
#[derive(Clone)]
pub struct FunctionDef {
    /// Function name as written in formulas (case-sensitive)
    pub name: String,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    pub fn new<F>(name: impl Into<String>, min_args: usize, max_args: Option<usize>, f: F) -> Self
    where
        F: Fn(&[Value], &Context) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            min_args,
            max_args,
            implementation: Arc::new(f),
        }
    }

    /// Describe why `count` arguments are not accepted, if they are not
    pub(crate) fn arity_error(&self, count: usize) -> Option<String> {
        if count < self.min_args {
            return Some(format!("expected at least {}, got {}", self.min_args, count));
        }
        match self.max_args {
            Some(max) if count > max => Some(format!("expected at most {}, got {}", max, count)),
            _ => None,
        }
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish_non_exhaustive()
    }
}

/// Built-in table (lazily initialized)
static BUILTINS: OnceLock<FunctionTable> = OnceLock::new();

/// Function table consulted while parsing
#[derive(Clone, Default, Debug)]
pub struct FunctionTable {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding the built-in math and logical functions
    pub fn with_builtins() -> Self {
        BUILTINS
            .get_or_init(|| {
                let mut table = Self::new();
                table.register_math_functions();
                table.register_logical_functions();
                table
            })
            .clone()
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Register a function accepting any number of arguments
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value], &Context) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        self.register_def(FunctionDef::new(name, 0, None, f));
    }

    /// Register a function with an argument count range
    pub fn register_def(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.clone(), def);
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_math_functions(&mut self) {
        self.register_def(FunctionDef::new("abs", 1, Some(1), math::fn_abs));
        self.register_def(FunctionDef::new("round", 1, Some(2), math::fn_round));
        self.register_def(FunctionDef::new("floor", 1, Some(1), math::fn_floor));
        self.register_def(FunctionDef::new("ceil", 1, Some(1), math::fn_ceil));
        self.register_def(FunctionDef::new("min", 1, None, math::fn_min));
        self.register_def(FunctionDef::new("max", 1, None, math::fn_max));
        self.register_def(FunctionDef::new("sum", 0, None, math::fn_sum));
        self.register_def(FunctionDef::new("avg", 1, None, math::fn_avg));
    }

    fn register_logical_functions(&mut self) {
        self.register_def(FunctionDef::new("if", 2, Some(3), logical::fn_if));
        self.register_def(FunctionDef::new("not", 1, Some(1), logical::fn_not));
        self.register_def(FunctionDef::new("coalesce", 1, None, logical::fn_coalesce));
    }
}
