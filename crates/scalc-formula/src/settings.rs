//! Parse-time configuration

use crate::error::{FormulaError, FormulaResult};
use crate::functions::{FunctionDef, FunctionTable};
use crate::value::{Context, Value};
use ahash::AHashMap;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// Per-reference accessor produced by a [`ReferenceFactory`]
pub type ReferenceFn = Arc<dyn Fn(&Context) -> FormulaResult<Value> + Send + Sync>;

/// Custom reference resolution: called once per distinct name while parsing
pub type ReferenceFactory = Arc<dyn Fn(&str) -> FormulaResult<ReferenceFn> + Send + Sync>;

/// Settings passed once when formulas are parsed
///
/// # Example
/// ```rust
/// use scalc_formula::{Context, FormulaEngine, FormulaSettings, Value};
///
/// let settings = FormulaSettings::new()
///     .with_constant("RATE", Value::number("0.2").unwrap())
///     .numeric_mode(true);
/// let engine = FormulaEngine::new(settings).unwrap();
/// let expr = engine.parse("price * RATE").unwrap();
/// let ctx = Context::new().with("price", 50);
/// assert_eq!(expr.evaluate(&ctx).unwrap(), Value::from(10));
/// ```
#[derive(Clone)]
pub struct FormulaSettings {
    functions: FunctionTable,
    constants: AHashMap<String, Value>,
    reference: Option<ReferenceFactory>,
    numeric_mode: bool,
    compile: bool,
    token_pattern: Option<Regex>,
    default_value: Option<Value>,
    wrap_function_calls: bool,
}

impl Default for FormulaSettings {
    fn default() -> Self {
        Self {
            functions: FunctionTable::with_builtins(),
            constants: AHashMap::new(),
            reference: None,
            numeric_mode: true,
            compile: true,
            token_pattern: None,
            default_value: None,
            wrap_function_calls: true,
        }
    }
}

impl FormulaSettings {
    /// Settings with the built-in functions, numeric mode and plan synthesis on
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole function table
    pub fn with_functions(mut self, functions: FunctionTable) -> Self {
        self.functions = functions;
        self
    }

    /// Add or replace one function accepting any number of arguments
    pub fn with_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value], &Context) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        self.functions.register(name, f);
        self
    }

    /// Add or replace one function with an argument count range
    pub fn with_function_def(mut self, def: FunctionDef) -> Self {
        self.functions.register_def(def);
        self
    }

    /// Add a named constant; only scalars are accepted by the engine
    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constants.insert(name.into(), value.into());
        self
    }

    /// Resolve references through `factory` instead of reading the context
    pub fn with_reference<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> FormulaResult<ReferenceFn> + Send + Sync + 'static,
    {
        self.reference = Some(Arc::new(factory));
        self
    }

    /// Coerce operands to decimals (`true`) or keep the legacy mixed semantics
    pub fn numeric_mode(mut self, enabled: bool) -> Self {
        self.numeric_mode = enabled;
        self
    }

    /// Try to build a specialized evaluation plan for each formula
    pub fn compile(mut self, enabled: bool) -> Self {
        self.compile = enabled;
        self
    }

    /// Restrict reference names to those matching `pattern`
    pub fn with_token_pattern(self, pattern: &str) -> FormulaResult<Self> {
        let regex =
            Regex::new(pattern).map_err(|e| FormulaError::InvalidPattern(e.to_string()))?;
        Ok(self.with_token_regex(regex))
    }

    pub fn with_token_regex(mut self, regex: Regex) -> Self {
        self.token_pattern = Some(regex);
        self
    }

    /// Value of references missing from the context
    pub fn with_default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Keep `name(...)` values inside embedded literals whole
    pub fn wrap_function_calls(mut self, enabled: bool) -> Self {
        self.wrap_function_calls = enabled;
        self
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn constants(&self) -> &AHashMap<String, Value> {
        &self.constants
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn reference(&self) -> Option<&ReferenceFactory> {
        self.reference.as_ref()
    }

    pub fn is_numeric_mode(&self) -> bool {
        self.numeric_mode
    }

    pub fn is_compile_enabled(&self) -> bool {
        self.compile
    }

    pub fn token_pattern(&self) -> Option<&Regex> {
        self.token_pattern.as_ref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn is_wrapping_function_calls(&self) -> bool {
        self.wrap_function_calls
    }
}

impl fmt::Debug for FormulaSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaSettings")
            .field("functions", &self.functions.names())
            .field("constants", &self.constants)
            .field("reference", &self.reference.is_some())
            .field("numeric_mode", &self.numeric_mode)
            .field("compile", &self.compile)
            .field("token_pattern", &self.token_pattern.as_ref().map(Regex::as_str))
            .field("default_value", &self.default_value)
            .field("wrap_function_calls", &self.wrap_function_calls)
            .finish()
    }
}

/// Serializable subset of [`FormulaSettings`]
///
/// ```json
/// {"numericMode": false, "constants": {"PI": 3.14159}, "tokenRx": "^[a-z_]+$"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormulaOptions {
    #[serde(alias = "evaluateNumbersAsStrings")]
    pub numeric_mode: bool,
    pub compile: bool,
    pub wrap_function_calls: bool,
    pub constants: IndexMap<String, serde_json::Value>,
    #[serde(alias = "tokenRx")]
    pub token_pattern: Option<String>,
    /// `null` here means "missing references are null", absence means "fail"
    #[serde(deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    pub cache_capacity: usize,
}

impl Default for FormulaOptions {
    fn default() -> Self {
        Self {
            numeric_mode: true,
            compile: true,
            wrap_function_calls: true,
            constants: IndexMap::new(),
            token_pattern: None,
            default_value: None,
            cache_capacity: crate::cache::DEFAULT_CAPACITY,
        }
    }
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl FormulaOptions {
    /// Parse options from JSON text
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Build settings around `functions`
    pub fn into_settings(self, functions: FunctionTable) -> FormulaResult<FormulaSettings> {
        let mut settings = FormulaSettings::new()
            .with_functions(functions)
            .numeric_mode(self.numeric_mode)
            .compile(self.compile)
            .wrap_function_calls(self.wrap_function_calls);
        for (name, value) in self.constants {
            settings = settings.with_constant(name, Value::from(value));
        }
        if let Some(pattern) = &self.token_pattern {
            settings = settings.with_token_pattern(pattern)?;
        }
        if let Some(value) = self.default_value {
            settings = settings.with_default_value(Value::from(value));
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let settings = FormulaSettings::default();
        assert!(settings.is_numeric_mode());
        assert!(settings.is_compile_enabled());
        assert!(settings.is_wrapping_function_calls());
        assert!(settings.functions().contains("sum"));
        assert!(settings.reference().is_none());
        assert!(settings.default_value().is_none());
    }

    #[test]
    fn test_builder() {
        let settings = FormulaSettings::new()
            .numeric_mode(false)
            .compile(false)
            .with_constant("PI", Value::number("3.14").unwrap())
            .with_function("twice", |args: &[Value], _ctx: &Context| {
                Ok(Value::Number(args[0].to_number().mul(&2.into())))
            })
            .with_token_pattern("^[a-z]+$")
            .unwrap();
        assert!(!settings.is_numeric_mode());
        assert!(!settings.is_compile_enabled());
        assert_eq!(settings.constant("PI"), Some(&Value::number("3.14").unwrap()));
        assert!(settings.functions().contains("twice"));
        assert!(settings.token_pattern().unwrap().is_match("abc"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            FormulaSettings::new().with_token_pattern("(unclosed"),
            Err(FormulaError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_options_from_json() {
        let options = FormulaOptions::from_json_str(
            r#"{"evaluateNumbersAsStrings": false, "tokenRx": "^x$", "defaultValue": null}"#,
        )
        .unwrap();
        assert!(!options.numeric_mode);
        assert!(options.compile);
        assert_eq!(options.token_pattern.as_deref(), Some("^x$"));
        assert_eq!(options.default_value, Some(serde_json::Value::Null));
        assert_eq!(options.cache_capacity, 128);

        let settings = options.into_settings(FunctionTable::new()).unwrap();
        assert_eq!(settings.default_value(), Some(&Value::Null));
        assert!(settings.functions().is_empty());
    }

    #[test]
    fn test_options_absent_default() {
        let options = FormulaOptions::from_json_str(r#"{"constants": {"K": 2}}"#).unwrap();
        assert_eq!(options.default_value, None);
        let settings = options.into_settings(FunctionTable::with_builtins()).unwrap();
        assert_eq!(settings.constant("K"), Some(&Value::from(2)));
    }
}
