//! Formula engine: settings, caches and parsing entry points

use crate::cache::ParseCache;
use crate::error::{FormulaError, FormulaResult};
use crate::expression::Expression;
use crate::functions::FunctionTable;
use crate::parser::{parse_expression, ParseEnv};
use crate::settings::{FormulaOptions, FormulaSettings};
use crate::value::{Context, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of settings identities used in cache keys
static NEXT_SETTINGS_ID: AtomicU64 = AtomicU64::new(1);

/// Parses formulas with one set of settings
///
/// Cloning is cheap. Engines built with [`FormulaEngine::with_cache`] on the
/// same cache share entries but never each other's: every engine gets its own
/// settings identity.
#[derive(Debug, Clone)]
pub struct FormulaEngine {
    core: Arc<EngineCore>,
}

#[derive(Debug)]
struct EngineCore {
    id: u64,
    settings: FormulaSettings,
    cache: Arc<ParseCache>,
}

impl FormulaEngine {
    /// Engine with a private cache
    pub fn new(settings: FormulaSettings) -> FormulaResult<Self> {
        Self::with_cache(settings, Arc::new(ParseCache::new()))
    }

    /// Engine using a shared cache
    ///
    /// Fails with [`FormulaError::InvalidConstant`] when a constant is an
    /// array or an object.
    pub fn with_cache(settings: FormulaSettings, cache: Arc<ParseCache>) -> FormulaResult<Self> {
        let mut invalid: Vec<&str> = settings
            .constants()
            .iter()
            .filter(|(_, value)| !value.is_scalar())
            .map(|(name, _)| name.as_str())
            .collect();
        invalid.sort_unstable();
        if let Some(name) = invalid.first() {
            return Err(FormulaError::InvalidConstant(name.to_string()));
        }

        Ok(Self {
            core: Arc::new(EngineCore {
                id: NEXT_SETTINGS_ID.fetch_add(1, Ordering::Relaxed),
                settings,
                cache,
            }),
        })
    }

    /// Engine from serialized options and a function table
    pub fn from_options(options: FormulaOptions, functions: FunctionTable) -> FormulaResult<Self> {
        let cache = Arc::new(ParseCache::with_capacity(options.cache_capacity));
        Self::with_cache(options.into_settings(functions)?, cache)
    }

    /// Parse `text` into an [`Expression`]
    pub fn parse(&self, text: &str) -> FormulaResult<Expression> {
        let env = ParseEnv::new(&self.core.settings, &self.core.cache, self.core.id);
        parse_expression(text, &env, true)
    }

    /// Parse and evaluate once
    pub fn evaluate(&self, text: &str, ctx: &Context) -> FormulaResult<Value> {
        self.parse(text)?.evaluate(ctx)
    }

    pub fn settings(&self) -> &FormulaSettings {
        &self.core.settings
    }

    pub fn cache(&self) -> &Arc<ParseCache> {
        &self.core.cache
    }

    /// Identity of these settings in cache keys
    pub fn settings_id(&self) -> u64 {
        self.core.id
    }
}

/// Parse `text` with a one-off engine
pub fn parse_formula(text: &str, settings: FormulaSettings) -> FormulaResult<Expression> {
    FormulaEngine::new(settings)?.parse(text)
}
