//! Engine configuration
//!
//! Configuration comes from environment variables or from a Python dict
//! passed to `init_config`. Every field has a default.

use pyo3::types::{PyAnyMethods, PyDict, PyDictMethods};
use pyo3::Bound;
use serde::Deserialize;

use crate::error::{Result, RuleEngineError};
use crate::logging;
use crate::rule::cache::{self, DEFAULT_CACHE_CAPACITY};
use crate::rule::{CompileOptions, ParenPolicy};

/// Environment variable selecting the stray `)` policy ("reject" or "drain")
pub const ENV_UNBALANCED_PARENS: &str = "RULE_ENGINE_UNBALANCED_PARENS";
/// Environment variable with the condition cache capacity
pub const ENV_CACHE_CAPACITY: &str = "RULE_ENGINE_CACHE_CAPACITY";
/// Environment variable with a tracing filter directive, e.g. "debug"
pub const ENV_LOG: &str = "RULE_ENGINE_LOG";

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Handling of a `)` without a matching `(`
    pub unbalanced_parentheses: ParenPolicy,
    /// Maximum number of parsed leaf conditions kept in the cache
    pub cache_capacity: usize,
    /// Tracing filter directive; logging stays off when unset
    pub log_level: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unbalanced_parentheses: ParenPolicy::Reject,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            log_level: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup(ENV_UNBALANCED_PARENS) {
            config.unbalanced_parentheses = ParenPolicy::parse(&v)?;
        }
        if let Some(v) = lookup(ENV_CACHE_CAPACITY) {
            config.cache_capacity = parse_capacity(&v)?;
        }
        if let Some(v) = lookup(ENV_LOG) {
            if !v.trim().is_empty() {
                config.log_level = Some(v);
            }
        }

        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RuleEngineError::InvalidConfig(e.to_string()))
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            unbalanced_parentheses: self.unbalanced_parentheses,
        }
    }

    /// Push process-wide settings: cache capacity and, if set, logging
    pub fn apply(&self) -> Result<()> {
        cache::set_cache_capacity(self.cache_capacity);
        if let Some(level) = &self.log_level {
            logging::init_tracing(level)?;
        }
        Ok(())
    }
}

fn parse_capacity(raw: &str) -> Result<usize> {
    raw.trim().parse().map_err(|_| {
        RuleEngineError::InvalidConfig(format!(
            "cache capacity must be a non-negative integer: {}",
            raw
        ))
    })
}

/// Helper to get an optional, non-None item from a Python dict
fn get_item_opt<'py>(dict: &Bound<'py, PyDict>, name: &str) -> Option<Bound<'py, pyo3::PyAny>> {
    dict.get_item(name).ok().flatten().filter(|v| !v.is_none())
}

/// Deserialize engine configuration from a Python dict
/// Expected format: {"unbalanced_parentheses": "reject", "cache_capacity": 2048, "log_level": "info"}
pub fn deserialize_engine_config(config: &Bound<'_, PyDict>) -> pyo3::PyResult<EngineConfig> {
    let mut engine_config = EngineConfig::default();

    if let Some(policy) = get_item_opt(config, "unbalanced_parentheses") {
        let name: String = policy.extract()?;
        engine_config.unbalanced_parentheses = ParenPolicy::parse(&name)?;
    }
    if let Some(capacity) = get_item_opt(config, "cache_capacity") {
        engine_config.cache_capacity = capacity.extract()?;
    }
    if let Some(level) = get_item_opt(config, "log_level") {
        engine_config.log_level = Some(level.extract()?);
    }

    Ok(engine_config)
}
