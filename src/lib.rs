//! Rule Engine Core - rule expression compiler and evaluator
//!
//! This crate compiles rule strings such as
//! `age > 30 AND (department = 'Sales' OR experience > 5)` into expression
//! trees, combines trees and evaluates them against data records, with
//! Python bindings via PyO3.

use pyo3::prelude::*;

pub mod config;
pub mod error;
pub mod logging;
pub mod python;
pub mod record;
pub mod rule;
pub mod store;

use crate::config::EngineConfig;
use crate::rule::Connective;
use crate::store::RuleStore;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use pyo3::types::PyDict;

// ============================================================================
// Cached Configuration
// ============================================================================

/// Global cached configuration
static CACHED_CONFIG: OnceCell<RwLock<EngineConfig>> = OnceCell::new();

/// Snapshot of the cached configuration, or defaults before `init_config`
fn current_config() -> EngineConfig {
    CACHED_CONFIG
        .get()
        .map(|config| config.read().clone())
        .unwrap_or_default()
}

// ============================================================================
// Python Functions
// ============================================================================

/// Initialize the engine configuration
///
/// # Arguments
/// * `config` - Optional dict with `unbalanced_parentheses` ("reject" or
///   "drain"), `cache_capacity` and `log_level`. When omitted the
///   configuration is read from `RULE_ENGINE_*` environment variables.
#[pyfunction]
#[pyo3(signature = (config=None))]
fn init_config(config: Option<&Bound<'_, PyDict>>) -> PyResult<()> {
    let engine_config = match config {
        Some(dict) => config::deserialize_engine_config(dict)?,
        None => EngineConfig::from_env()?,
    };
    engine_config.apply()?;

    let cached = CACHED_CONFIG.get_or_init(|| RwLock::new(EngineConfig::default()));
    *cached.write() = engine_config;
    Ok(())
}

/// Check if config is initialized
#[pyfunction]
fn is_config_initialized() -> bool {
    CACHED_CONFIG.get().is_some()
}

/// Compile a rule string into a tree dict
///
/// # Raises
/// ValueError if the rule string cannot be compiled
#[pyfunction]
fn create_rule<'py>(py: Python<'py>, rule_string: &str) -> PyResult<Bound<'py, PyDict>> {
    let tree = rule::compile_with(rule_string, &current_config().compile_options())?;
    python::tree_to_dict(py, &tree)
}

/// Combine tree dicts left to right under one operator
///
/// # Returns
/// The combined tree dict, or None when `asts` is empty
#[pyfunction]
#[pyo3(signature = (asts, operator="AND"))]
fn combine_rules<'py>(
    py: Python<'py>,
    asts: Vec<Bound<'py, PyAny>>,
    operator: &str,
) -> PyResult<Option<Bound<'py, PyDict>>> {
    let connective = Connective::parse(operator)?;
    let trees = asts
        .iter()
        .map(python::tree_from_py)
        .collect::<error::Result<Vec<_>>>()?;

    rule::combine(trees, connective)
        .map(|tree| python::tree_to_dict(py, &tree))
        .transpose()
}

/// Evaluate a tree dict against a data dict
#[pyfunction]
fn evaluate_rule(ast: &Bound<'_, PyAny>, data: &Bound<'_, PyAny>) -> PyResult<bool> {
    let tree = python::tree_from_py(ast)?;
    let record = python::record_from_py(data)?;
    Ok(rule::evaluate(&tree, &record)?)
}

/// Evaluate a tree dict against a data dict asynchronously
///
/// The evaluation runs on Tokio's blocking pool so the asyncio event loop
/// stays responsive for very large trees.
///
/// # Example (Python)
/// ```python
/// ok = await evaluate_rule_async(create_rule("age > 30"), {"age": 40})
/// ```
#[pyfunction]
fn evaluate_rule_async<'py>(
    py: Python<'py>,
    ast: &Bound<'py, PyAny>,
    data: &Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyAny>> {
    // Convert before entering async context
    let tree = python::tree_from_py(ast)?;
    let record = python::record_from_py(data)?;

    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let verdict = tokio::task::spawn_blocking(move || rule::evaluate(&tree, &record))
            .await
            .map_err(|e| {
                PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!(
                    "Evaluation task panicked: {}",
                    e
                ))
            })??;

        Ok(verdict)
    })
}

// ============================================================================
// RuleStore PyClass
// ============================================================================

/// Handle to an in-memory rule store
///
/// Rule documents are dicts with `id`, `ruleString`, `ast` and `createdAt`.
#[pyclass(name = "RuleStore")]
pub struct PyRuleStore {
    inner: RuleStore,
}

#[pymethods]
impl PyRuleStore {
    #[new]
    #[pyo3(signature = (config=None))]
    fn new(config: Option<&Bound<'_, PyDict>>) -> PyResult<Self> {
        let engine_config = match config {
            Some(dict) => config::deserialize_engine_config(dict)?,
            None => current_config(),
        };
        Ok(Self {
            inner: RuleStore::with_options(engine_config.compile_options()),
        })
    }

    fn create_rule<'py>(&self, py: Python<'py>, rule_string: &str) -> PyResult<Bound<'py, PyDict>> {
        let rule = self.inner.create_rule(rule_string)?;
        python::stored_rule_to_dict(py, &rule)
    }

    fn get_rule<'py>(&self, py: Python<'py>, rule_id: &str) -> PyResult<Bound<'py, PyDict>> {
        let rule = self.inner.get_rule(rule_id)?;
        python::stored_rule_to_dict(py, &rule)
    }

    fn list_rules<'py>(&self, py: Python<'py>) -> PyResult<Vec<Bound<'py, PyDict>>> {
        self.inner
            .list_rules()
            .iter()
            .map(|rule| python::stored_rule_to_dict(py, rule))
            .collect()
    }

    #[pyo3(signature = (rule_ids, operator="AND"))]
    fn combine_rules<'py>(
        &self,
        py: Python<'py>,
        rule_ids: Vec<String>,
        operator: &str,
    ) -> PyResult<Option<Bound<'py, PyDict>>> {
        let connective = Connective::parse(operator)?;
        self.inner
            .combine_rules(rule_ids.as_slice(), connective)?
            .map(|tree| python::tree_to_dict(py, &tree))
            .transpose()
    }

    fn evaluate_rule(&self, rule_id: &str, data: &Bound<'_, PyAny>) -> PyResult<bool> {
        let record = python::record_from_py(data)?;
        Ok(self.inner.evaluate_rule(rule_id, &record)?)
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }
}

// ============================================================================
// Python Module Definition
// ============================================================================

/// Python module definition
#[pymodule]
fn rule_engine_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(init_config, m)?)?;
    m.add_function(wrap_pyfunction!(is_config_initialized, m)?)?;
    m.add_function(wrap_pyfunction!(create_rule, m)?)?;
    m.add_function(wrap_pyfunction!(combine_rules, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_rule, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_rule_async, m)?)?;
    m.add_class::<PyRuleStore>()?;
    Ok(())
}
