//! Conversions between Python objects and engine types
//!
//! Trees cross the boundary as plain dicts in the tagged document shape,
//! data records as `{str: int | float | str}` dicts.

use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyString};

use crate::error::{Result, RuleEngineError};
use crate::record::{DataRecord, Scalar};
use crate::rule::{Connective, ExpressionNode};
use crate::store::StoredRule;

fn deserialization(msg: impl Into<String>) -> RuleEngineError {
    RuleEngineError::Deserialization(msg.into())
}

/// Convert a tree into its dict document form
pub fn tree_to_dict<'py>(py: Python<'py>, node: &ExpressionNode) -> PyResult<Bound<'py, PyDict>> {
    let root = PyDict::new(py);
    // Each child dict is linked into its parent before it is filled
    let mut pending = vec![(node, root.clone())];

    while let Some((node, dict)) = pending.pop() {
        match node {
            ExpressionNode::Leaf(text) => {
                dict.set_item("type", "operand")?;
                dict.set_item("value", text)?;
            }
            ExpressionNode::Internal {
                connective,
                left,
                right,
            } => {
                let left_dict = PyDict::new(py);
                let right_dict = PyDict::new(py);
                dict.set_item("type", "operator")?;
                dict.set_item("value", connective.as_str())?;
                dict.set_item("left", &left_dict)?;
                dict.set_item("right", &right_dict)?;
                pending.push((right.as_ref(), right_dict));
                pending.push((left.as_ref(), left_dict));
            }
        }
    }
    Ok(root)
}

enum Pending<'py> {
    Visit(Bound<'py, PyAny>),
    Join(Connective),
}

/// Read a tree from its dict document form
pub fn tree_from_py(obj: &Bound<'_, PyAny>) -> Result<ExpressionNode> {
    let mut pending = vec![Pending::Visit(obj.clone())];
    let mut built: Vec<ExpressionNode> = Vec::new();

    while let Some(step) = pending.pop() {
        match step {
            Pending::Visit(obj) => {
                let dict = obj
                    .downcast::<PyDict>()
                    .map_err(|_| deserialization("tree node must be a dict"))?;
                let kind = required_str(dict, "type")?;
                let value = required_str(dict, "value")?;

                match kind.as_str() {
                    "operand" => built.push(ExpressionNode::Leaf(value)),
                    "operator" => {
                        let connective = Connective::parse(&value)?;
                        match (child(dict, "left")?, child(dict, "right")?) {
                            (Some(left), Some(right)) => {
                                pending.push(Pending::Join(connective));
                                pending.push(Pending::Visit(right));
                                pending.push(Pending::Visit(left));
                            }
                            _ => {
                                return Err(RuleEngineError::MalformedExpression(format!(
                                    "{} node is missing an operand",
                                    value
                                )))
                            }
                        }
                    }
                    other => return Err(deserialization(format!("unknown node type: {}", other))),
                }
            }
            Pending::Join(connective) => match (built.pop(), built.pop()) {
                (Some(right), Some(left)) => {
                    built.push(ExpressionNode::internal(connective, left, right))
                }
                _ => unreachable!("a join always follows both of its operands"),
            },
        }
    }

    built
        .pop()
        .ok_or_else(|| deserialization("empty tree document"))
}

fn required_str(dict: &Bound<'_, PyDict>, key: &str) -> Result<String> {
    let item = dict
        .get_item(key)
        .map_err(|e| deserialization(e.to_string()))?
        .ok_or_else(|| deserialization(format!("missing field: {}", key)))?;
    item.extract::<String>()
        .map_err(|_| deserialization(format!("field {} must be a string", key)))
}

fn child<'py>(dict: &Bound<'py, PyDict>, key: &str) -> Result<Option<Bound<'py, PyAny>>> {
    match dict.get_item(key).map_err(|e| deserialization(e.to_string()))? {
        Some(child) if !child.is_none() => Ok(Some(child)),
        _ => Ok(None),
    }
}

/// Read a data record from a dict of numbers and strings
pub fn record_from_py(obj: &Bound<'_, PyAny>) -> Result<DataRecord> {
    let dict = obj
        .downcast::<PyDict>()
        .map_err(|_| deserialization("data must be a dict"))?;

    let mut record = DataRecord::new();
    for (key, value) in dict.iter() {
        let attribute: String = key
            .extract()
            .map_err(|_| deserialization("data keys must be strings"))?;
        let scalar = scalar_from_py(&value)
            .ok_or_else(|| deserialization(format!("unsupported value for {}", attribute)))?;
        record.insert(attribute, scalar);
    }
    Ok(record)
}

fn scalar_from_py(value: &Bound<'_, PyAny>) -> Option<Scalar> {
    // bool is an int subclass in Python
    if value.is_instance_of::<PyBool>() {
        return None;
    }
    if value.is_instance_of::<PyString>() {
        return value.extract::<String>().ok().map(Scalar::Text);
    }
    if value.is_instance_of::<PyInt>() || value.is_instance_of::<PyFloat>() {
        return value.extract::<f64>().ok().map(Scalar::Number);
    }
    None
}

/// Convert a stored rule into a dict with `id`, `ruleString`, `ast`, `createdAt`
pub fn stored_rule_to_dict<'py>(py: Python<'py>, rule: &StoredRule) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("id", &rule.id)?;
    dict.set_item("ruleString", &rule.rule_string)?;
    dict.set_item("ast", tree_to_dict(py, &rule.ast)?)?;
    dict.set_item("createdAt", rule.created_at.to_rfc3339())?;
    Ok(dict)
}
