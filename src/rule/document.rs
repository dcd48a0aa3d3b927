//! Serialized form of expression trees
//!
//! Trees are stored and exchanged as tagged documents:
//! `{"type": "operand", "value": "age > 30"}` for leaves and
//! `{"type": "operator", "value": "AND", "left": {..}, "right": {..}}` for
//! connectives. Reading a document back validates the connective and that
//! both operands are present.
//!
//! Document nesting follows tree depth, so both directions grow the stack on
//! demand with `stacker` and `from_json` lifts `serde_json`'s recursion limit.

use std::fmt;

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, RuleEngineError};
use crate::rule::ast::{Connective, ExpressionNode};

/// Remaining stack below which a nested (de)serialization call switches to
/// a fresh segment
const STACK_RED_ZONE: usize = 64 * 1024;
/// Size of each extra stack segment
const STACK_SEGMENT: usize = 1024 * 1024;

const NODE_TYPES: &[&str] = &["operand", "operator"];

impl ExpressionNode {
    /// Serialize to the tagged JSON document form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a tagged JSON document, keeping the specific error kind for
    /// unknown connectives and missing operands
    pub fn from_json(json: &str) -> Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        deserializer.disable_recursion_limit();
        let checked = CheckedNode::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
        deserializer.end()?;
        checked.0
    }
}

impl Serialize for ExpressionNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || match self {
            ExpressionNode::Leaf(text) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "operand")?;
                map.serialize_entry("value", text)?;
                map.end()
            }
            ExpressionNode::Internal {
                connective,
                left,
                right,
            } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("type", "operator")?;
                map.serialize_entry("value", connective.as_str())?;
                map.serialize_entry("left", left)?;
                map.serialize_entry("right", right)?;
                map.end()
            }
        })
    }
}

impl<'de> Deserialize<'de> for ExpressionNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        CheckedNode::deserialize(deserializer)?
            .0
            .map_err(de::Error::custom)
    }
}

/// A syntactically valid document node.
///
/// Unknown connectives and missing operands are kept as values rather than
/// serde errors so `from_json` can report them as their own error kinds.
struct CheckedNode(Result<ExpressionNode>);

impl<'de> Deserialize<'de> for CheckedNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
            deserializer.deserialize_map(CheckedNodeVisitor)
        })
    }
}

struct CheckedNodeVisitor;

impl<'de> Visitor<'de> for CheckedNodeVisitor {
    type Value = CheckedNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a tree node document")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<CheckedNode, A::Error> {
        let mut kind: Option<String> = None;
        let mut value: Option<String> = None;
        let mut left: Option<CheckedNode> = None;
        let mut right: Option<CheckedNode> = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "type" if kind.is_some() => return Err(de::Error::duplicate_field("type")),
                "value" if value.is_some() => return Err(de::Error::duplicate_field("value")),
                "left" if left.is_some() => return Err(de::Error::duplicate_field("left")),
                "right" if right.is_some() => return Err(de::Error::duplicate_field("right")),
                "type" => kind = Some(map.next_value()?),
                "value" => value = Some(map.next_value()?),
                "left" => left = map.next_value()?,
                "right" => right = map.next_value()?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        let kind = kind.ok_or_else(|| de::Error::missing_field("type"))?;
        let value = value.ok_or_else(|| de::Error::missing_field("value"))?;

        match kind.as_str() {
            "operand" => Ok(CheckedNode(Ok(ExpressionNode::Leaf(value)))),
            "operator" => Ok(CheckedNode(operator_node(&value, left, right))),
            other => Err(de::Error::unknown_variant(other, NODE_TYPES)),
        }
    }
}

fn operator_node(
    value: &str,
    left: Option<CheckedNode>,
    right: Option<CheckedNode>,
) -> Result<ExpressionNode> {
    let connective = Connective::parse(value)?;
    match (left, right) {
        (Some(CheckedNode(left)), Some(CheckedNode(right))) => {
            Ok(ExpressionNode::internal(connective, left?, right?))
        }
        _ => Err(RuleEngineError::MalformedExpression(format!(
            "{} node is missing an operand",
            value
        ))),
    }
}
