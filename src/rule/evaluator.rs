//! Rule evaluator

use crate::error::Result;
use crate::record::{DataRecord, Scalar};
use crate::rule::ast::{Comparator, Condition, ExpressionNode};
use crate::rule::cache;

/// Evaluate an expression tree against a data record.
///
/// Both operands of every connective are evaluated before combining, so a
/// malformed leaf fails the whole evaluation even where AND/OR could have
/// short-circuited past it. Leaves are visited left to right, and the walk
/// uses an explicit stack so tree depth is bounded only by memory.
pub fn evaluate(node: &ExpressionNode, data: &DataRecord) -> Result<bool> {
    node.try_fold(
        |text| -> Result<bool> {
            let condition = cache::get_or_parse(text)?;
            Ok(check_condition(&condition, data))
        },
        |connective, left, right| Ok(connective.apply(left, right)),
    )
}

/// Compare one record attribute against a condition literal.
///
/// A missing attribute never matches. `=` requires the same type and value;
/// `>` and `<` compare numbers numerically and text lexicographically, and
/// are false across types.
pub fn check_condition(condition: &Condition, data: &DataRecord) -> bool {
    let Some(actual) = data.get(&condition.attribute) else {
        return false;
    };

    match (actual, &condition.value, condition.comparator) {
        (Scalar::Number(a), Scalar::Number(b), Comparator::Greater) => a > b,
        (Scalar::Number(a), Scalar::Number(b), Comparator::Less) => a < b,
        (Scalar::Number(a), Scalar::Number(b), Comparator::Equal) => a == b,

        (Scalar::Text(a), Scalar::Text(b), Comparator::Greater) => a > b,
        (Scalar::Text(a), Scalar::Text(b), Comparator::Less) => a < b,
        (Scalar::Text(a), Scalar::Text(b), Comparator::Equal) => a == b,

        // Mixed types never compare
        _ => false,
    }
}
