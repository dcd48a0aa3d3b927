//! Merging several compiled rules into one tree

use tracing::debug;

use crate::rule::ast::{Connective, ExpressionNode};

/// Fold trees left to right under a single connective.
///
/// Returns `None` for an empty input and the tree itself for a single input.
/// The result leans left: `[T1, T2, T3]` becomes `((T1 c T2) c T3)`.
pub fn combine<I>(trees: I, connective: Connective) -> Option<ExpressionNode>
where
    I: IntoIterator<Item = ExpressionNode>,
{
    let mut trees = trees.into_iter();
    let first = trees.next()?;
    let mut count = 1usize;

    let combined = trees.fold(first, |acc, tree| {
        count += 1;
        ExpressionNode::internal(connective, acc, tree)
    });

    debug!(count, connective = %connective, "combined rules");
    Some(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(s: &str) -> ExpressionNode {
        ExpressionNode::leaf(s)
    }

    #[test]
    fn test_combine_empty() {
        assert_eq!(combine(Vec::new(), Connective::And), None);
    }

    #[test]
    fn test_combine_single_is_unchanged() {
        let tree = ExpressionNode::internal(Connective::Or, leaf("a > 1"), leaf("b > 2"));
        assert_eq!(combine(vec![tree.clone()], Connective::And), Some(tree));
    }

    #[test]
    fn test_combine_is_left_leaning() {
        let combined = combine(
            vec![leaf("a > 1"), leaf("b > 2"), leaf("c > 3")],
            Connective::Or,
        )
        .unwrap();
        assert_eq!(
            combined,
            ExpressionNode::internal(
                Connective::Or,
                ExpressionNode::internal(Connective::Or, leaf("a > 1"), leaf("b > 2")),
                leaf("c > 3"),
            )
        );
        assert_eq!(combined.depth(), 3);
    }

    #[test]
    fn test_combine_many_rules() {
        // Few distinct texts keep the shared condition cache small
        let trees = (0..30_000).map(|i| leaf(&format!("a > {}", i % 50)));
        let combined = combine(trees, Connective::Or).unwrap();
        assert_eq!(combined.depth(), 30_000);
        assert_eq!(combined.leaf_count(), 30_000);

        let data = crate::record::DataRecord::new().with("a", 49.5);
        assert!(crate::rule::evaluator::evaluate(&combined, &data).unwrap());
        let data = crate::record::DataRecord::new().with("a", -1);
        assert!(!crate::rule::evaluator::evaluate(&combined, &data).unwrap());
    }

    #[test]
    fn test_combine_keeps_subtrees_intact() {
        let t1 = ExpressionNode::internal(Connective::Or, leaf("a > 1"), leaf("b > 2"));
        let t2 = leaf("c > 3");
        let combined = combine(vec![t1.clone(), t2.clone()], Connective::And).unwrap();
        assert_eq!(combined, ExpressionNode::internal(Connective::And, t1, t2));
    }
}
