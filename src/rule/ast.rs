//! Expression tree for rule expressions
//!
//! Trees can be as deep as the rule is long (a chain of N `AND`s is N levels
//! deep), so every walk over a tree here uses an explicit work stack instead
//! of recursion, including `Clone`, `PartialEq` and `Drop`.

use std::convert::Infallible;
use std::fmt;

use smallvec::{smallvec, SmallVec};

use crate::error::{Result, RuleEngineError};
use crate::record::Scalar;

/// Expression tree node
///
/// Leaves keep the raw condition text; it is decomposed into a [`Condition`]
/// only when the tree is evaluated.
pub enum ExpressionNode {
    /// Single condition like "age > 30"
    Leaf(String),
    /// Connective joining exactly two sub-expressions
    Internal {
        connective: Connective,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
}

/// Pending work of a post-order walk
enum Step<'a> {
    Visit(&'a ExpressionNode),
    Join(Connective),
}

impl ExpressionNode {
    pub fn leaf(condition: impl Into<String>) -> Self {
        ExpressionNode::Leaf(condition.into())
    }

    pub fn internal(connective: Connective, left: ExpressionNode, right: ExpressionNode) -> Self {
        ExpressionNode::Internal {
            connective,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, ExpressionNode::Leaf(_))
    }

    /// Post-order fold over the tree.
    ///
    /// `leaf` maps each condition text, `join` combines a connective with the
    /// folded values of its operands. The left operand is always folded
    /// completely before the right one, and the first error stops the walk.
    pub fn try_fold<T, E, L, J>(&self, mut leaf: L, mut join: J) -> std::result::Result<T, E>
    where
        L: FnMut(&str) -> std::result::Result<T, E>,
        J: FnMut(Connective, T, T) -> std::result::Result<T, E>,
    {
        let mut steps: SmallVec<[Step<'_>; 16]> = smallvec![Step::Visit(self)];
        let mut values: SmallVec<[T; 16]> = SmallVec::new();

        while let Some(step) = steps.pop() {
            match step {
                Step::Visit(ExpressionNode::Leaf(text)) => values.push(leaf(text.as_str())?),
                Step::Visit(ExpressionNode::Internal {
                    connective,
                    left,
                    right,
                }) => {
                    steps.push(Step::Join(*connective));
                    steps.push(Step::Visit(right));
                    steps.push(Step::Visit(left));
                }
                Step::Join(connective) => {
                    // Right operand was folded last
                    let (right, left) = match (values.pop(), values.pop()) {
                        (Some(right), Some(left)) => (right, left),
                        _ => unreachable!("a join always follows both of its operands"),
                    };
                    values.push(join(connective, left, right)?);
                }
            }
        }

        match values.pop() {
            Some(value) => Ok(value),
            None => unreachable!("a walk always yields the root value"),
        }
    }

    /// Number of leaf conditions in the tree
    pub fn leaf_count(&self) -> usize {
        infallible(self.try_fold(|_| Ok(1), |_, left: usize, right: usize| Ok(left + right)))
    }

    /// Longest root-to-leaf path, counting the root
    pub fn depth(&self) -> usize {
        infallible(self.try_fold(|_| Ok(1), |_, left: usize, right: usize| {
            Ok(1 + left.max(right))
        }))
    }
}

fn infallible<T>(result: std::result::Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

impl Clone for ExpressionNode {
    fn clone(&self) -> Self {
        infallible(self.try_fold(
            |text| Ok(ExpressionNode::leaf(text)),
            |connective, left, right| Ok(ExpressionNode::internal(connective, left, right)),
        ))
    }
}

impl PartialEq for ExpressionNode {
    fn eq(&self, other: &Self) -> bool {
        let mut pairs: SmallVec<[(&ExpressionNode, &ExpressionNode); 16]> =
            smallvec![(self, other)];

        while let Some(pair) = pairs.pop() {
            match pair {
                (ExpressionNode::Leaf(a), ExpressionNode::Leaf(b)) => {
                    if a != b {
                        return false;
                    }
                }
                (
                    ExpressionNode::Internal {
                        connective: c1,
                        left: l1,
                        right: r1,
                    },
                    ExpressionNode::Internal {
                        connective: c2,
                        left: l2,
                        right: r2,
                    },
                ) => {
                    if c1 != c2 {
                        return false;
                    }
                    pairs.push((&**r1, &**r2));
                    pairs.push((&**l1, &**l2));
                }
                _ => return false,
            }
        }
        true
    }
}

/// Unlinks internal children one at a time so dropping a deep tree never
/// recurses through the nested boxes.
impl Drop for ExpressionNode {
    fn drop(&mut self) {
        let mut detached: Vec<ExpressionNode> = Vec::new();
        detach_children(self, &mut detached);
        while let Some(mut node) = detached.pop() {
            detach_children(&mut node, &mut detached);
        }
    }
}

fn detach_children(node: &mut ExpressionNode, detached: &mut Vec<ExpressionNode>) {
    if let ExpressionNode::Internal { left, right, .. } = node {
        for child in [left, right] {
            if !child.is_leaf() {
                detached.push(std::mem::replace(
                    &mut **child,
                    ExpressionNode::Leaf(String::new()),
                ));
            }
        }
    }
}

/// Pieces of the infix rendering still to be written
enum Piece<'a> {
    Node(&'a ExpressionNode),
    Text(&'static str),
}

/// Renders a fully parenthesized infix form that compiles back to the same tree
impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pieces: SmallVec<[Piece<'_>; 16]> = smallvec![Piece::Node(self)];

        while let Some(piece) = pieces.pop() {
            match piece {
                Piece::Text(text) => f.write_str(text)?,
                Piece::Node(ExpressionNode::Leaf(text)) => f.write_str(text)?,
                Piece::Node(ExpressionNode::Internal {
                    connective,
                    left,
                    right,
                }) => {
                    f.write_str("(")?;
                    pieces.push(Piece::Text(")"));
                    pieces.push(Piece::Node(right));
                    pieces.push(Piece::Text(match connective {
                        Connective::And => " AND ",
                        Connective::Or => " OR ",
                    }));
                    pieces.push(Piece::Node(left));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExpressionNode")
            .field(&format_args!("{}", self))
            .finish()
    }
}

/// Logical connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    /// AND, binds tighter than OR
    And,
    /// OR
    Or,
}

impl Connective {
    /// Shunting-yard precedence
    #[inline]
    pub fn precedence(self) -> u8 {
        match self {
            Connective::And => 2,
            Connective::Or => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }

    /// Parse a connective keyword; only the upper-case words are accepted
    pub fn parse(word: &str) -> Result<Self> {
        match word {
            "AND" => Ok(Connective::And),
            "OR" => Ok(Connective::Or),
            other => Err(RuleEngineError::UnknownOperator(other.to_string())),
        }
    }

    #[inline]
    pub fn apply(self, left: bool, right: bool) -> bool {
        match self {
            Connective::And => left && right,
            Connective::Or => left || right,
        }
    }
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// Greater than (>)
    Greater,
    /// Less than (<)
    Less,
    /// Equal (=)
    Equal,
}

impl Comparator {
    pub fn parse(symbol: &str) -> Result<Self> {
        match symbol {
            ">" => Ok(Comparator::Greater),
            "<" => Ok(Comparator::Less),
            "=" => Ok(Comparator::Equal),
            other => Err(RuleEngineError::UnknownOperator(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Greater => ">",
            Comparator::Less => "<",
            Comparator::Equal => "=",
        }
    }
}

/// Decomposed leaf condition
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub attribute: String,
    pub comparator: Comparator,
    pub value: Scalar,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connective_precedence() {
        assert!(Connective::And.precedence() > Connective::Or.precedence());
    }

    #[test]
    fn test_connective_parse() {
        assert_eq!(Connective::parse("AND").unwrap(), Connective::And);
        assert_eq!(Connective::parse("OR").unwrap(), Connective::Or);
        assert_eq!(
            Connective::parse("XOR").unwrap_err(),
            RuleEngineError::UnknownOperator("XOR".into())
        );
        assert!(Connective::parse("and").is_err());
    }

    #[test]
    fn test_comparator_parse() {
        assert_eq!(Comparator::parse(">").unwrap(), Comparator::Greater);
        assert_eq!(Comparator::parse("<").unwrap(), Comparator::Less);
        assert_eq!(Comparator::parse("=").unwrap(), Comparator::Equal);
        assert!(matches!(
            Comparator::parse(">="),
            Err(RuleEngineError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_display_and_shape() {
        let tree = ExpressionNode::internal(
            Connective::Or,
            ExpressionNode::leaf("a > 1"),
            ExpressionNode::internal(
                Connective::And,
                ExpressionNode::leaf("b > 2"),
                ExpressionNode::leaf("c > 3"),
            ),
        );
        assert_eq!(tree.to_string(), "(a > 1 OR (b > 2 AND c > 3))");
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.depth(), 3);
        assert!(!tree.is_leaf());
    }

    fn left_chain(connective: Connective, leaves: usize) -> ExpressionNode {
        (1..leaves).fold(ExpressionNode::leaf("a > 1"), |acc, i| {
            ExpressionNode::internal(connective, acc, ExpressionNode::leaf(format!("b{} > 2", i)))
        })
    }

    #[test]
    fn test_deep_left_chain_walks_without_overflow() {
        let tree = left_chain(Connective::And, 50_000);
        assert_eq!(tree.depth(), 50_000);
        assert_eq!(tree.leaf_count(), 50_000);

        let copy = tree.clone();
        assert_eq!(copy, tree);

        let rendered = tree.to_string();
        let prefix = format!("{}a > 1 AND b1 > 2)", "(".repeat(49_999));
        assert!(rendered.starts_with(&prefix));
        assert!(rendered.ends_with(" AND b49999 > 2)"));
    }

    #[test]
    fn test_deep_right_chain_drops_without_overflow() {
        let tree = (0..50_000).fold(ExpressionNode::leaf("z > 0"), |acc, i| {
            ExpressionNode::internal(Connective::Or, ExpressionNode::leaf(format!("a{} > 1", i)), acc)
        });
        assert_eq!(tree.depth(), 50_001);
        drop(tree);
    }

    #[test]
    fn test_equality_compares_shape_and_content() {
        let tree = left_chain(Connective::And, 3);
        assert_ne!(tree, left_chain(Connective::Or, 3));
        assert_ne!(tree, left_chain(Connective::And, 4));
        assert_ne!(tree, ExpressionNode::leaf("a > 1"));
        assert_eq!(
            format!("{:?}", ExpressionNode::leaf("a > 1")),
            "ExpressionNode(a > 1)"
        );
    }
}
