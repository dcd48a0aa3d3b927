//! Rule compiler: shunting-yard ordering, tree building and leaf decomposition

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::error::{Result, RuleEngineError};
use crate::record::Scalar;
use crate::rule::ast::{Comparator, Condition, ExpressionNode};
use crate::rule::tokenizer::{tokenize, Token};

/// How a `)` without a matching `(` is handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ParenPolicy {
    /// Fail with `UnbalancedParentheses`
    #[default]
    Reject,
    /// Legacy behavior: drain the whole operator stack and carry on
    Drain,
}

impl ParenPolicy {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(ParenPolicy::Reject),
            "drain" => Ok(ParenPolicy::Drain),
            other => Err(RuleEngineError::InvalidConfig(format!(
                "unknown parenthesis policy: {}",
                other
            ))),
        }
    }
}

/// Configuration files accept the same spellings as the environment
impl TryFrom<String> for ParenPolicy {
    type Error = RuleEngineError;

    fn try_from(name: String) -> Result<Self> {
        ParenPolicy::parse(&name)
    }
}

/// Options for a compile pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub unbalanced_parentheses: ParenPolicy,
}

/// Compile a rule string into an expression tree with default options
pub fn compile(rule: &str) -> Result<ExpressionNode> {
    compile_with(rule, &CompileOptions::default())
}

/// Compile a rule string: tokenize, reorder to postfix, build the tree
pub fn compile_with(rule: &str, options: &CompileOptions) -> Result<ExpressionNode> {
    let tokens = tokenize(rule)?;
    let postfix = to_postfix(&tokens, options.unbalanced_parentheses)?;
    debug!(tokens = tokens.len(), postfix = postfix.len(), "compiling rule");
    build_tree(postfix)
}

/// Reorder infix tokens into postfix order (shunting-yard).
///
/// AND binds tighter than OR and both are left-associative.
pub fn to_postfix(tokens: &[Token], policy: ParenPolicy) -> Result<Vec<Token>> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut operators: SmallVec<[Token; 8]> = SmallVec::new();

    for token in tokens {
        match token {
            Token::Condition(_) => output.push(token.clone()),
            Token::OpenParen => operators.push(Token::OpenParen),
            Token::CloseParen => loop {
                match operators.pop() {
                    Some(Token::OpenParen) => break,
                    Some(op) => output.push(op),
                    None => match policy {
                        ParenPolicy::Reject => {
                            return Err(RuleEngineError::UnbalancedParentheses(
                                "')' without matching '('".to_string(),
                            ))
                        }
                        ParenPolicy::Drain => {
                            warn!("stray ')' drained the operator stack");
                            break;
                        }
                    },
                }
            },
            Token::Connective(current) => {
                while let Some(&Token::Connective(top)) = operators.last() {
                    if top.precedence() < current.precedence() {
                        break;
                    }
                    output.push(Token::Connective(top));
                    operators.pop();
                }
                operators.push(Token::Connective(*current));
            }
        }
    }

    while let Some(op) = operators.pop() {
        if op == Token::OpenParen {
            return Err(RuleEngineError::UnbalancedParentheses(
                "'(' is never closed".to_string(),
            ));
        }
        output.push(op);
    }

    Ok(output)
}

/// Build an expression tree from postfix tokens
pub fn build_tree(postfix: Vec<Token>) -> Result<ExpressionNode> {
    let mut stack: SmallVec<[ExpressionNode; 8]> = SmallVec::new();

    for token in postfix {
        match token {
            Token::Condition(text) => stack.push(ExpressionNode::Leaf(text)),
            Token::Connective(connective) => {
                // First pop is the right operand
                let (right, left) = match (stack.pop(), stack.pop()) {
                    (Some(right), Some(left)) => (right, left),
                    _ => {
                        return Err(RuleEngineError::MalformedExpression(format!(
                            "{} needs two operands",
                            connective
                        )))
                    }
                };
                stack.push(ExpressionNode::internal(connective, left, right));
            }
            Token::OpenParen | Token::CloseParen => {
                return Err(RuleEngineError::MalformedExpression(
                    "parenthesis in postfix sequence".to_string(),
                ))
            }
        }
    }

    let root = stack.pop().ok_or_else(|| {
        RuleEngineError::MalformedExpression("empty expression".to_string())
    })?;

    if !stack.is_empty() {
        return Err(RuleEngineError::MalformedExpression(format!(
            "{} operand(s) not joined by a connective",
            stack.len()
        )));
    }

    Ok(root)
}

static CONDITION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(\w+)\s*([><=])\s*('[^']*'|"[^"]*"|-?[\w.]+)\s*$"#)
        .expect("condition pattern is valid")
});

/// Decompose leaf text such as "age > 30" into attribute, comparator and value
pub fn parse_condition(text: &str) -> Result<Condition> {
    let caps = CONDITION_PATTERN
        .captures(text)
        .ok_or_else(|| RuleEngineError::MalformedCondition(text.to_string()))?;

    Ok(Condition {
        attribute: caps[1].to_string(),
        comparator: Comparator::parse(&caps[2])?,
        value: Scalar::from_literal(&caps[3]),
    })
}
