//! Rule string tokenizer

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, RuleEngineError};
use crate::rule::ast::Connective;

/// Lexical token of a rule string
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    OpenParen,
    CloseParen,
    Connective(Connective),
    /// Whole condition such as "age > 30", never split at this stage
    Condition(String),
}

/// Alternatives in priority order: parens, bare connective words, conditions.
/// Values are quoted literals or a run of word characters (optionally signed,
/// dots allowed so decimals stay in one token).
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?P<open>\()|(?P<close>\))|\b(?P<conn>AND|OR)\b|(?P<cond>\w+\s*[><=]\s*(?:'[^']*'|"[^"]*"|-?[\w.]+))"#,
    )
    .expect("token pattern is valid")
});

/// Split a rule string into tokens.
///
/// Spans matching none of the alternatives are dropped; only a string with
/// no tokens at all is an error.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let tokens: Vec<Token> = TOKEN_PATTERN
        .captures_iter(input)
        .filter_map(|caps| {
            if caps.name("open").is_some() {
                Some(Token::OpenParen)
            } else if caps.name("close").is_some() {
                Some(Token::CloseParen)
            } else if let Some(word) = caps.name("conn") {
                Connective::parse(word.as_str()).ok().map(Token::Connective)
            } else {
                caps.name("cond")
                    .map(|m| Token::Condition(m.as_str().trim().to_string()))
            }
        })
        .collect();

    if tokens.is_empty() {
        return Err(RuleEngineError::InvalidExpression(format!(
            "no tokens found in: {:?}",
            input
        )));
    }

    Ok(tokens)
}
