//! Rule compilation and evaluation module
//!
//! This module compiles rule strings like
//! "age > 30 AND (department = 'Sales' OR experience > 5)" into expression
//! trees, merges trees under a connective and evaluates them against
//! DataRecord values.

mod ast;
pub mod cache;
mod combiner;
mod document;
mod evaluator;
pub mod parser;
pub mod tokenizer;


pub use ast::*;
pub use combiner::*;
pub use evaluator::*;
pub use parser::{
    build_tree, compile, compile_with, parse_condition, to_postfix, CompileOptions, ParenPolicy,
};
pub use tokenizer::{tokenize, Token};
