//! Rule storage module

mod rule_store;

pub use rule_store::*;
