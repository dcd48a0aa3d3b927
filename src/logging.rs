//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::error::{Result, RuleEngineError};

/// Install a fmt subscriber filtered by `directive` (e.g. "info" or
/// "rule_engine_core=debug").
///
/// Returns `Ok(false)` when a global subscriber was already installed, which
/// is left untouched.
pub fn init_tracing(directive: &str) -> Result<bool> {
    let filter = EnvFilter::try_new(directive).map_err(|e| {
        RuleEngineError::InvalidConfig(format!("invalid log directive {:?}: {}", directive, e))
    })?;

    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok())
}
