//! Leaf condition cache - parsed conditions keyed by their raw text

use std::sync::atomic::{AtomicUsize, Ordering};

use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::Result;
use crate::rule::ast::Condition;
use crate::rule::parser;

/// Default number of distinct leaf texts kept before the cache is reset
pub const DEFAULT_CACHE_CAPACITY: usize = 2048;

/// Global condition cache with fast hashing (ahash)
static CONDITION_CACHE: Lazy<RwLock<AHashMap<String, Condition>>> =
    Lazy::new(|| RwLock::new(AHashMap::with_capacity(DEFAULT_CACHE_CAPACITY)));

static CACHE_CAPACITY: AtomicUsize = AtomicUsize::new(DEFAULT_CACHE_CAPACITY);

/// Get or parse a leaf condition, using the cache for repeated texts.
///
/// Parse failures are never cached.
#[inline]
pub fn get_or_parse(text: &str) -> Result<Condition> {
    // Fast path: check read lock first
    {
        let cache = CONDITION_CACHE.read();
        if let Some(condition) = cache.get(text) {
            return Ok(condition.clone());
        }
    }

    // Slow path: parse and cache
    let condition = parser::parse_condition(text)?;

    let capacity = cache_capacity();
    if capacity > 0 {
        let mut cache = CONDITION_CACHE.write();
        if cache.len() >= capacity {
            cache.clear();
        }
        cache.insert(text.to_string(), condition.clone());
    }

    Ok(condition)
}

/// Set the maximum number of cached conditions; 0 disables caching
pub fn set_cache_capacity(capacity: usize) {
    CACHE_CAPACITY.store(capacity, Ordering::Relaxed);
    let mut cache = CONDITION_CACHE.write();
    if cache.len() > capacity {
        cache.clear();
    }
}

/// Current maximum number of cached conditions
pub fn cache_capacity() -> usize {
    CACHE_CAPACITY.load(Ordering::Relaxed)
}

/// Clear the condition cache (useful for testing)
pub fn clear_cache() {
    CONDITION_CACHE.write().clear();
}

/// Number of cached conditions
pub fn cache_size() -> usize {
    CONDITION_CACHE.read().len()
}

#[cfg(test)]
pub(crate) fn is_cached(text: &str) -> bool {
    CONDITION_CACHE.read().contains_key(text)
}
