//! In-memory rule store
//!
//! Holds compiled rules behind an explicitly constructed handle. Callers own
//! the store and pass it where it is needed; there is no process-wide store.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, RuleEngineError};
use crate::record::DataRecord;
use crate::rule::{self, CompileOptions, Connective, ExpressionNode};

/// A compiled rule together with its source text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRule {
    pub id: String,
    pub rule_string: String,
    pub ast: ExpressionNode,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Rules in creation order
    rules: Vec<StoredRule>,
    /// Rule id to position in `rules`
    index: AHashMap<String, usize>,
}

/// Thread-safe rule store
#[derive(Debug, Default)]
pub struct RuleStore {
    options: CompileOptions,
    inner: RwLock<StoreInner>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that compiles rules with the given options
    pub fn with_options(options: CompileOptions) -> Self {
        Self {
            options,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Options every rule in this store is compiled with
    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Compile and store a rule string
    pub fn create_rule(&self, rule_string: &str) -> Result<StoredRule> {
        let ast = rule::compile_with(rule_string, &self.options)?;
        let stored = StoredRule {
            id: Uuid::new_v4().to_string(),
            rule_string: rule_string.to_string(),
            ast,
            created_at: Utc::now(),
        };

        let mut inner = self.inner.write();
        let position = inner.rules.len();
        inner.index.insert(stored.id.clone(), position);
        inner.rules.push(stored.clone());

        debug!(rule_id = %stored.id, leaves = stored.ast.leaf_count(), "stored rule");
        Ok(stored)
    }

    pub fn get_rule(&self, id: &str) -> Result<StoredRule> {
        let inner = self.inner.read();
        inner
            .index
            .get(id)
            .map(|&pos| inner.rules[pos].clone())
            .ok_or_else(|| RuleEngineError::RuleNotFound(id.to_string()))
    }

    /// All rules in creation order
    pub fn list_rules(&self) -> Vec<StoredRule> {
        self.inner.read().rules.clone()
    }

    /// Combine stored rules, in the order the ids are given.
    ///
    /// Returns `Ok(None)` for an empty id list; any unknown id fails the call.
    pub fn combine_rules<S: AsRef<str>>(
        &self,
        ids: &[S],
        connective: Connective,
    ) -> Result<Option<ExpressionNode>> {
        let trees = {
            let inner = self.inner.read();
            ids.iter()
                .map(|id| {
                    let id = id.as_ref();
                    inner
                        .index
                        .get(id)
                        .map(|&pos| inner.rules[pos].ast.clone())
                        .ok_or_else(|| RuleEngineError::RuleNotFound(id.to_string()))
                })
                .collect::<Result<Vec<_>>>()?
        };

        Ok(rule::combine(trees, connective))
    }

    /// Evaluate a stored rule against a data record
    pub fn evaluate_rule(&self, id: &str, data: &DataRecord) -> Result<bool> {
        let stored = self.get_rule(id)?;
        let verdict = rule::evaluate(&stored.ast, data)?;
        debug!(rule_id = %id, verdict, "evaluated rule");
        Ok(verdict)
    }

    pub fn len(&self) -> usize {
        self.inner.read().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::ParenPolicy;

    #[test]
    fn test_create_and_get_rule() {
        let store = RuleStore::new();
        let created = store.create_rule("age > 30 AND salary > 5000").unwrap();

        assert_eq!(created.rule_string, "age > 30 AND salary > 5000");
        assert_eq!(created.ast.leaf_count(), 2);
        assert_eq!(store.get_rule(&created.id).unwrap(), created);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invalid_rule_is_not_stored() {
        let store = RuleStore::new();
        assert!(store.create_rule("(age > 30").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_missing_rule() {
        let store = RuleStore::new();
        assert_eq!(
            store.get_rule("nope").unwrap_err(),
            RuleEngineError::RuleNotFound("nope".into())
        );
    }

    #[test]
    fn test_list_rules_in_creation_order() {
        let store = RuleStore::new();
        let a = store.create_rule("a > 1").unwrap();
        let b = store.create_rule("b > 2").unwrap();
        let ids: Vec<String> = store.list_rules().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[test]
    fn test_combine_rules_follows_id_order() {
        let store = RuleStore::new();
        let a = store.create_rule("a > 1").unwrap();
        let b = store.create_rule("b > 2").unwrap();

        let combined = store
            .combine_rules(&[b.id.as_str(), a.id.as_str()], Connective::Or)
            .unwrap()
            .unwrap();
        assert_eq!(
            combined,
            ExpressionNode::internal(
                Connective::Or,
                ExpressionNode::leaf("b > 2"),
                ExpressionNode::leaf("a > 1"),
            )
        );
    }

    #[test]
    fn test_combine_rules_empty_and_unknown() {
        let store = RuleStore::new();
        let none: [&str; 0] = [];
        assert_eq!(store.combine_rules(&none, Connective::And).unwrap(), None);

        let a = store.create_rule("a > 1").unwrap();
        let err = store
            .combine_rules(&[a.id.as_str(), "missing"], Connective::And)
            .unwrap_err();
        assert_eq!(err, RuleEngineError::RuleNotFound("missing".into()));
    }

    #[test]
    fn test_evaluate_stored_rule() {
        let store = RuleStore::new();
        let rule = store
            .create_rule("age > 30 AND (department = 'Sales' OR experience > 5)")
            .unwrap();
        let data = DataRecord::new()
            .with("age", 40)
            .with("department", "Sales")
            .with("experience", 1);
        assert!(store.evaluate_rule(&rule.id, &data).unwrap());
    }

    #[test]
    fn test_store_uses_compile_options() {
        let store = RuleStore::with_options(CompileOptions {
            unbalanced_parentheses: ParenPolicy::Drain,
        });
        assert_eq!(store.options().unbalanced_parentheses, ParenPolicy::Drain);
        assert!(store.create_rule("a > 1) AND b > 2").is_ok());

        let strict = RuleStore::new();
        assert_eq!(strict.options(), CompileOptions::default());
        assert!(strict.create_rule("a > 1) AND b > 2").is_err());
    }

    #[test]
    fn test_stored_rule_serializes_like_a_document() {
        let store = RuleStore::new();
        let rule = store.create_rule("a > 1").unwrap();
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["ruleString"], "a > 1");
        assert_eq!(value["ast"]["type"], "operand");
        assert!(value["createdAt"].is_string());
        assert_eq!(value["id"], rule.id.as_str());
    }
}
