//! Rule registry.
//!
//! Rules are grouped by the field key they validate and kept in registration
//! order. Evaluation is pull-based: a cached result is reused only while the
//! revisions of every field the rule reads are unchanged, so an evaluation
//! always reflects the most recently committed state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::rule::{Rule, RuleContext};
use crate::state::FieldStore;
use crate::value::FieldKey;

/// Result of evaluating one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// False only if the rule applies and its predicate failed.
    pub passes: bool,
    /// Whether the gating condition currently holds.
    pub active: bool,
    /// The failure message, present only for an active failing rule.
    pub hint: Option<String>,
}

impl Evaluation {
    /// A rule whose gate is closed: passes, shows nothing.
    pub fn inactive() -> Self {
        Self {
            passes: true,
            active: false,
            hint: None,
        }
    }

    fn passed() -> Self {
        Self {
            passes: true,
            active: true,
            hint: None,
        }
    }

    fn failed(hint: String) -> Self {
        Self {
            passes: false,
            active: true,
            hint: Some(hint),
        }
    }
}

struct RegisteredRule {
    name: String,
    rule: Rule,
    /// Bumped on every replacement so stale cache entries are never reused.
    version: u64,
}

struct CachedEvaluation {
    version: u64,
    revisions: Vec<Option<u64>>,
    evaluation: Evaluation,
}

#[derive(Default)]
struct RegistryInner {
    rules: HashMap<FieldKey, Vec<RegisteredRule>>,
    next_version: u64,
}

/// Shared mapping from (field key, rule name) to a rule.
///
/// Cheap to clone. One registry lives for the lifetime of a form session.
#[derive(Clone)]
pub struct RuleRegistry {
    store: FieldStore,
    inner: Arc<RwLock<RegistryInner>>,
    cache: Arc<Mutex<HashMap<(FieldKey, String), CachedEvaluation>>>,
}

impl RuleRegistry {
    /// Create an empty registry reading from `store`.
    pub fn new(store: FieldStore) -> Self {
        Self {
            store,
            inner: Arc::new(RwLock::new(RegistryInner::default())),
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The store the rules read from.
    pub fn store(&self) -> &FieldStore {
        &self.store
    }

    /// Insert a rule, or replace the rule registered under the same name.
    ///
    /// A replaced rule keeps its position in the registration order, so
    /// re-registering on remount is idempotent.
    pub fn register(&self, key: impl Into<FieldKey>, name: impl Into<String>, rule: Rule) {
        let key = key.into();
        let name = name.into();

        if let Ok(mut inner) = self.inner.write() {
            inner.next_version += 1;
            let version = inner.next_version;
            let rules = inner.rules.entry(key.clone()).or_default();
            match rules.iter_mut().find(|r| r.name == name) {
                Some(existing) => {
                    log::debug!("Replacing rule '{}' on field '{}'", name, key);
                    existing.rule = rule;
                    existing.version = version;
                }
                None => rules.push(RegisteredRule {
                    name: name.clone(),
                    rule,
                    version,
                }),
            }
        }

        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(&(key, name));
        }
    }

    /// Remove every rule of a field. Returns how many were removed.
    ///
    /// Unmounting a field keeps its rules; this is for forms whose schema
    /// dropped the field altogether.
    pub fn unregister_field(&self, key: impl Into<FieldKey>) -> usize {
        let key = key.into();
        let removed = self
            .inner
            .write()
            .ok()
            .and_then(|mut inner| inner.rules.remove(&key))
            .map(|rules| rules.len())
            .unwrap_or(0);

        if let Ok(mut cache) = self.cache.lock() {
            cache.retain(|(k, _), _| k != &key);
        }
        if removed > 0 {
            log::debug!("Unregistered {} rule(s) of field '{}'", removed, key);
        }
        removed
    }

    /// Names of the rules registered for a field, in registration order.
    pub fn rules_for(&self, key: impl Into<FieldKey>) -> Vec<String> {
        let key = key.into();
        self.inner
            .read()
            .ok()
            .and_then(|inner| {
                inner
                    .rules
                    .get(&key)
                    .map(|rules| rules.iter().map(|r| r.name.clone()).collect())
            })
            .unwrap_or_default()
    }

    /// Check if a field has any lookup-bearing rule registered.
    pub fn has_lookup_rule(&self, key: impl Into<FieldKey>) -> bool {
        let key = key.into();
        self.inner
            .read()
            .map(|inner| {
                inner
                    .rules
                    .get(&key)
                    .is_some_and(|rules| rules.iter().any(|r| r.rule.is_lookup_bearing()))
            })
            .unwrap_or(false)
    }

    /// Evaluate one rule against the current field state.
    ///
    /// Returns `None` if no such rule is registered. A rule whose field is not
    /// mounted evaluates as inactive.
    pub fn evaluate(&self, key: impl Into<FieldKey>, name: &str) -> Option<Evaluation> {
        let key = key.into();
        let (rule, version) = {
            let inner = self.inner.read().ok()?;
            let registered = inner.rules.get(&key)?.iter().find(|r| r.name == name)?;
            (registered.rule.clone(), registered.version)
        };
        Some(self.evaluate_rule(&key, name, &rule, version))
    }

    /// Evaluate every rule of a field, in registration order.
    pub fn evaluate_field(&self, key: impl Into<FieldKey>) -> Vec<(String, Rule, Evaluation)> {
        let key = key.into();
        let rules: Vec<(String, Rule, u64)> = self
            .inner
            .read()
            .ok()
            .and_then(|inner| {
                inner.rules.get(&key).map(|rules| {
                    rules
                        .iter()
                        .map(|r| (r.name.clone(), r.rule.clone(), r.version))
                        .collect()
                })
            })
            .unwrap_or_default();

        rules
            .into_iter()
            .map(|(name, rule, version)| {
                let evaluation = self.evaluate_rule(&key, &name, &rule, version);
                (name, rule, evaluation)
            })
            .collect()
    }

    fn evaluate_rule(&self, key: &FieldKey, name: &str, rule: &Rule, version: u64) -> Evaluation {
        let mut keys = Vec::with_capacity(rule.dependencies().len() + 1);
        keys.push(key.clone());
        keys.extend(rule.dependencies().iter().filter(|k| *k != key).cloned());

        let cache_key = (key.clone(), name.to_string());
        let revisions = self.store.revisions(&keys);
        if let Ok(cache) = self.cache.lock()
            && let Some(cached) = cache.get(&cache_key)
            && cached.version == version
            && cached.revisions == revisions
        {
            log::trace!("Rule '{}' on '{}' unchanged since last evaluation", name, key);
            return cached.evaluation.clone();
        }

        let (states, revisions) = self.store.snapshot(&keys);
        let evaluation = match states.get(key) {
            None => Evaluation::inactive(),
            Some(own) => {
                let cx = RuleContext::new(key, own, &states);
                if !rule.applies(&cx) {
                    Evaluation::inactive()
                } else if rule.passes(&cx) {
                    Evaluation::passed()
                } else {
                    Evaluation::failed(rule.resolve_hint(own))
                }
            }
        };
        log::trace!("Evaluated rule '{}' on '{}': {:?}", name, key, evaluation);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                cache_key,
                CachedEvaluation {
                    version,
                    revisions,
                    evaluation: evaluation.clone(),
                },
            );
        }
        evaluation
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry").finish_non_exhaustive()
    }
}
