//! Validity aggregation.
//!
//! Folds every rule registered for a field into the three things a renderer
//! needs: pass/fail, a positive success indicator, and the hints to show.

use crate::registry::RuleRegistry;
use crate::state::LookupStatus;
use crate::value::FieldKey;

/// Everything a renderer needs to decorate one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReport {
    /// The field this report describes.
    pub key: FieldKey,
    /// No active rule fails.
    pub valid: bool,
    /// The field's lookup-bearing rules are active and pass.
    pub success: bool,
    /// Hints of the active failing rules, in registration order.
    pub hints: Vec<String>,
    /// Lookup outcome for the current value.
    pub lookup: LookupStatus,
}

impl FieldReport {
    /// True if the last lookup failed because the service could not answer,
    /// as opposed to rejecting the value.
    pub fn verification_unavailable(&self) -> bool {
        self.lookup == LookupStatus::Unavailable
    }

    /// The hint to show first, if any.
    pub fn first_hint(&self) -> Option<&str> {
        self.hints.first().map(String::as_str)
    }
}

/// Derives per-field validity from the rule registry.
#[derive(Debug, Clone)]
pub struct Validity {
    registry: RuleRegistry,
}

impl Validity {
    /// Create an aggregator over `registry`.
    pub fn new(registry: RuleRegistry) -> Self {
        Self { registry }
    }

    /// True iff no rule registered for the field is active and failing.
    pub fn is_valid(&self, key: impl Into<FieldKey>) -> bool {
        self.registry
            .evaluate_field(key)
            .iter()
            .all(|(_, _, evaluation)| evaluation.passes)
    }

    /// True iff the field has lookup-bearing rules and all of them are active
    /// and passing, and the field is valid overall.
    ///
    /// A closed gate is neutral, not a success.
    pub fn is_success(&self, key: impl Into<FieldKey>) -> bool {
        let evaluations = self.registry.evaluate_field(key);
        let mut lookups = evaluations
            .iter()
            .filter(|(_, rule, _)| rule.is_lookup_bearing())
            .peekable();
        if lookups.peek().is_none() {
            return false;
        }
        lookups.all(|(_, _, e)| e.active && e.passes)
            && evaluations.iter().all(|(_, _, e)| e.passes)
    }

    /// Hints of the active failing rules, first-registered first.
    pub fn active_hints(&self, key: impl Into<FieldKey>) -> Vec<String> {
        self.registry
            .evaluate_field(key)
            .into_iter()
            .filter(|(_, _, e)| e.active && !e.passes)
            .filter_map(|(_, _, e)| e.hint)
            .collect()
    }

    /// Full report for one field.
    pub fn report(&self, key: impl Into<FieldKey>) -> FieldReport {
        let key = key.into();
        let lookup = self
            .registry
            .store()
            .get(&key)
            .map(|state| state.lookup())
            .unwrap_or_default();

        FieldReport {
            valid: self.is_valid(&key),
            success: self.is_success(&key),
            hints: self.active_hints(&key),
            lookup,
            key,
        }
    }
}
