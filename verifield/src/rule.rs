//! Validation rules.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::hint::Hint;
use crate::state::FieldState;
use crate::value::{FieldKey, FieldValue};

type Predicate = Arc<dyn Fn(&RuleContext<'_>) -> bool + Send + Sync>;

/// Read-only view of field state handed to rule predicates and gates.
///
/// Only the rule's own field and the keys it declared via [`Rule::reads`] are
/// visible, which keeps the declared dependencies honest.
pub struct RuleContext<'a> {
    key: &'a FieldKey,
    own: &'a FieldState,
    fields: &'a HashMap<FieldKey, FieldState>,
}

impl<'a> RuleContext<'a> {
    pub(crate) fn new(
        key: &'a FieldKey,
        own: &'a FieldState,
        fields: &'a HashMap<FieldKey, FieldState>,
    ) -> Self {
        Self { key, own, fields }
    }

    /// Key of the field the rule belongs to.
    pub fn key(&self) -> &FieldKey {
        self.key
    }

    /// State of the field the rule belongs to.
    pub fn field(&self) -> &FieldState {
        self.own
    }

    /// Shortcut for the own field's value.
    pub fn value(&self) -> &FieldValue {
        self.own.value()
    }

    /// State of a declared dependency, if it is mounted.
    pub fn get(&self, key: &str) -> Option<&FieldState> {
        self.fields.get(&FieldKey::from(key))
    }
}

/// A named validation rule: predicate, hint and gating condition.
///
/// Predicates and gates must be pure and synchronous. They see the field
/// store only through [`RuleContext`] and cannot write to it.
///
/// # Example
///
/// ```
/// use verifield::rule::Rule;
///
/// let rule = Rule::new(|cx| !cx.field().is_empty())
///     .hint("This field is required.")
///     .when(|cx| cx.field().is_blurred());
/// ```
#[derive(Clone)]
pub struct Rule {
    predicate: Predicate,
    hint: Hint,
    gate: Predicate,
    reads: Vec<FieldKey>,
    lookup_bearing: bool,
}

impl Rule {
    /// Create an always-applicable rule from a predicate (true = passes).
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&RuleContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            hint: Hint::from("Invalid value."),
            gate: Arc::new(|_: &RuleContext<'_>| true),
            reads: Vec::new(),
            lookup_bearing: false,
        }
    }

    /// Set the failure hint.
    pub fn hint(mut self, hint: impl Into<Hint>) -> Self {
        self.hint = hint.into();
        self
    }

    /// Set the gating condition. While it is false the rule passes silently.
    pub fn when<F>(mut self, gate: F) -> Self
    where
        F: Fn(&RuleContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.gate = Arc::new(gate);
        self
    }

    /// Declare other fields this rule reads.
    pub fn reads<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<FieldKey>,
    {
        for key in keys {
            let key = key.into();
            if !self.reads.contains(&key) {
                self.reads.push(key);
            }
        }
        self
    }

    /// Mark the rule as backed by a remote lookup.
    ///
    /// Lookup-bearing rules drive the positive success indicator.
    pub fn lookup_bearing(mut self) -> Self {
        self.lookup_bearing = true;
        self
    }

    /// Check if the rule is backed by a remote lookup.
    pub fn is_lookup_bearing(&self) -> bool {
        self.lookup_bearing
    }

    /// Fields the rule reads besides its own.
    pub fn dependencies(&self) -> &[FieldKey] {
        &self.reads
    }

    pub(crate) fn applies(&self, cx: &RuleContext<'_>) -> bool {
        (self.gate)(cx)
    }

    pub(crate) fn passes(&self, cx: &RuleContext<'_>) -> bool {
        (self.predicate)(cx)
    }

    pub(crate) fn resolve_hint(&self, state: &FieldState) -> String {
        self.hint.resolve(state)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("hint", &self.hint)
            .field("reads", &self.reads)
            .field("lookup_bearing", &self.lookup_bearing)
            .finish_non_exhaustive()
    }
}
