//! Lookup requests and the field-type side of the lookup protocol.

use std::collections::HashMap;

use crate::value::{FieldKey, FieldValue};

/// Snapshot of the field values a lookup is built from.
///
/// Unmounted inputs are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupValues {
    values: HashMap<FieldKey, FieldValue>,
}

impl LookupValues {
    pub(crate) fn new(values: HashMap<FieldKey, FieldValue>) -> Self {
        Self { values }
    }

    /// Value of an input field, if mounted.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(&FieldKey::from(key))
    }

    /// Text of an input field; empty for unset or unmounted fields.
    pub fn text(&self, key: &str) -> String {
        self.get(key)
            .map(|value| value.as_text().into_owned())
            .unwrap_or_default()
    }

    /// Check if an input field is mounted.
    pub fn is_mounted(&self, key: &str) -> bool {
        self.values.contains_key(&FieldKey::from(key))
    }
}

impl<K: Into<FieldKey>, V: Into<FieldValue>> FromIterator<(K, V)> for LookupValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A transport-agnostic lookup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    /// The field whose lookup status this request decides.
    pub field: FieldKey,
    /// Base endpoint, possibly carrying fixed query parameters.
    pub endpoint: String,
    /// Query fragment built from the current input values.
    pub query: String,
    /// Sequence number assigned at dispatch.
    pub generation: u64,
}

impl LookupRequest {
    /// Endpoint and query fragment joined into one URL string.
    pub fn url(&self) -> String {
        format!("{}{}", self.endpoint, self.query)
    }
}

/// The field-type side of a lookup: what to ask and how to read the answer.
///
/// The coordinator is agnostic to the query shape; everything specific to a
/// verification service lives here. All methods must be pure.
pub trait LookupSource: Send + Sync {
    /// Base endpoint of the verification service.
    fn endpoint(&self) -> String;

    /// Fields the request is built from. An edit to any of them re-arms the
    /// lookup. The owning field is always treated as an input.
    fn inputs(&self) -> Vec<FieldKey>;

    /// Cheap local format check. Locally invalid input is never sent.
    fn accepts(&self, values: &LookupValues) -> bool {
        let _ = values;
        true
    }

    /// Build the query fragment from the input values.
    fn query(&self, values: &LookupValues) -> String;

    /// Did the call itself succeed? A rejected payload is a failed call.
    fn check_response(&self, payload: &serde_json::Value) -> bool;

    /// Does an accepted payload confirm the value?
    fn is_successful(&self, payload: &serde_json::Value) -> bool;
}
