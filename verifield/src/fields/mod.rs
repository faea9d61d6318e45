//! Field types.
//!
//! A field type contributes validation rules, and optionally a remote lookup,
//! for a schema field. Rule names are namespaced by the field key
//! (`email_<key>`, `required_<key>`, ...).

mod email;
mod radio;
mod text;

use std::sync::Arc;

pub use email::{EmailField, EmailLookup};
pub use radio::RadioField;
pub use text::TextField;

use crate::hint::Hint;
use crate::lookup::LookupSource;
use crate::rule::Rule;
use crate::rules;
use crate::schema::{FieldSchema, FormSettings};

/// Behaviour a field type adds on top of plain field state.
pub trait FieldKind: Send + Sync {
    /// Rules contributed for `schema`, as `(name, rule)` in display order.
    fn rules(&self, schema: &FieldSchema, settings: &FormSettings) -> Vec<(String, Rule)>;

    /// Remote lookup backing the field, if any.
    fn lookup(
        &self,
        schema: &FieldSchema,
        settings: &FormSettings,
    ) -> Option<Arc<dyn LookupSource>> {
        let _ = (schema, settings);
        None
    }
}

/// The `required_<key>` rule every required field gets, shown once blurred.
pub fn required_rule(schema: &FieldSchema, settings: &FormSettings) -> (String, Rule) {
    let hint = schema.message("requiredError", settings, "This field is required.");
    (
        format!("required_{}", schema.key),
        rules::required(Hint::from(hint)).when(|cx| cx.field().is_blurred()),
    )
}
