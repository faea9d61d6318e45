//! Radio (single choice) field.

use super::FieldKind;
use crate::hint::Hint;
use crate::rule::Rule;
use crate::rules;
use crate::schema::{FieldSchema, FormSettings};

/// Single choice among the schema's options.
///
/// The chosen value must be one of the declared options. Selecting an option
/// needs no blur, so the rule applies as soon as a value is present.
#[derive(Debug, Clone, Copy, Default)]
pub struct RadioField;

impl FieldKind for RadioField {
    fn rules(&self, schema: &FieldSchema, settings: &FormSettings) -> Vec<(String, Rule)> {
        let options = schema.options.iter().map(|o| o.value.clone()).collect();
        let hint = schema.message(
            "optionError",
            settings,
            "\":value\" is not an available option.",
        );
        vec![(
            format!("option_{}", schema.key),
            rules::one_of(options, Hint::template(hint)).when(|cx| !cx.field().is_empty()),
        )]
    }
}
