//! Plain text field.

use regex::Regex;

use super::FieldKind;
use crate::hint::Hint;
use crate::rule::Rule;
use crate::rules::{self, blurred_and_filled};
use crate::schema::{FieldSchema, FormSettings};

/// Free-text input with optional format and length constraints.
///
/// # Example
///
/// ```
/// use regex::Regex;
/// use verifield::fields::TextField;
///
/// let zip = TextField::new()
///     .pattern(Regex::new(r"^\d{4}$").unwrap())
///     .max_length(4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TextField {
    pattern: Option<Regex>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl TextField {
    /// A text field without constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the value to match a regex.
    pub fn pattern(mut self, re: Regex) -> Self {
        self.pattern = Some(re);
        self
    }

    /// Require a minimum length (in characters).
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Require a maximum length (in characters).
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }
}

impl FieldKind for TextField {
    fn rules(&self, schema: &FieldSchema, settings: &FormSettings) -> Vec<(String, Rule)> {
        let key = &schema.key;
        let mut out = Vec::new();

        if let Some(re) = &self.pattern {
            let hint = schema.message(
                "patternError",
                settings,
                "\":value\" doesn't match the expected format.",
            );
            out.push((
                format!("pattern_{}", key),
                rules::pattern(re.clone(), Hint::template(hint)).when(blurred_and_filled),
            ));
        }
        if let Some(min) = self.min_length {
            let hint = schema.message(
                "minLengthError",
                settings,
                &format!("Please enter at least {} characters.", min),
            );
            out.push((
                format!("min_length_{}", key),
                rules::min_length(min, Hint::from(hint)).when(blurred_and_filled),
            ));
        }
        if let Some(max) = self.max_length {
            let hint = schema.message(
                "maxLengthError",
                settings,
                &format!("Please enter at most {} characters.", max),
            );
            out.push((
                format!("max_length_{}", key),
                rules::max_length(max, Hint::from(hint)).when(blurred_and_filled),
            ));
        }
        out
    }
}
