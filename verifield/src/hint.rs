//! Failure hints and message templates.

use std::fmt;
use std::sync::Arc;

use crate::state::FieldState;

type HintFn = Arc<dyn Fn(&FieldState) -> String + Send + Sync>;

/// The message shown when a rule fails.
///
/// Either a fixed message or a function of the field's current state, which
/// is how messages like `"foo" isn't an Email.` get their value.
#[derive(Clone)]
pub enum Hint {
    /// A fixed message.
    Text(String),
    /// A message computed from the current field state.
    Dynamic(HintFn),
}

impl Hint {
    /// A template hint; `:value` is replaced with the current value.
    ///
    /// ```
    /// use verifield::hint::Hint;
    /// use verifield::state::FieldState;
    ///
    /// let hint = Hint::template("\":value\" isn't an Email.");
    /// assert_eq!(hint.resolve(&FieldState::new("foo")), "\"foo\" isn't an Email.");
    /// ```
    pub fn template(template: impl Into<String>) -> Self {
        let template = template.into();
        Self::Dynamic(Arc::new(move |state: &FieldState| {
            let value = state.value().as_text();
            render(&template, &[("value", &*value)])
        }))
    }

    /// A hint computed by an arbitrary function of the field state.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&FieldState) -> String + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    /// Produce the message for the given state.
    pub fn resolve(&self, state: &FieldState) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Dynamic(f) => f(state),
        }
    }
}

impl fmt::Debug for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for Hint {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Hint {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Replace `:name` tokens in a message template.
///
/// The template is scanned once, so replacement text is never rescanned for
/// tokens. At each `:` the longest matching token name wins, which keeps
/// `:value` from eating the prefix of `:values`.
pub fn render(template: &str, tokens: &[(&str, &str)]) -> String {
    let mut ordered: Vec<&(&str, &str)> = tokens.iter().collect();
    ordered.sort_by_key(|(name, _)| std::cmp::Reverse(name.len()));

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(at) = rest.find(':') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        match ordered
            .iter()
            .find(|(name, _)| !name.is_empty() && after.starts_with(name))
        {
            Some((name, replacement)) => {
                out.push_str(replacement);
                rest = &after[name.len()..];
            }
            None => {
                out.push(':');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
