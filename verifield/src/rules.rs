//! Built-in rules.
//!
//! Each constructor returns an ungated [`Rule`]; field types add the gating
//! condition that fits them (usually "blurred and not empty").
//! Format rules pass on empty values; pair them with [`required`] when a
//! value is mandatory.

use regex::Regex;

use crate::hint::Hint;
use crate::rule::{Rule, RuleContext};

/// Check an address the way the email format rule does.
pub fn is_email(value: &str) -> bool {
    email_address::EmailAddress::is_valid(value)
}

/// Gate: the field has been blurred and holds a value.
pub fn blurred_and_filled(cx: &RuleContext<'_>) -> bool {
    cx.field().is_blurred() && !cx.field().is_empty()
}

/// Require the field to be non-empty.
pub fn required(hint: impl Into<Hint>) -> Rule {
    Rule::new(|cx| !cx.field().is_empty()).hint(hint)
}

/// Require a well-formed email address.
pub fn email(hint: impl Into<Hint>) -> Rule {
    Rule::new(|cx| cx.field().is_empty() || is_email(&cx.value().as_text())).hint(hint)
}

/// Require the value to match a regex.
pub fn pattern(re: Regex, hint: impl Into<Hint>) -> Rule {
    Rule::new(move |cx| cx.field().is_empty() || re.is_match(&cx.value().as_text())).hint(hint)
}

/// Require a minimum length (in characters).
pub fn min_length(min: usize, hint: impl Into<Hint>) -> Rule {
    Rule::new(move |cx| cx.field().is_empty() || cx.value().as_text().chars().count() >= min)
        .hint(hint)
}

/// Require a maximum length (in characters).
pub fn max_length(max: usize, hint: impl Into<Hint>) -> Rule {
    Rule::new(move |cx| cx.value().as_text().chars().count() <= max).hint(hint)
}

/// Require the value to be one of the given options.
pub fn one_of(options: Vec<String>, hint: impl Into<Hint>) -> Rule {
    Rule::new(move |cx| {
        cx.field().is_empty() || options.iter().any(|option| *option == cx.value().as_text())
    })
    .hint(hint)
}

/// Require the remote lookup for the current value to have succeeded.
///
/// Lookup-bearing: this is the rule behind a field's success indicator.
pub fn lookup_verified(hint: impl Into<Hint>) -> Rule {
    Rule::new(|cx| cx.field().is_empty() || cx.field().lookup_successful() == Some(true))
        .hint(hint)
        .lookup_bearing()
}
