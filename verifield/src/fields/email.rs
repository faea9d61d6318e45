//! Email field with remote deliverability verification.

use std::sync::Arc;

use serde_json::Value;

use super::FieldKind;
use crate::hint::Hint;
use crate::lookup::{LookupSource, LookupValues};
use crate::rule::Rule;
use crate::rules::{self, blurred_and_filled, is_email};
use crate::schema::{FieldSchema, FormSettings};
use crate::state::LookupStatus;
use crate::value::FieldKey;

const DEFAULT_EMAIL_ERROR: &str = "\":value\" isn't an Email.";
const DEFAULT_VERIFY_ERROR: &str =
    "This doesn't seem to be a valid email address. Please check again.";

/// Email input: a local format rule plus a lookup-backed verification rule.
///
/// The verification rule only applies once the format rule passes, so at
/// most one of the two hints is shown.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailField;

impl FieldKind for EmailField {
    fn rules(&self, schema: &FieldSchema, settings: &FormSettings) -> Vec<(String, Rule)> {
        let format_hint = Hint::template(schema.message("emailError", settings, DEFAULT_EMAIL_ERROR));

        let rejected = schema.message("neverBounceError", settings, DEFAULT_VERIFY_ERROR);
        let unavailable = schema
            .custom_message("neverBounceUnavailable", settings)
            .unwrap_or_else(|| rejected.clone());
        let verify_hint = Hint::dynamic(move |state| match state.lookup() {
            LookupStatus::Unavailable => unavailable.clone(),
            _ => rejected.clone(),
        });

        vec![
            (
                format!("email_{}", schema.key),
                rules::email(format_hint).when(blurred_and_filled),
            ),
            (
                format!("email_neverbounce_{}", schema.key),
                rules::lookup_verified(verify_hint)
                    .when(|cx| blurred_and_filled(cx) && is_email(&cx.value().as_text())),
            ),
        ]
    }

    fn lookup(
        &self,
        schema: &FieldSchema,
        settings: &FormSettings,
    ) -> Option<Arc<dyn LookupSource>> {
        Some(Arc::new(EmailLookup::new(schema.key.clone(), settings)))
    }
}

/// Deliverability check against the CMS's NeverBounce proxy endpoint.
#[derive(Debug, Clone)]
pub struct EmailLookup {
    key: FieldKey,
    endpoint: String,
}

impl EmailLookup {
    /// Create the lookup for field `key`.
    pub fn new(key: impl Into<FieldKey>, settings: &FormSettings) -> Self {
        Self {
            key: key.into(),
            endpoint: format!(
                "{}/neverbounce/validate-single?_format=json",
                settings.cms_base_url.trim_end_matches('/')
            ),
        }
    }
}

impl LookupSource for EmailLookup {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn inputs(&self) -> Vec<FieldKey> {
        vec![self.key.clone()]
    }

    fn accepts(&self, values: &LookupValues) -> bool {
        is_email(&values.text(self.key.as_str()))
    }

    fn query(&self, values: &LookupValues) -> String {
        format!(
            "&email={}",
            urlencoding::encode(&values.text(self.key.as_str()))
        )
    }

    fn check_response(&self, payload: &Value) -> bool {
        payload.get("success").and_then(Value::as_bool) == Some(true)
    }

    fn is_successful(&self, payload: &Value) -> bool {
        // NeverBounce result code 1 means "invalid"; anything else is accepted.
        payload.get("result").and_then(Value::as_i64) != Some(1)
    }
}
