//! What the schema collaborator hands over for each field.

use std::collections::HashMap;

use serde::Deserialize;

use crate::value::FieldKey;

/// One selectable option of a choice field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldOption {
    /// Submitted value.
    pub value: String,
    /// Display label.
    pub label: String,
}

/// Per-field settings consumed from the form schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FieldSchema {
    /// Stable key of the field.
    pub key: FieldKey,
    /// Whether a value is mandatory.
    #[serde(default)]
    pub required: bool,
    /// Custom messages by name (`emailError`, `requiredError`, ...).
    #[serde(default)]
    pub messages: HashMap<String, String>,
    /// Options of a choice field, in display order.
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

impl FieldSchema {
    /// Create an optional field with no overrides.
    pub fn new(key: impl Into<FieldKey>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Override a message for this field.
    pub fn with_message(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.messages.insert(name.into(), message.into());
        self
    }

    /// Append an option.
    pub fn with_option(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.options.push(FieldOption {
            value: value.into(),
            label: label.into(),
        });
        self
    }

    /// Resolve a custom message: field override, then form default.
    pub fn custom_message(&self, name: &str, settings: &FormSettings) -> Option<String> {
        self.messages
            .get(name)
            .or_else(|| settings.messages.get(name))
            .filter(|message| !message.is_empty())
            .cloned()
    }

    /// Resolve a message, falling back to `default`.
    pub fn message(&self, name: &str, settings: &FormSettings, default: &str) -> String {
        self.custom_message(name, settings)
            .unwrap_or_else(|| default.to_string())
    }
}

/// Form-wide settings.
///
/// # Example
///
/// ```
/// use verifield::schema::FormSettings;
///
/// let settings: FormSettings = serde_json::from_str(
///     r#"{ "cms_base_url": "https://cms.example", "messages": { "requiredError": "Required" } }"#,
/// ).unwrap();
/// assert_eq!(settings.cms_base_url, "https://cms.example");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FormSettings {
    /// Base URL of the CMS hosting the verification endpoints.
    pub cms_base_url: String,
    /// Form-level default messages by name.
    #[serde(default)]
    pub messages: HashMap<String, String>,
}

impl FormSettings {
    /// Create settings for a CMS base URL.
    pub fn new(cms_base_url: impl Into<String>) -> Self {
        Self {
            cms_base_url: cms_base_url.into(),
            messages: HashMap::new(),
        }
    }

    /// Set a form-level default message.
    pub fn with_message(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.messages.insert(name.into(), message.into());
        self
    }
}
