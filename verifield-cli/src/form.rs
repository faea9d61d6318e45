//! Form definition files.
//!
//! A form file lists fields in display order, each with its schema settings,
//! its field type and the value to enter:
//!
//! ```json
//! {
//!   "fields": [
//!     { "key": "email", "type": "email", "required": true, "value": "a@b.com" },
//!     { "key": "zip", "type": "text", "pattern": "^\\d{4}$", "value": "1000" },
//!     { "key": "color", "type": "radio", "options": [{ "value": "red", "label": "Red" }] }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use verifield::fields::{EmailField, FieldKind, RadioField, TextField};
use verifield::schema::{FieldSchema, FormSettings};
use verifield::value::FieldValue;

#[derive(Debug, Deserialize)]
pub struct FormFile {
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Deserialize)]
pub struct FieldDef {
    #[serde(flatten)]
    pub schema: FieldSchema,
    #[serde(rename = "type")]
    pub kind: KindDef,
    #[serde(default)]
    pub value: FieldValue,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindDef {
    Email,
    Text,
    Radio,
}

impl FieldDef {
    /// Build the field type this definition describes.
    pub fn field_kind(&self) -> Result<Box<dyn FieldKind>> {
        Ok(match self.kind {
            KindDef::Email => Box::new(EmailField),
            KindDef::Radio => Box::new(RadioField),
            KindDef::Text => {
                let mut text = TextField::new();
                if let Some(pattern) = &self.pattern {
                    let re = Regex::new(pattern).with_context(|| {
                        format!("Invalid pattern for field '{}'", self.schema.key)
                    })?;
                    text = text.pattern(re);
                }
                if let Some(min) = self.min_length {
                    text = text.min_length(min);
                }
                if let Some(max) = self.max_length {
                    text = text.max_length(max);
                }
                Box::new(text)
            }
        })
    }
}

/// Load a form file.
pub fn load_form(path: &Path) -> Result<FormFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read form file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse form file {}", path.display()))
}

/// Load form settings from `path`, or from the default location if it exists.
pub fn load_settings(path: Option<&Path>) -> Result<FormSettings> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match crate::paths::settings_file() {
            Some(path) if path.exists() => path,
            _ => return Ok(FormSettings::default()),
        },
    };
    log::info!("Loading settings from {}", path.display());
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read settings {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse settings {}", path.display()))
}
