//! Engine settings.
//!
//! Settings are plain serde data so embedders can keep them next to the rest
//! of their configuration:
//!
//! ```json
//! { "directive_prefix": "x-", "delimiters": ["[[", "]]"], "memoize_computed": false }
//! ```
//!
//! Every field is optional; missing fields take the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Attribute prefix that marks a directive (`v-model`, `v-on:click`).
    pub directive_prefix: String,

    /// Opening and closing interpolation markers.
    pub delimiters: (String, String),

    /// Cache computed properties until one of their dependencies changes.
    /// When off, a computed property is re-evaluated on every read.
    pub memoize_computed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directive_prefix: "v-".to_string(),
            delimiters: ("{{".to_string(), "}}".to_string()),
            memoize_computed: true,
        }
    }
}

impl Settings {
    /// Parse settings from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.directive_prefix.is_empty() {
            return Err(Error::Settings("directive prefix must not be empty".into()));
        }
        let (open, close) = &self.delimiters;
        if open.is_empty() || close.is_empty() {
            return Err(Error::Settings("delimiters must not be empty".into()));
        }
        if open == close {
            return Err(Error::Settings(format!(
                "opening and closing delimiters must differ, both are `{open}`"
            )));
        }
        Ok(())
    }
}
