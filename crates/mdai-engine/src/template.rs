//! Message templates.
//!
//! Templates use `{{.Name}}` placeholders which are substituted from a set
//! of named variables (`Content`, `Question`, `Context`, `Arg0`, ...).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Variables available to a template.
pub type TemplateVars = HashMap<String, String>;

const PLACEHOLDER_PATTERN: &str = r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}";

/// A user message or suffix template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(String);

impl Template {
    /// Create a template from its source text.
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    /// The template source.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Names of the variables this template references, in order of appearance.
    pub fn variables(&self) -> Vec<&str> {
        let re = Regex::new(PLACEHOLDER_PATTERN).expect("Invalid regex pattern");
        re.captures_iter(&self.0)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .collect()
    }

    /// Substitute `vars` into the template.
    pub fn render(&self, vars: &TemplateVars) -> Result<String, TemplateError> {
        if self.0.is_empty() {
            return Err(TemplateError::Empty);
        }

        let re = Regex::new(PLACEHOLDER_PATTERN).expect("Invalid regex pattern");
        let mut out = String::with_capacity(self.0.len());
        let mut last = 0;

        for caps in re.captures_iter(&self.0) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = vars
                .get(name.as_str())
                .ok_or_else(|| TemplateError::MissingVariable(name.as_str().to_string()))?;
            out.push_str(&self.0[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }
        out.push_str(&self.0[last..]);

        Ok(out)
    }
}

impl From<&str> for Template {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

/// Errors that can occur when rendering a template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The template has no content.
    #[error("template is empty")]
    Empty,

    /// A placeholder names a variable that was not supplied.
    #[error("template variable not provided: {0}")]
    MissingVariable(String),
}
