//! Prompt template registry
//!
//! Templates are plain markdown files addressed by name, loaded once at
//! startup and immutable for the process lifetime. A missing template is a
//! configuration error that must stop startup — it can never be recovered
//! per-session.

use guru_common::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Template names the pipeline requires; startup fails unless every one of
/// these files exists in the prompts directory.
pub const TEMPLATE_NAMES: &[&str] = &[
    "dispatcher",
    "authenticity",
    "error_codes",
    "error_codes_prompt",
    "general",
    "part_classifier",
];

/// In-memory prompt template store
pub struct PromptLibrary {
    templates: HashMap<String, String>,
}

impl PromptLibrary {
    /// Load all required templates from `<dir>/<name>.md`
    pub fn load(dir: &Path) -> Result<Self> {
        let mut templates = HashMap::new();
        for name in TEMPLATE_NAMES {
            let path = dir.join(format!("{}.md", name));
            let content = std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!(
                    "Missing prompt template '{}' ({}): {}",
                    name,
                    path.display(),
                    e
                ))
            })?;
            templates.insert(name.to_string(), content);
        }

        tracing::info!(count = templates.len(), dir = %dir.display(), "Prompt templates loaded");
        Ok(Self { templates })
    }

    /// Resolve a template by name, applying literal placeholder substitution.
    ///
    /// Substitution pairs are `(placeholder, replacement)` where the
    /// placeholder appears in the template as `{placeholder}`. No templating
    /// control flow exists by design.
    pub fn resolve(&self, name: &str, substitutions: &[(&str, &str)]) -> Result<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| Error::Config(format!("Unknown prompt template '{}'", name)))?;

        let mut text = template.clone();
        for (placeholder, replacement) in substitutions {
            text = text.replace(&format!("{{{}}}", placeholder), replacement);
        }
        Ok(text)
    }
}
