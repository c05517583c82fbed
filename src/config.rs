//! Form templates and environment settings.
//!
//! Templates are loaded from a directory of `*.json` files. Each lists the
//! labels a known form is expected to carry, in form order.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Labels expected on a known form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Expected labels, in the order they appear on the form.
    pub fields: Vec<String>,
}

/// All templates loaded from disk, keyed by name.
#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: HashMap<String, FormTemplate>,
}

impl TemplateStore {
    /// Load all templates from the specified directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            anyhow::bail!("Template directory does not exist: {:?}", dir);
        }

        let mut templates = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read template: {:?}", path))?;

                let template: FormTemplate = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse template: {:?}", path))?;

                info!(
                    "Loaded template: {} ({} fields) from {:?}",
                    template.name,
                    template.fields.len(),
                    path
                );
                templates.insert(template.name.clone(), template);
            }
        }

        if templates.is_empty() {
            anyhow::bail!("No templates found in {:?}", dir);
        }

        Ok(Self { templates })
    }

    pub fn get(&self, name: &str) -> Option<&FormTemplate> {
        self.templates.get(name)
    }

    /// Template names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Read `name` from the environment, falling back to `default` when unset.
pub fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {:?} ({})", name, raw, e)),
        Err(_) => Ok(default),
    }
}
