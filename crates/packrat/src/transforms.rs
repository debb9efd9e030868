//! Built-in transforms and the name registry used by the configuration file

use std::{path::Path, sync::Arc};

use anyhow::{Result, anyhow};
use rustc_hash::FxHashMap;

use crate::{
    loader::{SharedTransform, Transform},
    text::{quote_js_string, strip_bom},
};

/// Removes a leading byte order mark
#[derive(Debug, Clone, Copy, Default)]
pub struct StripBom;

impl Transform for StripBom {
    fn name(&self) -> &str {
        "strip-bom"
    }

    fn transform(&self, source: String, _path: &Path) -> Result<String> {
        if source.starts_with('\u{FEFF}') {
            Ok(strip_bom(&source).to_owned())
        } else {
            Ok(source)
        }
    }
}

/// Turns a JSON document into a module exporting the parsed value
///
/// `{"key": "value"}` becomes `module.exports = JSON.parse("{\"key\": \"value\"}");`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModule;

impl Transform for JsonModule {
    fn name(&self) -> &str {
        "json"
    }

    fn transform(&self, source: String, _path: &Path) -> Result<String> {
        Ok(format!(
            "module.exports = JSON.parse({});",
            quote_js_string(strip_bom(&source))
        ))
    }
}

/// Exports the raw file content as a string
#[derive(Debug, Clone, Copy, Default)]
pub struct TextModule;

impl Transform for TextModule {
    fn name(&self) -> &str {
        "text"
    }

    fn transform(&self, source: String, _path: &Path) -> Result<String> {
        Ok(format!("module.exports = {};", quote_js_string(&source)))
    }
}

/// Lookup table from configuration names to transforms
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    transforms: FxHashMap<String, SharedTransform>,
}

impl TransformRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `strip-bom`, `json` and `text`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StripBom));
        registry.register(Arc::new(JsonModule));
        registry.register(Arc::new(TextModule));
        registry
    }

    /// Register a transform under its own name, replacing any previous one
    pub fn register(&mut self, transform: SharedTransform) -> Option<SharedTransform> {
        self.transforms
            .insert(transform.name().to_owned(), transform)
    }

    pub fn get(&self, name: &str) -> Result<SharedTransform> {
        self.transforms.get(name).cloned().ok_or_else(|| {
            let mut known: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
            known.sort_unstable();
            anyhow!(
                "Unknown transform '{name}' (available: {})",
                known.join(", ")
            )
        })
    }

    /// Resolve a chain of transform names, keeping their order
    pub fn resolve_chain(&self, names: &[String]) -> Result<Vec<SharedTransform>> {
        names.iter().map(|name| self.get(name)).collect()
    }
}
