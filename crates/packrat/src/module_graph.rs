//! The module graph produced by one build
//!
//! Modules are keyed by their canonical id and kept in discovery order: the entry first,
//! then every dependency in depth-first pre-order. The order is what makes two builds of
//! the same input produce byte-identical bundles.

use std::path::PathBuf;

use anyhow::{Result, bail};
use indexmap::IndexMap;

use crate::module_id::ModuleId;

/// A resolved module with its rewritten source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub id: ModuleId,
    /// Absolute path the source was read from
    pub path: PathBuf,
    /// Transformed and rewritten source text
    pub source: String,
    /// Resolved dependency ids in discovery order, duplicates included
    pub dependencies: Vec<ModuleId>,
}

/// Mapping from module id to module, plus the entry id used to bootstrap the bundle
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    entry: ModuleId,
    modules: IndexMap<ModuleId, Module>,
}

impl ModuleGraph {
    pub fn new(entry: ModuleId) -> Self {
        Self {
            entry,
            modules: IndexMap::new(),
        }
    }

    pub fn entry(&self) -> &ModuleId {
        &self.entry
    }

    /// Insert a module, replacing and returning any module previously stored under its id.
    ///
    /// A replaced module keeps its original position in the graph order.
    pub fn insert(&mut self, module: Module) -> Option<Module> {
        self.modules.insert(module.id.clone(), module)
    }

    pub fn get(&self, id: &str) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules in graph order
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    /// Check that the entry and every dependency of every module have an entry in the graph
    pub fn validate(&self) -> Result<()> {
        if !self.contains(self.entry.as_str()) {
            bail!("Entry module {} is missing from the module graph", self.entry);
        }
        for module in self.modules() {
            if let Some(missing) = module
                .dependencies
                .iter()
                .find(|dependency| !self.contains(dependency.as_str()))
            {
                bail!(
                    "Module {} depends on {missing}, which is missing from the module graph",
                    module.id
                );
            }
        }
        Ok(())
    }
}
