//! Build orchestration
//!
//! The [`Compiler`] owns the validated configuration, the source loader assembled from its
//! rules and the plugin hooks. One call to [`Compiler::run`] performs a complete build:
//! signal `BeforeBuild`, build the module graph from the entry, emit the bundle, then signal
//! `AfterEmit`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    config::Config,
    emitter::BundleEmitter,
    graph_builder::GraphBuilder,
    loader::{Rule, SourceLoader},
    module_graph::ModuleGraph,
    module_id::ModuleId,
    plugin::{BuildEvent, Hooks, Plugin, builtin_plugin},
    transforms::TransformRegistry,
};

/// Summary of a finished build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub entry: ModuleId,
    pub module_count: usize,
    pub output_file: PathBuf,
}

#[derive(Debug)]
pub struct Compiler {
    config: Config,
    loader: SourceLoader,
    hooks: Hooks,
}

impl Compiler {
    /// Create a compiler using the built-in transforms
    pub fn new(config: Config) -> Result<Self> {
        Self::with_registry(config, &TransformRegistry::with_builtins())
    }

    /// Create a compiler resolving rule transform names in `registry`.
    ///
    /// Rule patterns and transform names are checked here, and the plugins listed in the
    /// configuration are applied once, before any build runs.
    pub fn with_registry(config: Config, registry: &TransformRegistry) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                registry
                    .resolve_chain(&rule.uses)
                    .and_then(|chain| Rule::new(&rule.test, chain))
                    .with_context(|| format!("Invalid rule #{}", index + 1))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut compiler = Self {
            loader: SourceLoader::new(rules),
            hooks: Hooks::new(),
            config,
        };
        for name in compiler.config.plugins.clone() {
            let plugin = builtin_plugin(&name)?;
            compiler.apply(plugin.as_ref());
        }
        Ok(compiler)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Let `plugin` register its callbacks
    pub fn apply(&mut self, plugin: &dyn Plugin) {
        debug!("Applying plugin '{}'", plugin.name());
        plugin.apply(&mut self.hooks);
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Resolve the module graph without writing anything
    pub fn build_graph(&self) -> Result<ModuleGraph> {
        GraphBuilder::new(&self.config.root, &self.loader, &self.config.extension)
            .build(&self.config.entry_path())
    }

    /// Run a complete build and write the bundle
    pub fn run(&self) -> Result<BuildOutput> {
        let entry_path = self.config.entry_path();
        info!("Building {}", entry_path.display());

        self.hooks.call(&BuildEvent::BeforeBuild {
            root: &self.config.root,
            entry: &entry_path,
        })?;

        let graph = self.build_graph()?;
        let emitter = BundleEmitter::new(self.config.output_dir(), &self.config.output.filename);
        let output_file = emitter.emit(&graph, &self.config.root)?;

        let output = BuildOutput {
            entry: graph.entry().clone(),
            module_count: graph.len(),
            output_file,
        };
        self.hooks.call(&BuildEvent::AfterEmit {
            entry: &output.entry,
            module_count: output.module_count,
            output_file: &output.output_file,
        })?;

        info!(
            "Bundled {} modules into {}",
            output.module_count,
            output.output_file.display()
        );
        Ok(output)
    }
}
