//! Builds the module graph from an entry file
//!
//! Resolution runs on an explicit worklist instead of the call stack, so dependency depth
//! is not limited by stack space. Each module id is loaded, transformed and rewritten at
//! most once: later references to an id already in the graph are skipped. A reference to
//! an id that is still being resolved further up the active chain is a circular dependency
//! and aborts the build with a [`CycleError`].

use std::{fmt, path::Path};

use anyhow::{Context, Result};
use indexmap::IndexSet;
use log::{debug, trace};

use crate::{
    loader::SourceLoader,
    module_graph::{Module, ModuleGraph},
    module_id::ModuleId,
    rewriter::RequireRewriter,
};

/// A chain of `require` calls leading back to a module that is still being resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    /// Ids along the cycle; the first and last element are the same module
    pub chain: Vec<ModuleId>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Circular dependency detected: ")?;
        for (index, id) in self.chain.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CycleError {}

/// Resolves an entry file and everything it transitively requires
#[derive(Debug)]
pub struct GraphBuilder<'a> {
    root: &'a Path,
    loader: &'a SourceLoader,
    rewriter: RequireRewriter,
}

/// A unit of pending work on the resolution stack
#[derive(Debug)]
enum Visit {
    /// Resolve `id`, which was required by `importer`
    Enter {
        id: ModuleId,
        importer: Option<ModuleId>,
    },
    /// All dependencies of the innermost active module have been handled
    Exit,
}

/// State of a single build, owned by [`GraphBuilder::build`]
struct BuildContext {
    graph: ModuleGraph,
    /// Modules whose dependencies are still being resolved, outermost first
    active: IndexSet<ModuleId>,
    stack: Vec<Visit>,
}

impl<'a> GraphBuilder<'a> {
    /// `root` must be absolute; module ids are computed relative to it
    pub fn new(root: &'a Path, loader: &'a SourceLoader, extension: &str) -> Self {
        Self {
            root,
            loader,
            rewriter: RequireRewriter::new(extension),
        }
    }

    /// Build the complete graph reachable from the file at `entry`
    pub fn build(&self, entry: &Path) -> Result<ModuleGraph> {
        let entry_id = ModuleId::from_path(entry, self.root)?;
        debug!("Building module graph from entry {entry_id}");

        let mut ctx = BuildContext {
            graph: ModuleGraph::new(entry_id.clone()),
            active: IndexSet::new(),
            stack: vec![Visit::Enter {
                id: entry_id,
                importer: None,
            }],
        };

        while let Some(visit) = ctx.stack.pop() {
            match visit {
                Visit::Enter { id, importer } => self.enter(&mut ctx, id, importer)?,
                Visit::Exit => {
                    if let Some(finished) = ctx.active.pop() {
                        trace!("Finished resolving {finished}");
                    }
                }
            }
        }

        debug!("Module graph complete with {} modules", ctx.graph.len());
        Ok(ctx.graph)
    }

    fn enter(
        &self,
        ctx: &mut BuildContext,
        id: ModuleId,
        importer: Option<ModuleId>,
    ) -> Result<()> {
        if let Some(position) = ctx.active.get_index_of(&id) {
            let mut chain: Vec<ModuleId> = ctx.active.iter().skip(position).cloned().collect();
            chain.push(id);
            return Err(CycleError { chain }.into());
        }
        if ctx.graph.contains(id.as_str()) {
            trace!("Skipping {id}, already in the graph");
            return Ok(());
        }

        let module = self.build_module(&id).with_context(|| match &importer {
            Some(importer) => format!("Failed to build module {id} (required by {importer})"),
            None => format!("Failed to build entry module {id}"),
        })?;

        // Push in reverse so the first dependency is resolved first
        ctx.stack.push(Visit::Exit);
        for dependency in module.dependencies.iter().rev() {
            ctx.stack.push(Visit::Enter {
                id: dependency.clone(),
                importer: Some(id.clone()),
            });
        }
        ctx.active.insert(id);
        ctx.graph.insert(module);
        Ok(())
    }

    fn build_module(&self, id: &ModuleId) -> Result<Module> {
        let path = id.to_path(self.root);
        let source = self.loader.load(&path)?;
        let rewritten = self.rewriter.rewrite(id, &source)?;
        debug!(
            "Resolved {id} with {} dependencies",
            rewritten.dependencies.len()
        );
        Ok(Module {
            id: id.clone(),
            path,
            source: rewritten.code,
            dependencies: rewritten.dependencies,
        })
    }
}
