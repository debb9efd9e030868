//! packrat bundles a CommonJS module graph into a single self-loading JavaScript file.
//!
//! Starting from an entry file, every statically resolvable `require('<path>')` call is
//! followed, each module's source is passed through the configured transform chains,
//! its `require` calls are rewritten to a bundle-local loader keyed by canonical module
//! ids, and the resulting factories are serialized behind a small runtime that executes
//! each module at most once.

pub mod compiler;
pub mod config;
pub mod emitter;
pub mod graph_builder;
pub mod loader;
pub mod module_graph;
pub mod module_id;
pub mod plugin;
pub mod rewriter;
pub mod text;
pub mod transforms;
pub mod util;

pub use compiler::{BuildOutput, Compiler};
pub use config::Config;
pub use graph_builder::CycleError;
pub use module_graph::{Module, ModuleGraph};
pub use module_id::ModuleId;
pub use rewriter::UnsupportedRequire;
