//! Serializes a module graph into a single runtime-loadable bundle
//!
//! The bundle is an immediately invoked function that receives an object of module
//! factories keyed by module id. Its embedded loader instantiates a factory the first
//! time an id is requested, caches the module record before running the factory body and
//! returns the cached `exports` on every later request, so each module body executes at
//! most once per bundle evaluation.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info};
use tempfile::TempDir;

use crate::{
    module_graph::ModuleGraph, rewriter::LOADER_IDENT, text::quote_js_string,
    util::normalize_path,
};

const STAGING_PREFIX: &str = ".packrat-staging-";
const PREVIOUS_PREFIX: &str = ".packrat-previous-";
const BACKUP_DIR: &str = "previous";

/// Render the bundle text for `graph`.
///
/// Every factory binds the loader under its own name, so rewritten `__loader__` calls
/// resolve inside any module, not only the entry.
pub fn render_bundle(graph: &ModuleGraph) -> String {
    let loader = LOADER_IDENT;
    let mut out = String::new();

    out.push_str("(function (modules) {\n");
    out.push_str("  var installedModules = {};\n");
    out.push_str(&format!("  function {loader}(id) {{\n"));
    out.push_str("    if (installedModules[id]) return installedModules[id].exports;\n");
    out.push_str("    var m = installedModules[id] = { i: id, l: false, exports: {} };\n");
    out.push_str(&format!(
        "    modules[id].call(m.exports, m, m.exports, {loader});\n"
    ));
    out.push_str("    m.l = true;\n");
    out.push_str("    return m.exports;\n");
    out.push_str("  }\n");
    out.push_str(&format!(
        "  return {loader}({loader}.s = {});\n",
        quote_js_string(graph.entry().as_str())
    ));
    out.push_str("})({\n");

    let factories: Vec<String> = graph
        .modules()
        .map(|module| {
            format!(
                "  {}: function (module, exports, {loader}) {{\n{}\n  }}",
                quote_js_string(module.id.as_str()),
                module.source.trim_end()
            )
        })
        .collect();
    out.push_str(&factories.join(",\n"));

    out.push_str("\n});\n");
    out
}

/// Writes bundles into an output directory, replacing it as a whole
#[derive(Debug, Clone)]
pub struct BundleEmitter {
    output_dir: PathBuf,
    filename: String,
}

impl BundleEmitter {
    pub fn new(output_dir: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            output_dir: normalize_path(&output_dir.into()),
            filename: filename.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn output_file(&self) -> PathBuf {
        self.output_dir.join(&self.filename)
    }

    /// Validate `graph`, render it and write it to `output_dir/filename`.
    ///
    /// Any previous content of the output directory is removed. The new directory is
    /// assembled next to the old one and swapped in with renames, so a failure leaves the
    /// previous output untouched. `project_root` guards against an output directory that
    /// would swallow the sources.
    pub fn emit(&self, graph: &ModuleGraph, project_root: &Path) -> Result<PathBuf> {
        self.check_output_dir(project_root)?;
        graph.validate()?;

        let bundle = render_bundle(graph);
        debug!(
            "Rendered bundle of {} modules ({} bytes)",
            graph.len(),
            bundle.len()
        );
        self.write_atomically(&bundle)
            .with_context(|| format!("Failed to write output {}", self.output_dir.display()))?;

        let output_file = self.output_file();
        info!("Wrote {}", output_file.display());
        Ok(output_file)
    }

    fn check_output_dir(&self, project_root: &Path) -> Result<()> {
        if self.filename.is_empty() || self.filename.contains(['/', '\\']) {
            bail!("Output filename '{}' must be a plain file name", self.filename);
        }
        if self.output_dir.parent().is_none() {
            bail!(
                "Refusing to use filesystem root {} as output directory",
                self.output_dir.display()
            );
        }
        if normalize_path(project_root).starts_with(&self.output_dir) {
            bail!(
                "Output directory {} contains the project root; emitting would delete the sources",
                self.output_dir.display()
            );
        }
        Ok(())
    }

    fn write_atomically(&self, bundle: &str) -> Result<()> {
        let parent = match self.output_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)?;
        let staged_dir = staging.path().join("out");
        fs::create_dir_all(&staged_dir)?;
        fs::write(staged_dir.join(&self.filename), bundle)?;

        let previous = self.move_previous_aside(parent)?;
        if let Err(err) = fs::rename(&staged_dir, &self.output_dir) {
            if let Some(holder) = previous {
                restore_previous(holder, &self.output_dir)
                    .with_context(|| format!("Failed to install new output: {err}"))?;
            }
            return Err(err.into());
        }
        // Dropping the holders removes the old output and the empty staging directory
        drop(previous);
        drop(staging);
        Ok(())
    }

    /// Move an existing output directory into a temporary holder next to it
    fn move_previous_aside(&self, parent: &Path) -> Result<Option<TempDir>> {
        if !self.output_dir.exists() {
            return Ok(None);
        }
        debug!(
            "Replacing existing output directory {}",
            self.output_dir.display()
        );
        let holder = tempfile::Builder::new()
            .prefix(PREVIOUS_PREFIX)
            .tempdir_in(parent)?;
        fs::rename(&self.output_dir, holder.path().join(BACKUP_DIR))?;
        Ok(Some(holder))
    }
}

/// Move the output directory saved in `holder` back to `output_dir`.
///
/// When that fails the holder is kept on disk so the previous output is not lost.
fn restore_previous(holder: TempDir, output_dir: &Path) -> Result<()> {
    let backup = holder.path().join(BACKUP_DIR);
    if let Err(err) = fs::rename(&backup, output_dir) {
        let kept = holder.keep().join(BACKUP_DIR);
        return Err(anyhow!(err).context(format!(
            "Failed to restore previous output; it was kept at {}",
            kept.display()
        )));
    }
    Ok(())
}
