//! Source loading with path-matched transform chains
//!
//! Every module's raw file content passes through the [`SourceLoader`] before it is parsed.
//! The loader holds an ordered list of [`Rule`]s; each rule whose pattern matches the
//! module path contributes its transform chain. Chains run from their last entry towards
//! their first, feeding each output into the next transform, and chains of several
//! matching rules run in rule declaration order.

use std::{fmt, fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use log::trace;
use regex::Regex;

use crate::util::to_slash_string;

/// A source-to-source function applied to module content before parsing
pub trait Transform: fmt::Debug + Send + Sync {
    /// Name used to refer to this transform from the configuration file
    fn name(&self) -> &str;

    /// Transform `source`, the content of the file at `path`
    fn transform(&self, source: String, path: &Path) -> Result<String>;
}

/// Shared handle to a transform; one transform may appear in several chains
pub type SharedTransform = Arc<dyn Transform>;

type TransformFn = dyn Fn(String, &Path) -> Result<String> + Send + Sync;

/// A [`Transform`] backed by a closure
pub struct FnTransform {
    name: String,
    func: Box<TransformFn>,
}

impl FnTransform {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(String, &Path) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    /// Wrap the closure in a [`SharedTransform`]
    pub fn shared<F>(name: impl Into<String>, func: F) -> SharedTransform
    where
        F: Fn(String, &Path) -> Result<String> + Send + Sync + 'static,
    {
        Arc::new(Self::new(name, func))
    }
}

impl fmt::Debug for FnTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Transform for FnTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, source: String, path: &Path) -> Result<String> {
        (self.func)(source, path)
    }
}

/// A path pattern together with the transform chain applied to matching modules
#[derive(Debug, Clone)]
pub struct Rule {
    test: Regex,
    chain: Vec<SharedTransform>,
}

impl Rule {
    /// Compile `pattern` as a regular expression matched against the module's absolute,
    /// slash-normalized path
    pub fn new(pattern: &str, chain: Vec<SharedTransform>) -> Result<Self> {
        let test = Regex::new(pattern)
            .with_context(|| format!("Invalid rule pattern '{pattern}'"))?;
        Ok(Self { test, chain })
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.test.is_match(&to_slash_string(path))
    }

    pub fn pattern(&self) -> &str {
        self.test.as_str()
    }

    pub fn chain(&self) -> &[SharedTransform] {
        &self.chain
    }
}

/// Reads module files and runs them through the configured rules
#[derive(Debug, Clone, Default)]
pub struct SourceLoader {
    rules: Vec<Rule>,
}

impl SourceLoader {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Read the file at `path` and apply every matching transform chain
    pub fn load(&self, path: &Path) -> Result<String> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read module source {}", path.display()))?;
        self.apply(source, path)
    }

    /// Apply every matching transform chain to already-read `source`
    pub fn apply(&self, mut source: String, path: &Path) -> Result<String> {
        for rule in self.rules.iter().filter(|rule| rule.matches(path)) {
            for transform in rule.chain.iter().rev() {
                trace!(
                    "Applying transform '{}' (rule '{}') to {}",
                    transform.name(),
                    rule.pattern(),
                    path.display()
                );
                source = transform.transform(source, path).with_context(|| {
                    format!(
                        "Transform '{}' failed for {}",
                        transform.name(),
                        path.display()
                    )
                })?;
            }
        }
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn append(name: &'static str) -> SharedTransform {
        FnTransform::shared(name, move |source, _| Ok(format!("{source}{name}")))
    }

    #[test]
    fn test_no_rules_returns_content_unchanged() -> Result<()> {
        let loader = SourceLoader::default();
        let source = loader.apply("module.exports = 1;".into(), Path::new("/p/a.js"))?;
        assert_eq!(source, "module.exports = 1;");
        Ok(())
    }

    #[test]
    fn test_chain_runs_from_last_to_first() -> Result<()> {
        let rule = Rule::new(r"\.js$", vec![append("a"), append("b"), append("c")])?;
        let loader = SourceLoader::new(vec![rule]);
        let source = loader.apply(String::new(), Path::new("/p/index.js"))?;
        assert_eq!(source, "cba");
        Ok(())
    }

    #[test]
    fn test_matching_rules_apply_in_declaration_order() -> Result<()> {
        let loader = SourceLoader::new(vec![
            Rule::new(r"\.js$", vec![append("1"), append("2")])?,
            Rule::new(r"^/never/", vec![append("x")])?,
            Rule::new(r"/src/", vec![append("3")])?,
        ]);
        let source = loader.apply(String::new(), Path::new("/p/src/index.js"))?;
        assert_eq!(source, "213");
        Ok(())
    }

    #[test]
    fn test_rule_matches_slash_normalized_path() -> Result<()> {
        let rule = Rule::new(r"src/lib/.*\.json$", Vec::new())?;
        let path: PathBuf = ["p", "src", "lib", "data.json"].iter().collect();
        assert!(rule.matches(&path));
        assert!(!rule.matches(Path::new("p/src/data.json")));
        Ok(())
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = Rule::new("(unclosed", Vec::new()).unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn test_failing_transform_names_itself() {
        let failing = FnTransform::shared("explode", |_, _| anyhow::bail!("boom"));
        let loader = SourceLoader::new(vec![Rule::new(".*", vec![failing]).unwrap()]);
        let err = loader
            .apply(String::new(), Path::new("/p/a.js"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("Transform 'explode' failed"));
        assert!(format!("{err:#}").contains("boom"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let loader = SourceLoader::default();
        let err = loader.load(Path::new("/definitely/missing/module.js")).unwrap_err();
        assert!(err.to_string().contains("Failed to read module source"));
    }
}
