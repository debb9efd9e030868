//! Canonical module identifiers
//!
//! A module id is the root-relative path of a module, written with forward slashes,
//! prefixed with `./` and always carrying a file extension. Ids are the keys of the
//! module graph and the arguments the bundled runtime loader is called with, so two
//! references to the same file must always produce the same id.

use std::{
    borrow::Borrow,
    fmt,
    path::{Path, PathBuf},
};

use anyhow::{Result, anyhow};
use cow_utils::CowUtils;

use crate::util::{normalize_path, to_slash_string};

/// Canonical identifier of a module within one build
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    /// Resolve a `require` specifier found in a module living in `parent_dir`.
    ///
    /// The default `extension` is appended when the specifier's last segment has none,
    /// then the specifier is joined onto `parent_dir` and normalized.
    pub fn resolve(specifier: &str, parent_dir: &str, extension: &str) -> Self {
        let specifier = specifier.cow_replace('\\', "/");
        let file_name = specifier.rsplit('/').next().unwrap_or_default();
        let joined = if Path::new(file_name).extension().is_some() {
            format!("{parent_dir}/{specifier}")
        } else {
            format!("{parent_dir}/{specifier}.{extension}")
        };
        Self(normalize_id(&joined))
    }

    /// Compute the id of the file at `path`, relative to the project `root`.
    ///
    /// Both paths are normalized lexically first; the file must live under `root`.
    pub fn from_path(path: &Path, root: &Path) -> Result<Self> {
        let path = normalize_path(path);
        let root = normalize_path(root);
        let relative = path.strip_prefix(&root).map_err(|_| {
            anyhow!(
                "Module {} is outside of the project root {}",
                path.display(),
                root.display()
            )
        })?;
        Ok(Self(normalize_id(&to_slash_string(relative))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory part of the id, used as the base for the module's own `require` calls.
    ///
    /// `./src/a.js` yields `./src`, `./a.js` yields `.`.
    pub fn parent_dir(&self) -> &str {
        self.0.rsplit_once('/').map_or(".", |(dir, _)| dir)
    }

    /// Absolute location of this module under `root`
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let relative = self.0.strip_prefix("./").unwrap_or(&self.0);
        normalize_path(&root.join(relative))
    }
}

/// Collapse `.`, `..` and empty segments of a slash separated path and prefix the
/// result with `./`.
fn normalize_id(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    format!("./{}", segments.join("/"))
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_appends_default_extension() {
        let id = ModuleId::resolve("./message", "./src", "js");
        assert_eq!(id.as_str(), "./src/message.js");
    }

    #[test]
    fn test_resolve_keeps_existing_extension() {
        assert_eq!(
            ModuleId::resolve("./data.json", "./src", "js").as_str(),
            "./src/data.json"
        );
        // Only the last segment decides whether an extension is present
        assert_eq!(
            ModuleId::resolve("./v1.2/name", "./src", "js").as_str(),
            "./src/v1.2/name.js"
        );
    }

    #[test]
    fn test_resolve_normalizes_parent_segments() {
        assert_eq!(
            ModuleId::resolve("../lib/util", "./src/app", "js").as_str(),
            "./src/lib/util.js"
        );
        assert_eq!(
            ModuleId::resolve("./a/../b", ".", "js").as_str(),
            "./b.js"
        );
    }

    #[test]
    fn test_resolve_bare_specifier_is_relative_to_parent() {
        assert_eq!(
            ModuleId::resolve("lodash", "./src", "js").as_str(),
            "./src/lodash.js"
        );
    }

    #[test]
    fn test_resolve_normalizes_backslashes() {
        assert_eq!(
            ModuleId::resolve(".\\lib\\util", "./src", "js").as_str(),
            "./src/lib/util.js"
        );
    }

    #[test]
    fn test_resolve_above_root_keeps_parent_segments() {
        assert_eq!(
            ModuleId::resolve("../../shared", "./src", "js").as_str(),
            "./../shared.js"
        );
    }

    #[test]
    fn test_from_path() -> Result<()> {
        let id = ModuleId::from_path(
            Path::new("/project/src/./index.js"),
            Path::new("/project"),
        )?;
        assert_eq!(id.as_str(), "./src/index.js");
        Ok(())
    }

    #[test]
    fn test_from_path_outside_root_fails() {
        let result = ModuleId::from_path(Path::new("/elsewhere/index.js"), Path::new("/project"));
        assert!(result.is_err());
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(ModuleId::resolve("./a", ".", "js").parent_dir(), ".");
        assert_eq!(
            ModuleId::resolve("./lib/a", "./src", "js").parent_dir(),
            "./src/lib"
        );
    }

    #[test]
    fn test_to_path() {
        let id = ModuleId::resolve("./lib/a", "./src", "js");
        assert_eq!(
            id.to_path(Path::new("/project")),
            PathBuf::from("/project/src/lib/a.js")
        );
    }
}
