#![allow(clippy::disallowed_methods)]

use std::{env, fs, path::PathBuf};

use packrat::{Compiler, Config};
use serial_test::serial;
use tempfile::TempDir;

/// Restores the process working directory when dropped
struct CwdGuard(PathBuf);

impl CwdGuard {
    fn enter(dir: &std::path::Path) -> Self {
        let previous = env::current_dir().unwrap();
        env::set_current_dir(dir).unwrap();
        Self(previous)
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.0);
    }
}

#[test]
#[serial]
fn test_config_is_discovered_in_working_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/index.js"), "module.exports = require('./a');").unwrap();
    fs::write(root.join("src/a.js"), "module.exports = 'a';").unwrap();
    fs::write(
        root.join("packrat.toml"),
        "entry = \"src/index.js\"\n\n[output]\npath = \"build\"\n",
    )
    .unwrap();

    let _guard = CwdGuard::enter(&root);
    let config = Config::discover(&env::current_dir().unwrap()).unwrap();
    assert_eq!(config.root, root);

    let output = Compiler::new(config).unwrap().run().unwrap();
    assert_eq!(output.output_file, root.join("build/main.js"));
    assert!(output.output_file.is_file());
}

#[test]
#[serial]
fn test_relative_config_path_uses_working_directory_as_root() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    fs::write(root.join("index.js"), "").unwrap();
    fs::write(root.join("packrat.toml"), "entry = \"index.js\"\n").unwrap();

    let _guard = CwdGuard::enter(&root);
    let config = Config::load(std::path::Path::new("packrat.toml")).unwrap();
    assert_eq!(config.root, root);
    assert_eq!(config.entry_path(), root.join("index.js"));
}
