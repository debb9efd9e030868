//! Path helpers shared across the bundler

use std::path::{Component, Path, PathBuf};

use cow_utils::CowUtils;

/// Lexically normalize a path, collapsing `.` and `..` components without touching the
/// filesystem.
///
/// `..` at the start of a relative path is preserved, while `..` directly below the root
/// of an absolute path is dropped, matching how the OS would resolve it.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Render a path with forward slashes regardless of platform
pub fn to_slash_string(path: &Path) -> String {
    path.to_string_lossy().cow_replace('\\', "/").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_collapses_dots() {
        assert_eq!(
            normalize_path(Path::new("/project/src/./lib/../index.js")),
            PathBuf::from("/project/src/index.js")
        );
    }

    #[test]
    fn test_normalize_path_keeps_leading_parent_dirs() {
        assert_eq!(
            normalize_path(Path::new("../shared/./a.js")),
            PathBuf::from("../shared/a.js")
        );
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_normalize_path_stops_at_root() {
        assert_eq!(normalize_path(Path::new("/../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn test_to_slash_string() {
        assert_eq!(to_slash_string(Path::new("src/lib/a.js")), "src/lib/a.js");
    }
}
