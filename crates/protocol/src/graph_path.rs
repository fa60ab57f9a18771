//! Graph paths: root-separator-prefixed locations of containers under a
//! project's data root, independent of where the data root lives on disk.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[cfg(windows)]
pub const ROOT_DIR: &str = "\\";

#[cfg(not(windows))]
pub const ROOT_DIR: &str = "/";

/// Windows long-path prefix.
pub const UNC_PREFIX: &str = r"\\?\";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphPathError {
    #[error("graph path `{0}` must start with `{root}`", root = ROOT_DIR)]
    MissingRoot(String),

    #[error("graph path `{0}` must not contain parent components")]
    ParentComponent(String),
}

/// Prefixes `path` with [`ROOT_DIR`]. The current directory maps to the bare root.
pub fn ensure_root_path(path: &str) -> String {
    if path.starts_with(ROOT_DIR) {
        path.to_string()
    } else if path.is_empty() || path == "." {
        ROOT_DIR.to_string()
    } else {
        format!("{ROOT_DIR}{path}")
    }
}

/// Graph path for a location relative to the data root.
pub fn graph_path_from_relative(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    ensure_root_path(&parts.join(ROOT_DIR))
}

/// Location relative to the data root for a graph path token.
///
/// On Windows the token must itself start with [`ROOT_DIR`].
pub fn relative_from_graph_path(token: &str) -> Result<PathBuf, GraphPathError> {
    if cfg!(windows) && !token.starts_with(ROOT_DIR) {
        return Err(GraphPathError::MissingRoot(token.to_string()));
    }

    let mut relative = PathBuf::new();
    for part in token.split(is_separator) {
        match part {
            "" | "." => continue,
            ".." => return Err(GraphPathError::ParentComponent(token.to_string())),
            part => relative.push(part),
        }
    }
    Ok(relative)
}

/// Ensures `path` carries the Windows long-path prefix.
pub fn windows_ensure_unc_path(path: &str) -> String {
    if path.starts_with(UNC_PREFIX) {
        path.to_string()
    } else {
        format!("{UNC_PREFIX}{path}")
    }
}

/// Lexically resolves `.` and `..` components without touching the filesystem.
///
/// `..` never climbs above a root; in relative paths a leading `..` is kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn is_separator(c: char) -> bool {
    c == '/' || (cfg!(windows) && c == '\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_dir_maps_to_root() {
        assert_eq!(ensure_root_path("."), ROOT_DIR);
        assert_eq!(ensure_root_path(""), ROOT_DIR);
        assert_eq!(graph_path_from_relative(Path::new("")), ROOT_DIR);
    }

    #[cfg(not(windows))]
    #[test]
    fn relative_locations_become_graph_paths() {
        assert_eq!(ensure_root_path("expA"), "/expA");
        assert_eq!(ensure_root_path("/expA"), "/expA");
        assert_eq!(graph_path_from_relative(Path::new("expA/trial1")), "/expA/trial1");
    }

    #[cfg(not(windows))]
    #[test]
    fn graph_tokens_resolve_to_relative_locations() {
        assert_eq!(
            relative_from_graph_path("/expA/trial1").unwrap(),
            PathBuf::from("expA/trial1")
        );
        assert_eq!(relative_from_graph_path("/").unwrap(), PathBuf::new());
        assert_eq!(relative_from_graph_path("expA").unwrap(), PathBuf::from("expA"));
        assert!(matches!(
            relative_from_graph_path("/expA/../other"),
            Err(GraphPathError::ParentComponent(_))
        ));
    }

    #[test]
    fn unc_prefix_is_idempotent() {
        let once = windows_ensure_unc_path(r"C:\data");
        assert_eq!(once, r"\\?\C:\data");
        assert_eq!(windows_ensure_unc_path(&once), once);
    }

    #[cfg(not(windows))]
    #[test]
    fn normalize_resolves_dots_lexically() {
        assert_eq!(
            normalize_path(Path::new("/home/u/./proj/data/../data/expA")),
            PathBuf::from("/home/u/proj/data/expA")
        );
        assert_eq!(normalize_path(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize_path(Path::new("out/./a.csv")), PathBuf::from("out/a.csv"));
        assert_eq!(normalize_path(Path::new("../a.csv")), PathBuf::from("../a.csv"));
        assert_eq!(normalize_path(Path::new("out/../../a.csv")), PathBuf::from("../a.csv"));
    }
}
