use std::path::{Component, Path, PathBuf};

/// Make `path` absolute and collapse `.` and `..` segments lexically.
///
/// The path does not have to exist and symlinks are not resolved. If the
/// current directory cannot be determined the input is returned unchanged.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = match std::path::absolute(path) {
        Ok(p) => p,
        Err(e) => {
            log::debug!("Could not make '{}' absolute: {}", path.display(), e);
            return path.to_path_buf();
        }
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Case-insensitive path comparison, used for tab and recent-file identity.
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

/// The name shown for a path in tabs and menus: its final component, or the
/// whole path when there is none.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_collapses_dot_segments() {
        assert_eq!(
            normalize_path(Path::new("/docs/./notes/../a.md")),
            PathBuf::from("/docs/a.md")
        );
    }

    #[test]
    fn normalize_path_parent_of_root_stays_at_root() {
        assert_eq!(normalize_path(Path::new("/../a.md")), PathBuf::from("/a.md"));
    }

    #[test]
    fn normalize_path_makes_relative_paths_absolute() {
        let normalized = normalize_path(Path::new("notes/a.md"));
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("notes/a.md"));
    }

    #[test]
    fn paths_equal_ignores_case() {
        assert!(paths_equal(Path::new("/Docs/A.md"), Path::new("/docs/a.MD")));
        assert!(!paths_equal(Path::new("/docs/a.md"), Path::new("/docs/b.md")));
    }

    #[test]
    fn display_name_uses_file_name() {
        assert_eq!(display_name(Path::new("/docs/readme.md")), "readme.md");
        assert_eq!(display_name(Path::new("/")), "/");
    }
}
