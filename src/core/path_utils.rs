/*
 * Helpers for locating (and creating) the application's private directories and for
 * converting between `/`-separated relative paths and filesystem paths. Everything
 * that needs to know where the platform keeps per-user data goes through here.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Component, Path, PathBuf};

fn ensure_dir_exists(path: &Path, purpose: &str) -> Option<PathBuf> {
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path) {
            log::error!("PathUtils: Failed to create {purpose} directory {path:?}: {e}");
            return None;
        }
        log::debug!("PathUtils: Created {purpose} directory: {path:?}");
    } else {
        log::trace!("PathUtils: {purpose} directory already exists: {path:?}");
    }
    Some(path.to_path_buf())
}

/*
 * Retrieves the application's local (non-roaming) configuration directory, creating
 * it if needed. Returns `None` if the platform offers no such location or it could
 * not be created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get base app config local dir for '{app_name}'");
    ProjectDirs::from("", "", app_name)
        .and_then(|proj_dirs| ensure_dir_exists(proj_dirs.config_local_dir(), "config"))
}

/*
 * Retrieves the application's local data directory. This is the private sandbox
 * that holds the internal sketchbook, the examples and the temporary projects.
 */
pub fn get_base_app_data_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get base app data local dir for '{app_name}'");
    ProjectDirs::from("", "", app_name)
        .and_then(|proj_dirs| ensure_dir_exists(proj_dirs.data_local_dir(), "data"))
}

/*
 * Splits a `/`-separated relative path into its segments, dropping empty ones so
 * that both "/a/b" and "a/b/" address the same node. Returns `None` when a segment
 * would escape its root (`..`), is a bare `.`, or smuggles in a platform separator
 * or a drive prefix.
 */
pub fn split_relative_path(relative: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    for segment in relative.split('/') {
        if segment.is_empty() {
            continue;
        }
        if segment == "." || segment == ".." || segment.contains('\\') {
            return None;
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => segments.push(segment.to_string()),
            _ => return None,
        }
    }
    Some(segments)
}

pub fn join_segments(root: &Path, segments: &[String]) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in segments {
        path.push(segment);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_get_base_app_config_local_dir_creates_if_not_exists() {
        // Arrange
        let unique_app_name = format!("TestApp_PathUtils_Create_{}", rand::random::<u128>());

        // Act
        let path = get_base_app_config_local_dir(&unique_app_name)
            .expect("Should return a path for a new app name");

        // Assert
        assert!(path.is_dir(), "Directory should have been created at {path:?}");
        assert!(
            path.to_string_lossy()
                .to_lowercase()
                .contains(&unique_app_name.to_lowercase())
        );

        if let Err(e) = fs::remove_dir_all(&path) {
            eprintln!("Test cleanup error for {}: {e}", path.display());
        }
    }

    #[test]
    fn test_get_base_app_data_local_dir_returns_existing() {
        let unique_app_name = format!("TestApp_PathUtils_Data_{}", rand::random::<u128>());

        let first = get_base_app_data_local_dir(&unique_app_name).expect("first call");
        let second = get_base_app_data_local_dir(&unique_app_name).expect("second call");

        assert_eq!(first, second);
        if let Err(e) = fs::remove_dir_all(&first) {
            eprintln!("Test cleanup error for {}: {e}", first.display());
        }
    }

    #[test]
    fn test_split_relative_path_drops_empty_segments() {
        assert_eq!(
            split_relative_path("/a//b/"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(split_relative_path(""), Some(Vec::new()));
        assert_eq!(split_relative_path("/"), Some(Vec::new()));
    }

    #[test]
    fn test_split_relative_path_rejects_escapes() {
        assert_eq!(split_relative_path("a/../b"), None);
        assert_eq!(split_relative_path("./a"), None);
        assert_eq!(split_relative_path("a\\b"), None);
    }
}
