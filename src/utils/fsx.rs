//! Filesystem primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Read file contents with standardized error handling.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        Error::internal_io(
            format!("Failed to read {}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Write content to file with standardized error handling.
pub fn write_file(path: &Path, content: &str, operation: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| {
        Error::internal_io(
            format!("Failed to write {}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Create a directory and all missing parents.
pub fn ensure_dir(path: &Path, operation: &str) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        Error::internal_io(
            format!("Failed to create {}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Copy one file, creating the destination's parent directories first.
pub fn copy_file(from: &Path, to: &Path, operation: &str) -> Result<()> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent, operation)?;
    }
    fs::copy(from, to).map_err(|e| {
        Error::internal_io(
            format!(
                "Failed to copy {} -> {}: {}",
                from.display(),
                to.display(),
                e
            ),
            Some(operation.to_string()),
        )
    })?;
    Ok(())
}

/// Rename a file within the same filesystem.
pub fn rename_file(from: &Path, to: &Path, operation: &str) -> Result<()> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent, operation)?;
    }
    fs::rename(from, to).map_err(|e| {
        Error::internal_io(
            format!(
                "Failed to rename {} -> {}: {}",
                from.display(),
                to.display(),
                e
            ),
            Some(operation.to_string()),
        )
    })
}

/// Remove a directory tree if it exists. Missing directories are not an error.
pub fn remove_dir_if_exists(path: &Path, operation: &str) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_dir_all(path).map_err(|e| {
        Error::internal_io(
            format!("Failed to remove {}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Remove a file if it exists. Missing files are not an error.
pub fn remove_file_if_exists(path: &Path, operation: &str) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_file(path).map_err(|e| {
        Error::internal_io(
            format!("Failed to remove {}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Recursively list all regular files under a directory (dotfiles included).
///
/// Returns paths in a stable (sorted) order so copy and filter operations
/// behave deterministically across runs.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk_into(root, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_into(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::internal_io(
            format!("Failed to list {}: {}", dir.display(), e),
            Some("walk files".to_string()),
        )
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::internal_io(e.to_string(), Some("walk files".to_string()))
        })?;
        let path = entry.path();
        if path.is_dir() {
            walk_into(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Relative path of `path` under `root`, rendered with forward slashes for
/// glob matching.
pub fn relative_unix_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::internal_unexpected(format!(
            "{} is not under {}",
            path.display(),
            root.display()
        ))
    })?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let result = read_file(Path::new("/nonexistent/path.txt"), "test read");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn copy_file_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, "content").unwrap();

        let dst = dir.path().join("nested/deep/a.txt");
        copy_file(&src, &dst, "test copy").unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "content");
    }

    #[test]
    fn walk_files_includes_dotfiles_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.js"), "").unwrap();
        fs::write(dir.path().join(".htaccess"), "").unwrap();
        fs::write(dir.path().join("a.css"), "").unwrap();

        let files = walk_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| relative_unix_path(dir.path(), p).unwrap())
            .collect();
        assert_eq!(names, vec![".htaccess", "a.css", "sub/b.js"]);
    }

    #[test]
    fn remove_dir_if_exists_is_quiet_on_missing() {
        let dir = TempDir::new().unwrap();
        remove_dir_if_exists(&dir.path().join("missing"), "test").unwrap();
    }
}
