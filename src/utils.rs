//! File system helpers for the archive and the rebuilt working tree
//!
//! Paths inside histories and archives are always forward-slash text; these
//! helpers turn them into platform paths and take care of the permission bits
//! the executable flag maps onto.

use crate::error::{PatchtrailError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, trace};

/// Join a forward-slash relative path onto `base`
pub fn join_relative(base: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}

/// Whether `relative` stays below the directory it is joined onto
///
/// Rejects absolute paths, empty components, and `.` or `..` components.
pub fn is_contained_relative(relative: &str) -> bool {
    !relative.is_empty()
        && relative
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}

/// Create the parent directory of `path` if it is missing
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write `content` through a temporary sibling and rename it into place
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Set or clear the executable bits of a file
#[cfg(unix)]
pub fn set_executable(path: &Path, executable: bool) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if executable { 0o755 } else { 0o644 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    trace!("Set mode {:o} on {:?}", mode, path);
    Ok(())
}

/// Set or clear the executable bits of a file (no-op outside unix)
#[cfg(not(unix))]
pub fn set_executable(path: &Path, executable: bool) -> Result<()> {
    trace!("Ignoring executable={} for {:?} on this platform", executable, path);
    Ok(())
}

/// Whether the owner-executable bit is set
#[cfg(unix)]
pub fn is_executable(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & 0o100 != 0)
}

/// Whether the owner-executable bit is set (always false outside unix)
#[cfg(not(unix))]
pub fn is_executable(_path: &Path) -> Result<bool> {
    Ok(false)
}

/// Remove directory if empty
pub fn remove_dir_if_empty(path: &Path) -> Result<bool> {
    if path.is_dir() && fs::read_dir(path)?.next().is_none() {
        fs::remove_dir(path)?;
        trace!("Removed empty directory: {:?}", path);
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Remove the now-empty directories between `file` and `stop`
pub fn prune_empty_parents(file: &Path, stop: &Path) -> Result<()> {
    let mut current = file.parent();
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) || !remove_dir_if_empty(dir)? {
            break;
        }
        current = dir.parent();
    }
    Ok(())
}

/// Whether `path` is missing or an empty directory
pub fn is_missing_or_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    Ok(path.is_dir() && fs::read_dir(path)?.next().is_none())
}

/// Make `path` an empty directory, clearing it only when `force` is set
pub fn prepare_output_dir(path: &Path, force: bool) -> Result<()> {
    if !is_missing_or_empty(path)? {
        if !force {
            return Err(PatchtrailError::TargetNotEmpty(path.to_path_buf()));
        }
        info!("Clearing existing directory {:?}", path);
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_contained_relative() {
        assert!(is_contained_relative("a/b.txt"));
        assert!(is_contained_relative(".hidden/x..y"));
        assert!(!is_contained_relative(""));
        assert!(!is_contained_relative("/abs"));
        assert!(!is_contained_relative("a/../b"));
        assert!(!is_contained_relative("./a"));
        assert!(!is_contained_relative("a//b"));
    }

    #[test]
    fn test_join_relative() {
        let joined = join_relative(Path::new("/repo"), "src/bin/main.rs");
        assert_eq!(joined, PathBuf::from("/repo").join("src").join("bin").join("main.rs"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1_048_576), "1.00 MB");
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("1.json");

        atomic_write(&file_path, b"{}").unwrap();

        assert_eq!(fs::read(&file_path).unwrap(), b"{}");
        assert!(!temp_dir.path().join("1.json.tmp").exists());
    }

    #[test]
    fn test_prune_empty_parents() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::write(root.join("a/keep.txt"), b"x").unwrap();

        prune_empty_parents(&root.join("a/b/c/gone.txt"), root).unwrap();

        assert!(!root.join("a/b").exists());
        assert!(root.join("a").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_set_executable() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("run.sh");
        fs::write(&file_path, b"#!/bin/sh\n").unwrap();

        set_executable(&file_path, true).unwrap();
        assert!(is_executable(&file_path).unwrap());
        set_executable(&file_path, false).unwrap();
        assert!(!is_executable(&file_path).unwrap());
    }

    #[test]
    fn test_prepare_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");

        prepare_output_dir(&out, false).unwrap();
        assert!(out.is_dir());

        fs::write(out.join("stale"), b"x").unwrap();
        let err = prepare_output_dir(&out, false).unwrap_err();
        assert!(matches!(err, PatchtrailError::TargetNotEmpty(_)));
        assert!(out.join("stale").exists());

        prepare_output_dir(&out, true).unwrap();
        assert!(is_missing_or_empty(&out).unwrap());
    }
}
