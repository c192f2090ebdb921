//! Deduplicating store for binary payloads
//!
//! Binary files are never diffed; their bytes are written once under the
//! archive's `data/` directory and every record that needs them points at the
//! same relative path. The store is keyed by the backend's content hash, so a
//! blob seen at several paths or in several revisions costs one file.
//!
//! ## Naming
//!
//! A blob is named after the first path it was seen at, with a version marker
//! inserted before the extension:
//!
//! ```text
//! assets/img.png         -> assets/img.v1.png
//! assets/img.png (again, -> assets/img.v2.png
//!   different bytes)
//! archive.tar.gz         -> archive.v1.tar.gz
//! LICENSE                -> LICENSE.v1
//! ```
//!
//! The extension starts at the first `.` of the file name. The marker counts up
//! until the name is taken neither by another blob nor by a directory holding
//! blobs. A directory component that would land on an existing blob file gets
//! `_` appended until it is free.

use crate::error::Result;
use crate::types::ContentHash;
use crate::utils::{ensure_parent_dir, join_relative};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Content-addressed blob writer scoped to one extraction
#[derive(Debug)]
pub struct BlobStore {
    /// Directory blobs are written into (the archive's `data/`)
    root: PathBuf,
    /// Content hash -> archive-relative path
    blobs: HashMap<ContentHash, String>,
    /// Relative paths already handed out
    paths_used: HashSet<String>,
    /// Directories holding handed-out paths
    dirs_used: HashSet<String>,
}

impl BlobStore {
    /// Create an empty store writing into `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            blobs: HashMap::new(),
            paths_used: HashSet::new(),
            dirs_used: HashSet::new(),
        }
    }

    /// Directory blobs are written into
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of distinct blobs written so far
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether nothing has been stored yet
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Relative path already assigned to `hash`, if any
    pub fn get(&self, hash: &ContentHash) -> Option<&str> {
        self.blobs.get(hash).map(String::as_str)
    }

    /// Store `bytes` first seen at `path` and return their relative path
    ///
    /// Repeated calls with the same hash return the path chosen the first time
    /// and do not touch the disk.
    pub fn store(&mut self, path: &str, hash: &ContentHash, bytes: &[u8]) -> Result<String> {
        if let Some(existing) = self.blobs.get(hash) {
            trace!("Blob {} already stored at {}", hash, existing);
            return Ok(existing.clone());
        }

        let relpath = self.free_name(path);
        let fullpath = join_relative(&self.root, &relpath);
        ensure_parent_dir(&fullpath)?;
        fs::write(&fullpath, bytes)?;
        debug!("Stored blob {} for {} as {}", hash, path, relpath);

        let mut dir = relpath.as_str();
        while let Some((parent, _)) = dir.rsplit_once('/') {
            self.dirs_used.insert(parent.to_string());
            dir = parent;
        }
        self.paths_used.insert(relpath.clone());
        self.blobs.insert(hash.clone(), relpath.clone());
        Ok(relpath)
    }

    fn free_name(&self, path: &str) -> String {
        let (dir, filename) = match path.rsplit_once('/') {
            Some((dir, filename)) => (Some(dir), filename),
            None => (None, path),
        };
        let split = filename.find('.').unwrap_or(filename.len());
        let (stem, ext) = filename.split_at(split);

        let mut prefix = String::new();
        for part in dir.into_iter().flat_map(|dir| dir.split('/')) {
            let mut candidate = join_prefix(&prefix, part);
            while self.paths_used.contains(&candidate) {
                candidate.push('_');
            }
            prefix = candidate;
        }

        (1u64..)
            .map(|version| join_prefix(&prefix, &format!("{}.v{}{}", stem, version, ext)))
            .find(|candidate| !self.paths_used.contains(candidate) && !self.dirs_used.contains(candidate))
            .unwrap_or_default()
    }
}

fn join_prefix(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}
