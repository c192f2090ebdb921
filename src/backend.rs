//! Capabilities the pipelines need from a version-control backend
//!
//! Extraction only reads history; rebuild only writes it. The two sides are
//! separate traits so a read-only binding (or a test double) does not have to
//! stub out the other half. [`crate::git::GitBackend`] implements both on top
//! of libgit2.

use crate::author::Author;
use crate::error::Result;
use crate::types::{Commit, ContentHash, IndexUpdate, Revision, TreeId, TreeSnapshot};
use std::path::Path;

/// Read access to an existing history
pub trait HistoryReader {
    /// Resolve a branch or ref name to the commit it points at
    fn resolve_ref(&self, name: &str) -> Result<Revision>;

    /// Every revision reachable from `tip`, oldest first
    fn list_revisions(&self, tip: &Revision) -> Result<Vec<Revision>>;

    /// Read one commit
    fn read_commit(&self, revision: &Revision) -> Result<Commit>;

    /// Read every file of a tree, recursively
    fn read_tree(&self, tree: &TreeId) -> Result<TreeSnapshot>;

    /// Read the bytes of a file
    fn read_blob(&self, hash: &ContentHash) -> Result<Vec<u8>>;

    /// Unified diff text between two blobs, file headers included
    fn unified_diff(&self, old: &ContentHash, new: &ContentHash) -> Result<String>;
}

/// Write access to a working tree, its index and the commit graph
pub trait HistoryWriter {
    /// Root of the working tree the applier mutates
    fn workdir(&self) -> &Path;

    /// Stage or unstage one path
    fn update_index(&mut self, update: IndexUpdate<'_>) -> Result<()>;

    /// Write a tree object from the current index
    fn write_tree(&mut self) -> Result<TreeId>;

    /// Create a commit object; does not move any ref
    fn create_commit(
        &mut self,
        tree: &TreeId,
        parent: Option<&Revision>,
        author: &Author,
        committer: &Author,
        message: &str,
    ) -> Result<Revision>;

    /// Point branch `name` at `commit`
    fn update_branch(&mut self, name: &str, commit: &Revision) -> Result<()>;
}
