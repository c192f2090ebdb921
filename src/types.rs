//! Core data types shared by the extract and rebuild pipelines
//!
//! ## Overview
//!
//! - **Identifiers**: `Revision`, `TreeId`, `ContentHash` - opaque ids handed out by the backend
//! - **History state**: `Commit`, `TreeSnapshot`, `TreeEntry` - read-only views of one revision
//! - **Index mutation**: `IndexUpdate` - the two ways the applier touches the working index
//! - **Results**: `ExtractSummary`, `RebuildSummary` - what a finished run produced

use crate::author::Author;
use crate::document::RecordKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a backend-provided identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier text
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(
    /// A commit in the history, identified by the backend
    Revision
);
opaque_id!(
    /// A tree object, identified by the backend
    TreeId
);
opaque_id!(
    /// Content address of a file's bytes
    ContentHash
);

/// One commit as read from the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Parent revisions in order; a linear history has at most one
    pub parents: Vec<Revision>,
    /// Root tree of the commit
    pub tree: TreeId,
    /// Who wrote the change
    pub author: Author,
    /// Who recorded the change
    pub committer: Author,
    /// Raw commit message
    pub message: String,
}

/// A file in a tree snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeEntry {
    /// Content address of the file bytes
    pub content_hash: ContentHash,
    /// Whether the executable bit is set
    pub executable: bool,
}

impl TreeEntry {
    /// Create a tree entry
    pub fn new(content_hash: ContentHash, executable: bool) -> Self {
        Self {
            content_hash,
            executable,
        }
    }
}

/// Every file of one revision, keyed by forward-slash path
pub type TreeSnapshot = BTreeMap<String, TreeEntry>;

/// Working-index mutation requested by the applier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexUpdate<'a> {
    /// Stage the current on-disk content of the path
    Add(&'a str),
    /// Drop the path from the index
    Remove(&'a str),
}

/// Counts of each record kind written or applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStats {
    /// Files created
    pub created: usize,
    /// Files deleted
    pub deleted: usize,
    /// Files replaced wholesale
    pub replaced: usize,
    /// Files patched
    pub patched: usize,
}

impl RecordStats {
    /// Count one record of `kind`
    pub fn count(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::Create => self.created += 1,
            RecordKind::Delete => self.deleted += 1,
            RecordKind::Replace => self.replaced += 1,
            RecordKind::Patch => self.patched += 1,
        }
    }

    /// Total number of records
    pub fn total(&self) -> usize {
        self.created + self.deleted + self.replaced + self.patched
    }
}

/// Result of a finished extraction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractSummary {
    /// Number of commit documents written
    pub documents: usize,
    /// Number of distinct blobs written under `data/`
    pub blobs: usize,
    /// Records written, by kind
    pub records: RecordStats,
}

/// Result of a finished rebuild
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildSummary {
    /// Number of commits created
    pub commits: usize,
    /// Tip of the rebuilt branch
    pub head: Revision,
    /// Records applied, by kind
    pub records: RecordStats,
}
