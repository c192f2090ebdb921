//! Tree-level change detection
//!
//! Compares two snapshots path by path. A path shows up in the result only
//! when its entry differs between the two sides, either by content hash or by
//! executable flag; untouched files produce nothing.

use crate::types::{TreeEntry, TreeSnapshot};
use std::collections::BTreeSet;

/// How one path differs between a parent snapshot and the current one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChange {
    /// Forward-slash path
    pub path: String,
    /// Entry in the parent snapshot, `None` if absent
    pub old: Option<TreeEntry>,
    /// Entry in the current snapshot, `None` if absent
    pub new: Option<TreeEntry>,
}

impl EntryChange {
    /// New executable flag, when it differs from the old one
    ///
    /// An absent old entry counts as non-executable. Deletions never carry a
    /// flag.
    pub fn executable_change(&self) -> Option<bool> {
        let new = self.new.as_ref()?;
        let old = self.old.as_ref().map(|e| e.executable).unwrap_or(false);
        (new.executable != old).then_some(new.executable)
    }

    /// Whether only the executable flag changed
    pub fn is_mode_only(&self) -> bool {
        match (&self.old, &self.new) {
            (Some(old), Some(new)) => old.content_hash == new.content_hash,
            _ => false,
        }
    }
}

/// Compute the changed paths between `parent` and `current`, in path order
pub fn diff_trees(parent: &TreeSnapshot, current: &TreeSnapshot) -> Vec<EntryChange> {
    let paths: BTreeSet<&String> = parent.keys().chain(current.keys()).collect();

    paths
        .into_iter()
        .filter_map(|path| {
            let old = parent.get(path);
            let new = current.get(path);
            (old != new).then(|| EntryChange {
                path: path.clone(),
                old: old.cloned(),
                new: new.cloned(),
            })
        })
        .collect()
}
