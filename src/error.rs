//! Error types for patchtrail
//!
//! Every failure in an extract or rebuild run is fatal, so each variant names
//! one concrete condition that stopped the run. The CLI prints the
//! [`PatchtrailError::user_message`] and exits.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the patchtrail library
pub type Result<T> = std::result::Result<T, PatchtrailError>;

/// Main error type for all patchtrail operations
#[derive(Debug, Error)]
pub enum PatchtrailError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors reported by libgit2
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error")]
    WalkDir(#[from] walkdir::Error),

    /// A ref or revision the backend could not resolve
    #[error("Could not find ref: {0}")]
    RefNotFound(String),

    /// A revision with more than one parent
    #[error("Cannot handle merges, history must be linear: {revision} has {parents} parents")]
    MergeUnsupported {
        /// Offending revision
        revision: String,
        /// Number of parents it has
        parents: usize,
    },

    /// Identity or timestamp text that could not be parsed
    #[error("Malformed author: {0}")]
    MalformedAuthor(String),

    /// Commit object lacking an author/committer header
    #[error("Missing {field} in {context}")]
    MissingAuthor {
        /// Which header was absent ("author" or "committer")
        field: &'static str,
        /// Revision or document being read
        context: String,
    },

    /// Document without a message
    #[error("Missing commit message in {0:?}")]
    MissingMessage(PathBuf),

    /// Diff record whose payload does not fit its kind
    #[error("Invalid {kind} record for {path:?} in {document:?}: {reason}")]
    InvalidRecord {
        /// Document holding the record
        document: PathBuf,
        /// Record kind as written in the document
        kind: String,
        /// Path named by the record, if any
        path: Option<String>,
        /// What is wrong with it
        reason: &'static str,
    },

    /// External patch program exited unsuccessfully
    #[error("Patch failed for {path:?}: {status}")]
    PatchToolFailed {
        /// File the patch was applied to
        path: PathBuf,
        /// Exit status description
        status: String,
    },

    /// In-process patch application found content that does not match a hunk
    #[error("Patch failed for {path:?}: hunk at line {line} does not match")]
    HunkMismatch {
        /// File the patch was applied to
        path: PathBuf,
        /// 1-based line in the original file where the hunk starts
        line: usize,
    },

    /// Unparseable unified diff body
    #[error("Malformed patch: {0}")]
    MalformedPatch(String),

    /// Backend failed to create a commit object
    #[error("Failed to commit: {0}")]
    CommitFailed(String),

    /// Rebuild found no documents in the archive
    #[error("No commits found in archive {0:?}")]
    NoCommits(PathBuf),

    /// Output location already holds data
    #[error("Target is not empty: {0:?}")]
    TargetNotEmpty(PathBuf),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PatchtrailError {
    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        PatchtrailError::Internal(msg.into())
    }

    /// Create a malformed-author error with a custom message
    pub fn malformed_author(msg: impl Into<String>) -> Self {
        PatchtrailError::MalformedAuthor(msg.into())
    }

    /// Check if this error points at a damaged or hand-edited archive
    pub fn is_archive_defect(&self) -> bool {
        matches!(
            self,
            PatchtrailError::MissingMessage(_)
                | PatchtrailError::MissingAuthor { .. }
                | PatchtrailError::InvalidRecord { .. }
                | PatchtrailError::MalformedPatch(_)
                | PatchtrailError::HunkMismatch { .. }
                | PatchtrailError::Json(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            PatchtrailError::RefNotFound(name) => {
                format!("Could not find ref '{}'. Pass the branch to export with --branch.", name)
            }
            PatchtrailError::MergeUnsupported { revision, .. } => {
                format!(
                    "Revision {} is a merge. Only linear histories can be archived; \
                     linearize the branch first (for example with a rebase).",
                    revision
                )
            }
            PatchtrailError::TargetNotEmpty(path) => {
                format!("{:?} already contains files. Use --force to replace its contents.", path)
            }
            PatchtrailError::NoCommits(path) => {
                format!("No commit documents found under {:?}. Is this an extracted archive?", path.join("commit"))
            }
            _ => self.to_string(),
        }
    }
}
