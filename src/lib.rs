//! # Patchtrail - linear histories as diff documents
//!
//! Converts the history of one branch into an archive of per-commit diff
//! documents, and rebuilds an equivalent history from such an archive.
//!
//! ## Overview
//!
//! Extraction walks the branch oldest first. For every revision the tree is
//! compared with its parent's and each changed path becomes one record:
//!
//! - **create**: the path is new; the full content is stored inline when it
//!   is UTF-8 text, otherwise as a reference into `data/`
//! - **patch**: text changed to text; the unified diff hunks are stored
//! - **replace**: either side is binary, or only the executable bit changed;
//!   the full new content is stored
//! - **delete**: the path is gone
//!
//! Binary payloads are deduplicated by content within one run, so a file
//! copied to several paths is written to `data/` once.
//!
//! Rebuild replays the documents in order against an empty repository,
//! applying patches with the system `patch` program (or the in-process
//! applier) and committing each document with its original author, committer
//! and message, timezone offsets included.
//!
//! ## Archive Layout
//!
//! ```text
//! archive/
//! ├── commit/
//! │   ├── 1.json
//! │   ├── 2.json
//! │   └── ...
//! └── data/
//!     └── assets/logo.v1.png
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use patchtrail::{extract_repository, rebuild_repository, ExtractOptions, RebuildOptions};
//!
//! # fn main() -> patchtrail::Result<()> {
//! let extracted = extract_repository("project", "project-archive", ExtractOptions::new())?;
//! println!("{} documents, {} blobs", extracted.documents, extracted.blobs);
//!
//! let rebuilt = rebuild_repository("project-archive", "project-copy", &RebuildOptions::new())?;
//! println!("master is at {}", rebuilt.head);
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! The pipelines only talk to the [`backend::HistoryReader`] and
//! [`backend::HistoryWriter`] traits. [`git::GitBackend`] implements both on
//! top of libgit2.
//!
//! ## Module Organization
//!
//! - [`author`]: identity and timestamp codec
//! - [`archive`]: archive layout and document files
//! - [`blob_store`]: deduplicated binary payloads
//! - [`diff`] and [`classify`]: per-path change detection and encoding
//! - [`extract`]: history to archive
//! - [`apply`], [`patch`] and [`commit`]: archive to history
//! - [`verify`]: comparing two histories
//! - [`error`]: error types and handling

// Public API modules
pub mod apply;
pub mod archive;
pub mod author;
pub mod backend;
pub mod blob_store;
pub mod classify;
pub mod commit;
pub mod config;
pub mod diff;
pub mod document;
pub mod error;
pub mod extract;
pub mod git;
pub mod patch;
pub mod types;
pub mod utils;
pub mod verify;

// Re-export main types for convenience
pub use apply::{rebuild_repository, rebuild_repository_with_progress, Applier, ApplyState};
pub use archive::Archive;
pub use author::Author;
pub use config::{ExtractOptions, PatchToolKind, RebuildOptions, DEFAULT_BRANCH};
pub use document::{CommitDocument, Content, DiffRecord, RecordKind};
pub use error::{PatchtrailError, Result};
pub use extract::{extract_repository, extract_repository_with_progress, Extractor};
pub use git::GitBackend;
pub use types::*;
pub use verify::{compare_histories, Mismatch, VerificationReport};
