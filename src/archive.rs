//! On-disk archive layout
//!
//! ```text
//! archive_root/
//! ├── commit/          # One document per revision
//! │   ├── 1.json
//! │   ├── 2.json
//! │   └── ...
//! └── data/            # Binary payloads referenced by documents
//!     └── <dir>/<stem>.v<k><ext>
//! ```
//!
//! Documents are numbered from 1 in chronological order. When reading, only
//! names of the form `<N>.json` with a canonical decimal `N` count; anything
//! else in `commit/` is ignored.

use crate::document::CommitDocument;
use crate::error::Result;
use crate::utils::{atomic_write, join_relative};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Extension of commit documents
pub const DOCUMENT_EXTENSION: &str = "json";

/// Directory holding commit documents
pub const COMMIT_DIR: &str = "commit";

/// Directory holding blob payloads
pub const DATA_DIR: &str = "data";

/// Handle on an archive directory
#[derive(Debug, Clone)]
pub struct Archive {
    root: PathBuf,
}

impl Archive {
    /// Refer to an archive rooted at `root`; nothing is touched on disk
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Archive root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of commit documents
    pub fn commit_dir(&self) -> PathBuf {
        self.root.join(COMMIT_DIR)
    }

    /// Directory of blob payloads
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    /// Path of document number `sequence`
    pub fn document_path(&self, sequence: u64) -> PathBuf {
        self.commit_dir()
            .join(format!("{}.{}", sequence, DOCUMENT_EXTENSION))
    }

    /// Absolute path of a blob referenced by a document
    pub fn blob_path(&self, relative: &str) -> PathBuf {
        join_relative(&self.data_dir(), relative)
    }

    /// Write document number `sequence`
    pub fn write_document(&self, sequence: u64, document: &CommitDocument) -> Result<PathBuf> {
        let path = self.document_path(sequence);
        fs::create_dir_all(self.commit_dir())?;
        atomic_write(&path, document.to_json()?.as_bytes())?;
        Ok(path)
    }

    /// Read and validate the document at `path`
    pub fn read_document(&self, path: &Path) -> Result<CommitDocument> {
        let text = fs::read_to_string(path)?;
        CommitDocument::from_json(&text, path)
    }

    /// Documents in ascending sequence order
    ///
    /// A missing `commit/` directory yields an empty list.
    pub fn list_documents(&self) -> Result<Vec<(u64, PathBuf)>> {
        let entries = match fs::read_dir(self.commit_dir()) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut documents = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            match name.to_str().and_then(parse_document_name) {
                Some(sequence) => documents.push((sequence, entry.path())),
                None => trace!("Skipping {:?}", name),
            }
        }
        documents.sort();
        Ok(documents)
    }
}

/// Sequence number of a document file name, `None` if it is not one
pub fn parse_document_name(name: &str) -> Option<u64> {
    let (stem, extension) = name.split_once('.')?;
    if extension != DOCUMENT_EXTENSION {
        return None;
    }
    let sequence: u64 = stem.parse().ok()?;
    (sequence.to_string() == stem).then_some(sequence)
}
