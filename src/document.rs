//! Per-commit diff documents
//!
//! A document holds one commit's metadata and the ordered list of file
//! records needed to turn the parent's tree into this commit's tree. On disk it
//! is a JSON object:
//!
//! ```json
//! {
//!   "author": { "name": "A U Thor", "email": "a@example.com", "date": "2013-05-08T12:04:38-07:00" },
//!   "committer": { "name": "A U Thor", "email": "a@example.com", "date": "2013-05-08T12:04:38-07:00" },
//!   "message": "Add logo\n",
//!   "changes": [
//!     { "kind": "create", "path": "img.png", "data": "img.v1.png" },
//!     { "kind": "patch", "path": "README", "text": "@@ -1 +1 @@\n-hello\n+hello world\n" },
//!     { "kind": "replace", "path": "run.sh", "executable": true, "text": "#!/bin/sh\n" },
//!     { "kind": "delete", "path": "old.txt" }
//!   ]
//! }
//! ```
//!
//! Reading goes through a loose serde form first and is then validated into
//! [`DiffRecord`], so a malformed archive fails with a specific error instead
//! of a generic parse message.

use crate::author::Author;
use crate::error::{PatchtrailError, Result};
use crate::utils::is_contained_relative;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The four record kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// New file
    Create,
    /// Removed file
    Delete,
    /// File rewritten in full
    Replace,
    /// Text file changed by a unified diff
    Patch,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Create => "create",
            RecordKind::Delete => "delete",
            RecordKind::Replace => "replace",
            RecordKind::Patch => "patch",
        })
    }
}

/// Full file content carried by a create or replace record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// UTF-8 text stored inline
    Text(String),
    /// Binary payload stored under `data/` at this relative path
    Blob(String),
}

/// One file-level change inside a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffRecord {
    /// File appears
    Create {
        /// Forward-slash path
        path: String,
        /// Full content
        content: Content,
        /// New executable flag, when it differs from non-executable
        executable: Option<bool>,
    },
    /// File disappears
    Delete {
        /// Forward-slash path
        path: String,
    },
    /// File content replaced in full
    Replace {
        /// Forward-slash path
        path: String,
        /// Full content
        content: Content,
        /// New executable flag, when it changed
        executable: Option<bool>,
    },
    /// Text file changed by a unified diff body (hunks only, no file header)
    Patch {
        /// Forward-slash path
        path: String,
        /// Hunk lines
        diff: String,
        /// New executable flag, when it changed
        executable: Option<bool>,
    },
}

impl DiffRecord {
    /// Path the record applies to
    pub fn path(&self) -> &str {
        match self {
            DiffRecord::Create { path, .. }
            | DiffRecord::Delete { path }
            | DiffRecord::Replace { path, .. }
            | DiffRecord::Patch { path, .. } => path,
        }
    }

    /// Kind tag of the record
    pub fn kind(&self) -> RecordKind {
        match self {
            DiffRecord::Create { .. } => RecordKind::Create,
            DiffRecord::Delete { .. } => RecordKind::Delete,
            DiffRecord::Replace { .. } => RecordKind::Replace,
            DiffRecord::Patch { .. } => RecordKind::Patch,
        }
    }

    /// Executable flag change carried by the record
    pub fn executable(&self) -> Option<bool> {
        match self {
            DiffRecord::Create { executable, .. }
            | DiffRecord::Replace { executable, .. }
            | DiffRecord::Patch { executable, .. } => *executable,
            DiffRecord::Delete { .. } => None,
        }
    }
}

/// Everything needed to replay one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDocument {
    /// Commit author
    pub author: Author,
    /// Commit committer
    pub committer: Author,
    /// Raw commit message
    pub message: String,
    /// File records in path order
    pub records: Vec<DiffRecord>,
}

impl CommitDocument {
    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        let raw = RawDocument {
            author: Some(RawAuthor::from(&self.author)),
            committer: Some(RawAuthor::from(&self.committer)),
            message: Some(self.message.clone()),
            changes: self.records.iter().map(RawRecord::from).collect(),
        };
        let mut json = serde_json::to_string_pretty(&raw)?;
        json.push('\n');
        Ok(json)
    }

    /// Parse and validate a document read from `source`
    pub fn from_json(text: &str, source: &Path) -> Result<Self> {
        let raw: RawDocument = serde_json::from_str(text)?;

        let author = raw
            .author
            .ok_or_else(|| PatchtrailError::MissingAuthor {
                field: "author",
                context: source.display().to_string(),
            })?
            .into_author()?;
        let committer = match raw.committer {
            Some(committer) => committer.into_author()?,
            None => author.clone(),
        };
        let message = raw
            .message
            .ok_or_else(|| PatchtrailError::MissingMessage(source.to_path_buf()))?;
        let records = raw
            .changes
            .into_iter()
            .map(|record| record.validate(source))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            author,
            committer,
            message,
            records,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawDocument {
    author: Option<RawAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    committer: Option<RawAuthor>,
    message: Option<String>,
    #[serde(default)]
    changes: Vec<RawRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawAuthor {
    name: String,
    email: String,
    date: String,
}

impl From<&Author> for RawAuthor {
    fn from(author: &Author) -> Self {
        Self {
            name: author.name.clone(),
            email: author.email.clone(),
            date: author.iso_date(),
        }
    }
}

impl RawAuthor {
    fn into_author(self) -> Result<Author> {
        Author::from_iso(self.name, self.email, &self.date)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawRecord {
    kind: RecordKind,
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    executable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

impl From<&DiffRecord> for RawRecord {
    fn from(record: &DiffRecord) -> Self {
        let (text, data) = match record {
            DiffRecord::Create { content, .. } | DiffRecord::Replace { content, .. } => match content {
                Content::Text(text) => (Some(text.clone()), None),
                Content::Blob(data) => (None, Some(data.clone())),
            },
            DiffRecord::Patch { diff, .. } => (Some(diff.clone()), None),
            DiffRecord::Delete { .. } => (None, None),
        };
        Self {
            kind: record.kind(),
            path: Some(record.path().to_string()),
            executable: record.executable(),
            text,
            data,
        }
    }
}

impl RawRecord {
    fn validate(self, source: &Path) -> Result<DiffRecord> {
        let kind = self.kind;
        let invalid = |path: Option<String>, reason: &'static str| PatchtrailError::InvalidRecord {
            document: source.to_path_buf(),
            kind: kind.to_string(),
            path,
            reason,
        };

        let path = self.path.ok_or_else(|| invalid(None, "missing path"))?;
        if !is_contained_relative(&path) {
            return Err(invalid(Some(path), "path leaves the working tree"));
        }
        if matches!(&self.data, Some(data) if !is_contained_relative(data)) {
            return Err(invalid(Some(path), "data path leaves the archive"));
        }
        let executable = self.executable;

        match kind {
            RecordKind::Delete => {
                if self.text.is_some() || self.data.is_some() || executable.is_some() {
                    return Err(invalid(Some(path), "delete records carry no content"));
                }
                Ok(DiffRecord::Delete { path })
            }
            RecordKind::Create | RecordKind::Replace => {
                let content = match (self.text, self.data) {
                    (Some(text), None) => Content::Text(text),
                    (None, Some(data)) => Content::Blob(data),
                    (Some(_), Some(_)) => return Err(invalid(Some(path), "both inline text and data")),
                    (None, None) => return Err(invalid(Some(path), "neither inline text nor data")),
                };
                Ok(if kind == RecordKind::Create {
                    DiffRecord::Create { path, content, executable }
                } else {
                    DiffRecord::Replace { path, content, executable }
                })
            }
            RecordKind::Patch => {
                if self.data.is_some() {
                    return Err(invalid(Some(path), "patch records cannot reference data"));
                }
                let diff = self.text.ok_or_else(|| invalid(Some(path.clone()), "missing diff text"))?;
                Ok(DiffRecord::Patch { path, diff, executable })
            }
        }
    }
}
