//! Choosing how each changed path is encoded
//!
//! | old            | new                 | record                          |
//! |----------------|---------------------|---------------------------------|
//! | any            | absent              | delete                          |
//! | absent         | UTF-8 text          | create, inline text             |
//! | absent         | not UTF-8           | create, blob reference          |
//! | present        | not UTF-8           | replace, blob reference         |
//! | not UTF-8      | UTF-8 text          | replace, inline text            |
//! | same bytes     | UTF-8 text          | replace, inline text (mode only)|
//! | UTF-8 text     | UTF-8 text          | patch, unified diff hunks       |
//!
//! Decodability as UTF-8 is the only text/binary test. The executable flag is
//! attached to any non-delete record whose flag differs from the old entry.

use crate::backend::HistoryReader;
use crate::blob_store::BlobStore;
use crate::diff::EntryChange;
use crate::document::{Content, DiffRecord};
use crate::error::Result;
use crate::types::{ContentHash, TreeEntry};
use tracing::trace;

/// Turns tree changes into document records, storing binary payloads
pub struct Classifier<'a, R: HistoryReader + ?Sized> {
    reader: &'a R,
    blobs: &'a mut BlobStore,
}

impl<'a, R: HistoryReader + ?Sized> Classifier<'a, R> {
    /// Classify against `reader`, writing binaries into `blobs`
    pub fn new(reader: &'a R, blobs: &'a mut BlobStore) -> Self {
        Self { reader, blobs }
    }

    /// Build the record for one changed path
    pub fn classify(&mut self, change: &EntryChange) -> Result<DiffRecord> {
        let path = change.path.clone();
        let executable = change.executable_change();

        let Some(new) = &change.new else {
            return Ok(DiffRecord::Delete { path });
        };

        let Some(old) = &change.old else {
            let content = self.full_content(&path, new)?;
            trace!("create {}", path);
            return Ok(DiffRecord::Create {
                path,
                content,
                executable,
            });
        };

        let text = match String::from_utf8(self.reader.read_blob(&new.content_hash)?) {
            Ok(text) => text,
            Err(err) => {
                let data = self.blobs.store(&path, &new.content_hash, err.as_bytes())?;
                trace!("replace {} with blob {}", path, data);
                return Ok(DiffRecord::Replace {
                    path,
                    content: Content::Blob(data),
                    executable,
                });
            }
        };

        if change.is_mode_only() || !self.is_text(&old.content_hash)? {
            trace!("replace {} with text", path);
            return Ok(DiffRecord::Replace {
                path,
                content: Content::Text(text),
                executable,
            });
        }

        let diff = self.reader.unified_diff(&old.content_hash, &new.content_hash)?;
        trace!("patch {}", path);
        Ok(DiffRecord::Patch {
            path,
            diff: strip_diff_header(&diff),
            executable,
        })
    }

    fn full_content(&mut self, path: &str, entry: &TreeEntry) -> Result<Content> {
        match String::from_utf8(self.reader.read_blob(&entry.content_hash)?) {
            Ok(text) => Ok(Content::Text(text)),
            Err(err) => Ok(Content::Blob(self.blobs.store(path, &entry.content_hash, err.as_bytes())?)),
        }
    }

    fn is_text(&self, hash: &ContentHash) -> Result<bool> {
        Ok(std::str::from_utf8(&self.reader.read_blob(hash)?).is_ok())
    }
}

/// Drop everything up to and including the `+++` file header line
///
/// Input without such a line is returned unchanged.
pub fn strip_diff_header(diff: &str) -> String {
    let mut offset = 0;
    for line in diff.split_inclusive('\n') {
        offset += line.len();
        if line.starts_with("+++") {
            return diff[offset..].to_string();
        }
    }
    diff.to_string()
}
