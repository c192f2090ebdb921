//! Encoding a history into an archive
//!
//! Revisions are processed one at a time, oldest first. Each one is compared
//! with its single parent, every changed path is classified, and the records
//! are written in path order as document `N` (1-based). Binary payloads go
//! through one [`BlobStore`] shared by the whole run so identical content is
//! written once.

use crate::archive::Archive;
use crate::backend::HistoryReader;
use crate::blob_store::BlobStore;
use crate::classify::Classifier;
use crate::config::ExtractOptions;
use crate::diff::diff_trees;
use crate::document::CommitDocument;
use crate::error::{PatchtrailError, Result};
use crate::git::GitBackend;
use crate::types::{ExtractSummary, Revision, TreeSnapshot};
use crate::utils::prepare_output_dir;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Callback receiving `(documents done, documents total)`
pub type ProgressFn<'a> = Box<dyn Fn(usize, usize) + 'a>;

/// Writes the history of one branch into an archive
pub struct Extractor<'a, R: HistoryReader + ?Sized> {
    reader: &'a R,
    archive: Archive,
    options: ExtractOptions,
    progress: Option<ProgressFn<'a>>,
}

impl<'a, R: HistoryReader + ?Sized> Extractor<'a, R> {
    /// Extract from `reader` into `archive`
    pub fn new(reader: &'a R, archive: Archive, options: ExtractOptions) -> Self {
        Self {
            reader,
            archive,
            options,
            progress: None,
        }
    }

    /// Report progress after each document
    pub fn with_progress(mut self, progress: impl Fn(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Archive every revision of the configured branch
    pub fn run(&self) -> Result<ExtractSummary> {
        let start = Instant::now();
        let tip = self.reader.resolve_ref(&self.options.branch)?;
        let revisions = self.reader.list_revisions(&tip)?;
        prepare_output_dir(self.archive.root(), self.options.force)?;
        info!(
            "Extracting {} revisions of {} into {:?}",
            revisions.len(),
            self.options.branch,
            self.archive.root()
        );

        let mut blobs = BlobStore::new(self.archive.data_dir());
        let mut summary = ExtractSummary::default();

        for (index, revision) in revisions.iter().enumerate() {
            let sequence = index as u64 + 1;
            let document = self.encode_revision(revision, &mut blobs)?;
            document
                .records
                .iter()
                .for_each(|record| summary.records.count(record.kind()));
            let path = self.archive.write_document(sequence, &document)?;
            debug!("Wrote {} as {:?} ({} records)", revision, path, document.records.len());

            summary.documents += 1;
            if let Some(progress) = &self.progress {
                progress(summary.documents, revisions.len());
            }
        }

        summary.blobs = blobs.len();
        info!(
            "Extracted {} documents and {} blobs in {:?}",
            summary.documents,
            summary.blobs,
            start.elapsed()
        );
        Ok(summary)
    }

    /// Build the document for one revision
    pub fn encode_revision(&self, revision: &Revision, blobs: &mut BlobStore) -> Result<CommitDocument> {
        let commit = self.reader.read_commit(revision)?;

        let parent_tree = match commit.parents.as_slice() {
            [] => TreeSnapshot::new(),
            [parent] => {
                let parent = self.reader.read_commit(parent)?;
                self.reader.read_tree(&parent.tree)?
            }
            parents => {
                return Err(PatchtrailError::MergeUnsupported {
                    revision: revision.to_string(),
                    parents: parents.len(),
                });
            }
        };
        let tree = self.reader.read_tree(&commit.tree)?;

        let mut classifier = Classifier::new(self.reader, blobs);
        let records = diff_trees(&parent_tree, &tree)
            .iter()
            .map(|change| classifier.classify(change))
            .collect::<Result<Vec<_>>>()?;

        Ok(CommitDocument {
            author: commit.author,
            committer: commit.committer,
            message: commit.message,
            records,
        })
    }
}

/// Open the repository at `repo` and archive it into `outdir`
pub fn extract_repository(
    repo: impl AsRef<Path>,
    outdir: impl AsRef<Path>,
    options: ExtractOptions,
) -> Result<ExtractSummary> {
    extract_repository_with_progress(repo, outdir, options, |_, _| {})
}

/// [`extract_repository`], reporting `(documents written, total)` as it goes
pub fn extract_repository_with_progress(
    repo: impl AsRef<Path>,
    outdir: impl AsRef<Path>,
    options: ExtractOptions,
    progress: impl Fn(usize, usize),
) -> Result<ExtractSummary> {
    let backend = GitBackend::open(repo)?;
    let extractor = Extractor::new(&backend, Archive::new(outdir.as_ref()), options).with_progress(progress);
    extractor.run()
}
