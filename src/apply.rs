//! Replaying an archive into a repository
//!
//! Documents are applied strictly in ascending sequence order. Each one
//! mutates the working tree and index, then the index is committed on top of
//! the commit produced by the previous document. The previous commit is
//! threaded through the run as [`ApplyState`]; once every document is applied
//! the branch is pointed at the final commit.
//!
//! ```text
//! Empty --doc 1--> HasCommit(c1) --doc 2--> HasCommit(c2) ... --> update branch
//! ```

use crate::archive::Archive;
use crate::backend::HistoryWriter;
use crate::commit::commit_index;
use crate::config::RebuildOptions;
use crate::document::{CommitDocument, Content, DiffRecord, RecordKind};
use crate::error::{PatchtrailError, Result};
use crate::extract::ProgressFn;
use crate::git::GitBackend;
use crate::patch::PatchTool;
use crate::types::{IndexUpdate, RebuildSummary, RecordStats, Revision};
use crate::utils::{ensure_parent_dir, join_relative, prepare_output_dir, prune_empty_parents, set_executable};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, trace};

/// Position of a rebuild between documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyState {
    /// No commit created yet
    Empty,
    /// Last commit created
    HasCommit(Revision),
}

impl ApplyState {
    /// Parent for the next commit
    pub fn parent(&self) -> Option<&Revision> {
        match self {
            ApplyState::Empty => None,
            ApplyState::HasCommit(revision) => Some(revision),
        }
    }
}

/// Applies archive documents to a working tree and commits the results
pub struct Applier<'a, W: HistoryWriter + ?Sized> {
    writer: &'a mut W,
    archive: &'a Archive,
    patch_tool: &'a dyn PatchTool,
    stats: RecordStats,
    progress: Option<ProgressFn<'a>>,
}

impl<'a, W: HistoryWriter + ?Sized> Applier<'a, W> {
    /// Apply documents from `archive` through `writer`
    pub fn new(writer: &'a mut W, archive: &'a Archive, patch_tool: &'a dyn PatchTool) -> Self {
        Self {
            writer,
            archive,
            patch_tool,
            stats: RecordStats::default(),
            progress: None,
        }
    }

    /// Report progress after each document
    pub fn with_progress(mut self, progress: impl Fn(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Records applied so far
    pub fn stats(&self) -> RecordStats {
        self.stats
    }

    /// Replay every document and point `branch` at the last commit
    pub fn run(mut self, branch: &str) -> Result<RebuildSummary> {
        let start = Instant::now();
        let archive = self.archive;
        let documents = archive.list_documents()?;
        info!("Rebuilding {} documents from {:?}", documents.len(), archive.root());

        let total = documents.len();
        let state = documents
            .iter()
            .enumerate()
            .try_fold(ApplyState::Empty, |state, (index, (sequence, path))| {
                let document = archive.read_document(path)?;
                debug!("Applying document {} ({} records)", sequence, document.records.len());
                let next = self.apply_document(state, &document, path)?;
                if let Some(progress) = &self.progress {
                    progress(index + 1, total);
                }
                Ok::<_, PatchtrailError>(next)
            })?;

        let head = match state {
            ApplyState::Empty => return Err(PatchtrailError::NoCommits(archive.root().to_path_buf())),
            ApplyState::HasCommit(head) => head,
        };
        self.writer.update_branch(branch, &head)?;
        info!("Rebuilt {} commits in {:?}, {} is at {}", total, start.elapsed(), branch, head);

        Ok(RebuildSummary {
            commits: total,
            head,
            records: self.stats,
        })
    }

    /// Apply one document and commit it on top of `state`
    pub fn apply_document(
        &mut self,
        state: ApplyState,
        document: &CommitDocument,
        source: &Path,
    ) -> Result<ApplyState> {
        // Deletes go first so a directory can give way to a file of the same name
        let (deletes, writes): (Vec<&DiffRecord>, Vec<&DiffRecord>) = document
            .records
            .iter()
            .partition(|record| record.kind() == RecordKind::Delete);
        for record in deletes.into_iter().chain(writes) {
            self.apply_record(record, source)?;
        }
        let commit = commit_index(&mut *self.writer, state.parent(), document)?;
        Ok(ApplyState::HasCommit(commit))
    }

    /// Mutate the working tree and index for one record
    pub fn apply_record(&mut self, record: &DiffRecord, source: &Path) -> Result<()> {
        let workdir = self.writer.workdir().to_path_buf();
        let path = record.path();
        let target = join_relative(&workdir, path);
        trace!("{} {}", record.kind(), path);

        match record {
            DiffRecord::Delete { .. } => {
                fs::remove_file(&target)?;
                prune_empty_parents(&target, &workdir)?;
                self.writer.update_index(IndexUpdate::Remove(path))?;
                self.stats.count(record.kind());
                return Ok(());
            }
            DiffRecord::Create { content, .. } => {
                ensure_parent_dir(&target)?;
                self.write_content(&target, content, source, record)?;
            }
            DiffRecord::Replace { content, .. } => {
                self.write_content(&target, content, source, record)?;
            }
            DiffRecord::Patch { diff, .. } => {
                self.patch_tool.apply(&target, diff)?;
            }
        }

        if let Some(executable) = record.executable() {
            set_executable(&target, executable)?;
        }
        self.writer.update_index(IndexUpdate::Add(path))?;
        self.stats.count(record.kind());
        Ok(())
    }

    fn write_content(&self, target: &Path, content: &Content, source: &Path, record: &DiffRecord) -> Result<()> {
        match content {
            Content::Text(text) => fs::write(target, text)?,
            Content::Blob(relative) => {
                let blob = self.archive.blob_path(relative);
                let bytes = fs::read(&blob).map_err(|err| {
                    if err.kind() == std::io::ErrorKind::NotFound {
                        PatchtrailError::InvalidRecord {
                            document: source.to_path_buf(),
                            kind: record.kind().to_string(),
                            path: Some(record.path().to_string()),
                            reason: "referenced data file is missing",
                        }
                    } else {
                        err.into()
                    }
                })?;
                // copy bytes only; the target keeps its own permission bits
                fs::write(target, bytes)?;
            }
        }
        Ok(())
    }
}

/// Rebuild the archive at `indir` into a new repository at `repo`
pub fn rebuild_repository(
    indir: impl AsRef<Path>,
    repo: impl AsRef<Path>,
    options: &RebuildOptions,
) -> Result<RebuildSummary> {
    rebuild_repository_with_progress(indir, repo, options, |_, _| {})
}

/// [`rebuild_repository`], reporting `(documents applied, total)` as it goes
pub fn rebuild_repository_with_progress(
    indir: impl AsRef<Path>,
    repo: impl AsRef<Path>,
    options: &RebuildOptions,
    progress: impl Fn(usize, usize),
) -> Result<RebuildSummary> {
    let archive = Archive::new(PathBuf::from(indir.as_ref()));
    if archive.list_documents()?.is_empty() {
        return Err(PatchtrailError::NoCommits(archive.root().to_path_buf()));
    }

    prepare_output_dir(repo.as_ref(), options.force)?;
    let mut backend = GitBackend::init(repo)?;
    let patch_tool = options.make_patch_tool();
    Applier::new(&mut backend, &archive, patch_tool.as_ref())
        .with_progress(progress)
        .run(&options.branch)
}
