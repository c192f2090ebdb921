//! libgit2 binding of the history traits
//!
//! Commit identities are taken from the raw commit header rather than
//! libgit2's parsed signature, so the original `Name <email> secs +HHMM` text
//! is what gets decoded.

use crate::author::Author;
use crate::backend::{HistoryReader, HistoryWriter};
use crate::error::{PatchtrailError, Result};
use crate::types::{Commit, ContentHash, IndexUpdate, Revision, TreeEntry, TreeId, TreeSnapshot};
use git2::{
    DiffOptions, ObjectType, Oid, Patch, Repository, Signature, Sort, Time, TreeWalkMode,
    TreeWalkResult,
};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Tree entry mode of a symbolic link
const SYMLINK_MODE: i32 = 0o120000;

/// Repository accessed through libgit2
pub struct GitBackend {
    repo: Repository,
    workdir: Option<PathBuf>,
}

impl fmt::Debug for GitBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitBackend")
            .field("path", &self.repo.path())
            .field("workdir", &self.workdir)
            .finish()
    }
}

impl GitBackend {
    /// Open an existing repository (bare or with a working tree)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::open(path.as_ref())?;
        Ok(Self::wrap(repo))
    }

    /// Create a new repository with a working tree at `path`
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::init(path.as_ref())?;
        debug!("Initialized repository at {:?}", path.as_ref());
        Ok(Self::wrap(repo))
    }

    fn wrap(repo: Repository) -> Self {
        let workdir = repo.workdir().map(Path::to_path_buf);
        Self { repo, workdir }
    }

    /// Underlying libgit2 repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }
}

fn oid(id: &str) -> Result<Oid> {
    Ok(Oid::from_str(id)?)
}

fn header_field<'h>(header: &'h str, name: &str) -> Option<&'h str> {
    header.lines().find_map(|line| {
        line.strip_prefix(name)
            .and_then(|rest| rest.strip_prefix(' '))
    })
}

fn signature(author: &Author) -> Result<Signature<'static>> {
    let time = Time::new(author.unix_seconds(), author.offset_minutes());
    Signature::new(&author.name, &author.email, &time).map_err(|e| {
        PatchtrailError::malformed_author(format!("{}: {}", author, e.message()))
    })
}

impl HistoryReader for GitBackend {
    fn resolve_ref(&self, name: &str) -> Result<Revision> {
        let commit = self
            .repo
            .revparse_single(name)
            .and_then(|object| object.peel_to_commit())
            .map_err(|_| PatchtrailError::RefNotFound(name.to_string()))?;
        Ok(Revision::new(commit.id().to_string()))
    }

    fn list_revisions(&self, tip: &Revision) -> Result<Vec<Revision>> {
        let mut walk = self.repo.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        walk.push(oid(tip.as_str())?)?;
        walk.map(|id| {
            id.map(|id| Revision::new(id.to_string()))
                .map_err(PatchtrailError::from)
        })
        .collect()
    }

    fn read_commit(&self, revision: &Revision) -> Result<Commit> {
        let commit = self.repo.find_commit(oid(revision.as_str())?)?;
        let header = commit.raw_header().ok_or_else(|| {
            PatchtrailError::internal(format!("commit {} header is not UTF-8", revision))
        })?;

        let identity = |field: &'static str| -> Result<Author> {
            let line = header_field(header, field).ok_or_else(|| PatchtrailError::MissingAuthor {
                field,
                context: revision.to_string(),
            })?;
            Author::parse_line(line)
        };
        let author = identity("author")?;
        let committer = identity("committer")?;

        let message = String::from_utf8(commit.message_raw_bytes().to_vec()).map_err(|_| {
            PatchtrailError::internal(format!("commit {} message is not UTF-8", revision))
        })?;

        Ok(Commit {
            parents: commit
                .parent_ids()
                .map(|id| Revision::new(id.to_string()))
                .collect(),
            tree: TreeId::new(commit.tree_id().to_string()),
            author,
            committer,
            message,
        })
    }

    fn read_tree(&self, tree: &TreeId) -> Result<TreeSnapshot> {
        let tree = self.repo.find_tree(oid(tree.as_str())?)?;
        let mut snapshot = TreeSnapshot::new();
        let mut skipped = 0usize;

        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                match entry.name() {
                    Some(name) => {
                        if entry.filemode() == SYMLINK_MODE {
                            warn!("{}{} is a symbolic link, it will be rebuilt as a regular file", root, name);
                        }
                        let executable = entry.filemode() & 0o100 != 0;
                        snapshot.insert(
                            format!("{}{}", root, name),
                            TreeEntry::new(ContentHash::new(entry.id().to_string()), executable),
                        );
                    }
                    None => skipped += 1,
                }
            }
            TreeWalkResult::Ok
        })?;

        if skipped > 0 {
            warn!("Skipped {} entries with non-UTF-8 names in tree {}", skipped, tree.id());
        }
        Ok(snapshot)
    }

    fn read_blob(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        Ok(self.repo.find_blob(oid(hash.as_str())?)?.content().to_vec())
    }

    fn unified_diff(&self, old: &ContentHash, new: &ContentHash) -> Result<String> {
        let old_blob = self.repo.find_blob(oid(old.as_str())?)?;
        let new_blob = self.repo.find_blob(oid(new.as_str())?)?;

        let mut options = DiffOptions::new();
        options.force_text(true);
        let mut patch = Patch::from_blobs(
            &old_blob,
            Some(Path::new("old")),
            &new_blob,
            Some(Path::new("new")),
            Some(&mut options),
        )?;
        let buf = patch.to_buf()?;

        String::from_utf8(buf.to_vec())
            .map_err(|_| PatchtrailError::internal(format!("diff {}..{} is not UTF-8", old, new)))
    }
}

impl HistoryWriter for GitBackend {
    fn workdir(&self) -> &Path {
        self.workdir
            .as_deref()
            .unwrap_or_else(|| self.repo.path())
    }

    fn update_index(&mut self, update: IndexUpdate<'_>) -> Result<()> {
        let mut index = self.repo.index()?;
        match update {
            IndexUpdate::Add(path) => index.add_path(Path::new(path))?,
            IndexUpdate::Remove(path) => index.remove_path(Path::new(path))?,
        }
        index.write()?;
        Ok(())
    }

    fn write_tree(&mut self) -> Result<TreeId> {
        let mut index = self.repo.index()?;
        Ok(TreeId::new(index.write_tree()?.to_string()))
    }

    fn create_commit(
        &mut self,
        tree: &TreeId,
        parent: Option<&Revision>,
        author: &Author,
        committer: &Author,
        message: &str,
    ) -> Result<Revision> {
        let tree = self.repo.find_tree(oid(tree.as_str())?)?;
        let parents = parent
            .map(|p| self.repo.find_commit(oid(p.as_str())?).map_err(PatchtrailError::from))
            .transpose()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let id = self
            .repo
            .commit(None, &signature(author)?, &signature(committer)?, message, &tree, &parent_refs)
            .map_err(|e| PatchtrailError::CommitFailed(e.message().to_string()))?;
        Ok(Revision::new(id.to_string()))
    }

    fn update_branch(&mut self, name: &str, commit: &Revision) -> Result<()> {
        let refname = format!("refs/heads/{}", name);
        self.repo
            .reference(&refname, oid(commit.as_str())?, true, "patchtrail: rebuild")?;
        self.repo.set_head(&refname)?;
        debug!("Pointed {} at {}", refname, commit);
        Ok(())
    }
}
