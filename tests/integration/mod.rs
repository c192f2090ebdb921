//! End-to-end tests against real repositories
//!
//! Source histories are built with libgit2 in temporary directories, archived,
//! rebuilt, and compared with the original commit by commit.

use ::patchtrail::*;
use git2::{IndexAddOption, Oid, Repository, RepositoryInitOptions, Signature, Time};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01\xff\xd8";

/// Repository with a working tree and helpers to commit snapshots
pub struct RepoHarness {
    pub dir: TempDir,
    pub repo: Repository,
}

impl RepoHarness {
    /// Create an empty repository whose HEAD points at `master`
    pub fn new() -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let mut options = RepositoryInitOptions::new();
        options.initial_head("master");
        let repo = Repository::init_opts(dir.path(), &options)?;
        Ok(Self { dir, repo })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, path: &str, content: impl AsRef<[u8]>) -> anyhow::Result<()> {
        let full = self.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, content)?;
        Ok(())
    }

    pub fn remove(&self, path: &str) -> anyhow::Result<()> {
        fs::remove_file(self.path().join(path))?;
        Ok(())
    }

    pub fn remove_dir(&self, path: &str) -> anyhow::Result<()> {
        fs::remove_dir_all(self.path().join(path))?;
        Ok(())
    }

    #[cfg(unix)]
    pub fn set_executable(&self, path: &str, executable: bool) -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let mode = if executable { 0o755 } else { 0o644 };
        fs::set_permissions(self.path().join(path), fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    /// Stage the whole working tree and commit it on HEAD
    pub fn commit(&self, message: &str, seconds: i64, offset_minutes: i32) -> anyhow::Result<Oid> {
        let mut index = self.repo.index()?;
        index.update_all(["*"].iter(), None)?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let author = Signature::new("Dietrich Epp", "depp@zdome.net", &Time::new(seconds, offset_minutes))?;
        let committer = Signature::new("Build Bot", "bot@example.com", &Time::new(seconds + 60, 0))?;
        let parent = self.repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        Ok(self
            .repo
            .commit(Some("HEAD"), &author, &committer, message, &tree, &parents)?)
    }

    pub fn head(&self) -> anyhow::Result<Oid> {
        Ok(self.repo.head()?.peel_to_commit()?.id())
    }
}

/// The scenario history: text create, patch, mode toggle, binary swap, binary copy
pub fn scenario_repo() -> anyhow::Result<RepoHarness> {
    let harness = RepoHarness::new()?;

    harness.write("f.txt", "hello\n")?;
    harness.write("src/lib.rs", "pub fn answer() -> u32 {\n    42\n}\n")?;
    harness.commit("Add f.txt\n", 1_368_039_878, -7 * 60)?;

    harness.write("f.txt", "hello world\n")?;
    harness.write("src/lib.rs", "pub fn answer() -> u32 {\n    41 + 1\n}\n")?;
    harness.commit("Extend greeting\n\nWith a body paragraph.\n", 1_368_043_478, -7 * 60)?;

    #[cfg(unix)]
    harness.set_executable("f.txt", true)?;
    harness.write("notes.md", "no trailing newline")?;
    harness.commit("Make f.txt executable\n", 1_368_100_000, 330)?;

    harness.remove("f.txt")?;
    harness.write("assets/img.png", PNG)?;
    harness.commit("Swap text for image\n", 1_368_200_000, 0)?;

    harness.write("assets/copy.png", PNG)?;
    harness.remove("src/lib.rs")?;
    harness.commit("Copy image\n", 1_368_300_000, 60)?;

    Ok(harness)
}

pub fn patch_available() -> bool {
    Command::new("patch").arg("--version").output().is_ok()
}

fn document(archive: &Path, sequence: u64) -> CommitDocument {
    let archive = Archive::new(archive);
    archive.read_document(&archive.document_path(sequence)).unwrap()
}

fn rebuild_with(archive: &Path, kind: PatchToolKind) -> (TempDir, RebuildSummary) {
    let target = TempDir::new().unwrap();
    let summary = rebuild_repository(archive, target.path(), &RebuildOptions::new().patch_tool(kind)).unwrap();
    (target, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_extract_scenarios() {
        let source = scenario_repo().unwrap();
        let out = TempDir::new().unwrap();

        let summary = extract_repository(source.path(), out.path(), ExtractOptions::new()).unwrap();
        assert_eq!(summary.documents, 5);
        assert_eq!(summary.blobs, 1);

        let first = document(out.path(), 1);
        assert_eq!(first.author.iso_date(), "2013-05-08T12:04:38-07:00");
        assert_eq!(first.committer.name, "Build Bot");
        assert_eq!(
            first.records[0],
            DiffRecord::Create {
                path: "f.txt".to_string(),
                content: Content::Text("hello\n".to_string()),
                executable: None,
            }
        );

        let second = document(out.path(), 2);
        assert_eq!(second.message, "Extend greeting\n\nWith a body paragraph.\n");
        match &second.records[0] {
            DiffRecord::Patch { path, diff, executable } => {
                assert_eq!(path, "f.txt");
                assert!(diff.starts_with("@@ "), "{}", diff);
                assert!(diff.contains("-hello\n+hello world\n"), "{}", diff);
                assert_eq!(*executable, None);
            }
            other => panic!("expected a patch, got {:?}", other),
        }

        #[cfg(unix)]
        {
            let third = document(out.path(), 3);
            let toggle = third.records.iter().find(|r| r.path() == "f.txt").unwrap();
            assert_eq!(toggle.kind(), RecordKind::Replace);
            assert_eq!(toggle.executable(), Some(true));
        }

        let fourth = document(out.path(), 4);
        assert!(fourth.records.contains(&DiffRecord::Delete {
            path: "f.txt".to_string()
        }));
        assert!(fourth.records.contains(&DiffRecord::Create {
            path: "assets/img.png".to_string(),
            content: Content::Blob("assets/img.v1.png".to_string()),
            executable: None,
        }));
        assert_eq!(fs::read(out.path().join("data/assets/img.v1.png")).unwrap(), PNG);

        let fifth = document(out.path(), 5);
        assert_eq!(fifth.records[0].path(), "assets/copy.png");
        assert!(matches!(
            &fifth.records[0],
            DiffRecord::Create { content: Content::Blob(data), .. } if data == "assets/img.v1.png"
        ));
        assert!(!out.path().join("data/assets/copy.v1.png").exists());
    }

    #[test]
    #[traced_test]
    fn test_builtin_round_trip_reproduces_commit_ids() {
        let source = scenario_repo().unwrap();
        let out = TempDir::new().unwrap();
        extract_repository(source.path(), out.path(), ExtractOptions::new()).unwrap();

        let (target, summary) = rebuild_with(out.path(), PatchToolKind::Builtin);
        assert_eq!(summary.commits, 5);
        assert_eq!(summary.head.as_str(), source.head().unwrap().to_string());

        let left = GitBackend::open(source.path()).unwrap();
        let right = GitBackend::open(target.path()).unwrap();
        let report = compare_histories(&left, "master", &right, "master").unwrap();
        assert!(report.is_valid(), "{:?}", report.mismatches);

        assert_eq!(fs::read(target.path().join("assets/copy.png")).unwrap(), PNG);
        assert_eq!(
            fs::read_to_string(target.path().join("notes.md")).unwrap(),
            "no trailing newline"
        );
        assert!(!target.path().join("f.txt").exists());
        assert!(!target.path().join("src").exists());
    }

    #[test]
    #[traced_test]
    fn test_directory_and_file_swap_places() {
        let source = RepoHarness::new().unwrap();
        source.write("a/b", "nested\n").unwrap();
        source.write("keep.txt", "keep\n").unwrap();
        source.commit("Add a/b\n", 1_368_039_878, 0).unwrap();

        source.remove_dir("a").unwrap();
        source.write("a", "now a file\n").unwrap();
        source.commit("Directory becomes file\n", 1_368_040_000, 0).unwrap();

        source.remove("a").unwrap();
        source.write("a/b", "nested again\n").unwrap();
        source.write("a/c/d.txt", "deeper\n").unwrap();
        source.commit("File becomes directory\n", 1_368_050_000, 0).unwrap();

        let out = TempDir::new().unwrap();
        extract_repository(source.path(), out.path(), ExtractOptions::new()).unwrap();

        let swap = document(out.path(), 2);
        assert_eq!(swap.records.len(), 2);
        assert_eq!(swap.records[0].path(), "a");
        assert_eq!(swap.records[0].kind(), RecordKind::Create);
        assert_eq!(swap.records[1].path(), "a/b");
        assert_eq!(swap.records[1].kind(), RecordKind::Delete);

        let (target, summary) = rebuild_with(out.path(), PatchToolKind::Builtin);
        assert_eq!(summary.commits, 3);
        assert_eq!(summary.head.as_str(), source.head().unwrap().to_string());
        assert_eq!(fs::read_to_string(target.path().join("a/b")).unwrap(), "nested again\n");
        assert_eq!(fs::read_to_string(target.path().join("a/c/d.txt")).unwrap(), "deeper\n");

        let left = GitBackend::open(source.path()).unwrap();
        let right = GitBackend::open(target.path()).unwrap();
        assert!(compare_histories(&left, "master", &right, "master").unwrap().is_valid());
    }

    #[cfg(unix)]
    #[test]
    #[traced_test]
    fn test_symlink_is_reported() {
        let source = RepoHarness::new().unwrap();
        source.write("target.txt", "pointed at\n").unwrap();
        std::os::unix::fs::symlink("target.txt", source.path().join("link")).unwrap();
        source.commit("Add link\n", 1_368_039_878, 0).unwrap();

        let out = TempDir::new().unwrap();
        extract_repository(source.path(), out.path(), ExtractOptions::new()).unwrap();
        assert!(logs_contain("link is a symbolic link"));

        let first = document(out.path(), 1);
        assert!(first.records.iter().any(|record| record.path() == "link"));
    }

    #[test]
    fn test_external_round_trip() {
        if !patch_available() {
            return;
        }
        let source = scenario_repo().unwrap();
        let out = TempDir::new().unwrap();
        extract_repository(source.path(), out.path(), ExtractOptions::new()).unwrap();

        let (target, summary) = rebuild_with(out.path(), PatchToolKind::External);
        assert_eq!(summary.head.as_str(), source.head().unwrap().to_string());
        assert_eq!(
            fs::read_to_string(target.path().join("notes.md")).unwrap(),
            "no trailing newline"
        );
    }

    #[test]
    fn test_offsets_survive_rebuild() {
        let source = scenario_repo().unwrap();
        let out = TempDir::new().unwrap();
        extract_repository(source.path(), out.path(), ExtractOptions::new()).unwrap();
        let (target, _) = rebuild_with(out.path(), PatchToolKind::Builtin);

        let repo = Repository::open(target.path()).unwrap();
        let mut walk = repo.revwalk().unwrap();
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE).unwrap();
        walk.push_head().unwrap();
        let offsets: Vec<i32> = walk
            .map(|id| repo.find_commit(id.unwrap()).unwrap().author().when().offset_minutes())
            .collect();
        assert_eq!(offsets, vec![-420, -420, 330, 0, 60]);
    }

    #[test]
    fn test_extract_refuses_non_empty_output() {
        let source = scenario_repo().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(out.path().join("keep.txt"), "precious").unwrap();

        let err = extract_repository(source.path(), out.path(), ExtractOptions::new()).unwrap_err();
        assert!(matches!(err, PatchtrailError::TargetNotEmpty(_)));
        assert!(out.path().join("keep.txt").exists());

        extract_repository(source.path(), out.path(), ExtractOptions::new().force(true)).unwrap();
        assert!(!out.path().join("keep.txt").exists());
        assert!(out.path().join("commit/5.json").exists());
    }

    #[test]
    fn test_rebuild_refuses_non_empty_target() {
        let source = scenario_repo().unwrap();
        let out = TempDir::new().unwrap();
        extract_repository(source.path(), out.path(), ExtractOptions::new()).unwrap();

        let target = TempDir::new().unwrap();
        fs::write(target.path().join("stale"), "x").unwrap();
        let err = rebuild_repository(out.path(), target.path(), &RebuildOptions::new()).unwrap_err();
        assert!(matches!(err, PatchtrailError::TargetNotEmpty(_)));

        let options = RebuildOptions::new().patch_tool(PatchToolKind::Builtin).force(true);
        rebuild_repository(out.path(), target.path(), &options).unwrap();
        assert!(!target.path().join("stale").exists());
    }

    #[test]
    fn test_unknown_branch() {
        let source = scenario_repo().unwrap();
        let out = TempDir::new().unwrap();
        let err = extract_repository(source.path(), out.path(), ExtractOptions::new().branch("nope")).unwrap_err();
        assert!(matches!(err, PatchtrailError::RefNotFound(ref name) if name == "nope"));
    }

    #[test]
    fn test_merge_history_is_rejected() {
        let source = RepoHarness::new().unwrap();
        source.write("a.txt", "a\n").unwrap();
        let base = source.commit("base\n", 1_000_000, 0).unwrap();
        source.write("a.txt", "b\n").unwrap();
        let main = source.commit("main\n", 1_000_100, 0).unwrap();

        let repo = &source.repo;
        let sig = Signature::new("Ann", "ann@example.com", &Time::new(1_000_200, 0)).unwrap();
        let base_commit = repo.find_commit(base).unwrap();
        let side = repo
            .commit(None, &sig, &sig, "side\n", &base_commit.tree().unwrap(), &[&base_commit])
            .unwrap();
        let main_commit = repo.find_commit(main).unwrap();
        let side_commit = repo.find_commit(side).unwrap();
        repo.commit(
            Some("HEAD"),
            &sig,
            &sig,
            "merge\n",
            &main_commit.tree().unwrap(),
            &[&main_commit, &side_commit],
        )
        .unwrap();

        let out = TempDir::new().unwrap();
        let err = extract_repository(source.path(), out.path(), ExtractOptions::new()).unwrap_err();
        assert!(matches!(err, PatchtrailError::MergeUnsupported { parents: 2, .. }));
        assert!(err.user_message().contains("linear"));
    }

    #[test]
    fn test_rebuilt_branch_name() {
        let source = scenario_repo().unwrap();
        let out = TempDir::new().unwrap();
        extract_repository(source.path(), out.path(), ExtractOptions::new()).unwrap();

        let target = TempDir::new().unwrap();
        let options = RebuildOptions::new().branch("archive").patch_tool(PatchToolKind::Builtin);
        let summary = rebuild_repository(out.path(), target.path(), &options).unwrap();

        let repo = Repository::open(target.path()).unwrap();
        let branch = repo.find_branch("archive", git2::BranchType::Local).unwrap();
        assert_eq!(branch.get().target().unwrap().to_string(), summary.head.as_str());
        assert_eq!(repo.head().unwrap().shorthand(), Some("archive"));
    }

    #[test]
    fn test_archive_paths_are_relative() {
        let source = scenario_repo().unwrap();
        let out = TempDir::new().unwrap();
        extract_repository(source.path(), out.path(), ExtractOptions::new()).unwrap();

        let documents = Archive::new(out.path()).list_documents().unwrap();
        let numbers: Vec<u64> = documents.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        let names: Vec<PathBuf> = documents
            .iter()
            .map(|(_, path)| path.strip_prefix(out.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names[0], Path::new("commit").join("1.json"));
    }
}
