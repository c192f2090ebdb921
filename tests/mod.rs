//! Main test module for Patchtrail
//!
//! This module includes all test suites:
//! - Integration tests against real repositories
//! - Edge cases for damaged or unusual archives

pub mod integration;

#[cfg(test)]
mod edge_cases {
    use super::integration::scenario_repo;
    use ::patchtrail::*;
    use std::fs;
    use tempfile::TempDir;

    fn builtin() -> RebuildOptions {
        RebuildOptions::new().patch_tool(PatchToolKind::Builtin)
    }

    fn extracted() -> TempDir {
        let source = scenario_repo().unwrap();
        let out = TempDir::new().unwrap();
        extract_repository(source.path(), out.path(), ExtractOptions::new()).unwrap();
        out
    }

    #[test]
    fn test_empty_archive() {
        let archive = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let err = rebuild_repository(archive.path(), target.path().join("repo"), &builtin()).unwrap_err();
        assert!(matches!(err, PatchtrailError::NoCommits(_)));
        assert!(!target.path().join("repo").exists());
    }

    #[test]
    fn test_stray_files_in_commit_dir_are_ignored() {
        let archive = extracted();
        fs::write(archive.path().join("commit/README"), "notes").unwrap();
        fs::write(archive.path().join("commit/06.json"), "garbage").unwrap();
        fs::write(archive.path().join("commit/6.xml"), "<commit/>").unwrap();

        let target = TempDir::new().unwrap();
        let summary = rebuild_repository(archive.path(), target.path(), &builtin()).unwrap();
        assert_eq!(summary.commits, 5);
    }

    #[test]
    fn test_document_without_message() {
        let archive = extracted();
        let path = archive.path().join("commit/2.json");
        let mut json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        json.as_object_mut().unwrap().remove("message");
        fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

        let target = TempDir::new().unwrap();
        let err = rebuild_repository(archive.path(), target.path(), &builtin()).unwrap_err();
        assert!(matches!(err, PatchtrailError::MissingMessage(ref p) if p == &path));
        assert!(err.is_archive_defect());
    }

    #[test]
    fn test_committer_defaults_to_author() {
        let archive = extracted();
        let path = archive.path().join("commit/1.json");
        let mut json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        json.as_object_mut().unwrap().remove("committer");
        fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

        let target = TempDir::new().unwrap();
        rebuild_repository(archive.path(), target.path(), &builtin()).unwrap();

        let rebuilt = GitBackend::open(target.path()).unwrap();
        let revisions = {
            use patchtrail::backend::HistoryReader;
            let tip = rebuilt.resolve_ref("master").unwrap();
            let first = rebuilt.list_revisions(&tip).unwrap()[0].clone();
            rebuilt.read_commit(&first).unwrap()
        };
        assert_eq!(revisions.committer.to_line(), revisions.author.to_line());
    }

    #[test]
    fn test_patch_that_does_not_apply() {
        let archive = extracted();
        let path = archive.path().join("commit/2.json");
        let text = fs::read_to_string(&path).unwrap().replace("-hello\\n", "-goodbye\\n");
        fs::write(&path, text).unwrap();

        let target = TempDir::new().unwrap();
        let err = rebuild_repository(archive.path(), target.path(), &builtin()).unwrap_err();
        assert!(matches!(err, PatchtrailError::HunkMismatch { .. }), "{:?}", err);
    }

    #[test]
    fn test_record_with_text_and_data() {
        let archive = extracted();
        let path = archive.path().join("commit/1.json");
        let mut json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        json["changes"][0]["data"] = serde_json::Value::String("f.v1.txt".to_string());
        fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

        let target = TempDir::new().unwrap();
        let err = rebuild_repository(archive.path(), target.path(), &builtin()).unwrap_err();
        assert!(matches!(err, PatchtrailError::InvalidRecord { .. }), "{:?}", err);
    }

    #[test]
    fn test_verify_reports_divergence() {
        let source = scenario_repo().unwrap();
        let other = scenario_repo().unwrap();
        other.write("extra.txt", "diverged\n").unwrap();
        other.commit("Diverge\n", 1_368_400_000, 0).unwrap();

        let left = GitBackend::open(source.path()).unwrap();
        let right = GitBackend::open(other.path()).unwrap();
        let report = compare_histories(&left, "master", &right, "master").unwrap();
        assert!(!report.is_valid());
        assert!(report.mismatches.contains(&Mismatch::Length { left: 5, right: 6 }));
    }
}
