//! Checking that two histories are equivalent
//!
//! Used after a rebuild to confirm the round trip: both branches are walked
//! oldest first and compared position by position. Revision ids are expected
//! to differ only if metadata or trees differ, but they are never compared
//! directly; the report lists what actually diverged.
//!
//! ```rust,no_run
//! use patchtrail::git::GitBackend;
//! use patchtrail::verify::compare_histories;
//!
//! # fn main() -> patchtrail::Result<()> {
//! let original = GitBackend::open("original")?;
//! let rebuilt = GitBackend::open("rebuilt")?;
//! let report = compare_histories(&original, "master", &rebuilt, "master")?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

use crate::backend::HistoryReader;
use crate::diff::diff_trees;
use crate::error::Result;
use crate::types::Commit;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One way the two histories diverge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "lowercase")]
pub enum Mismatch {
    /// The histories have different lengths
    Length {
        /// Commits on the left
        left: usize,
        /// Commits on the right
        right: usize,
    },
    /// Files differ by content or executable flag
    Tree {
        /// 0-based position in the history
        index: usize,
        /// Differing paths
        paths: Vec<String>,
    },
    /// Author line differs
    Author {
        /// 0-based position in the history
        index: usize,
        /// Left author line
        left: String,
        /// Right author line
        right: String,
    },
    /// Committer line differs
    Committer {
        /// 0-based position in the history
        index: usize,
        /// Left committer line
        left: String,
        /// Right committer line
        right: String,
    },
    /// Message text differs
    Message {
        /// 0-based position in the history
        index: usize,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Length { left, right } => write!(f, "history length {} vs {}", left, right),
            Mismatch::Tree { index, paths } => {
                write!(f, "commit {}: files differ: {}", index + 1, paths.join(", "))
            }
            Mismatch::Author { index, left, right } => {
                write!(f, "commit {}: author {:?} vs {:?}", index + 1, left, right)
            }
            Mismatch::Committer { index, left, right } => {
                write!(f, "commit {}: committer {:?} vs {:?}", index + 1, left, right)
            }
            Mismatch::Message { index } => write!(f, "commit {}: message differs", index + 1),
        }
    }
}

/// Outcome of comparing two histories
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Number of commit pairs compared
    pub commits_compared: usize,
    /// Everything that diverged
    pub mismatches: Vec<Mismatch>,
    /// Time taken in milliseconds
    pub verification_time_ms: u64,
}

impl VerificationReport {
    /// Whether the histories are equivalent
    pub fn is_valid(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        if self.is_valid() {
            format!(
                "Histories match ({} commits compared in {}ms)",
                self.commits_compared, self.verification_time_ms
            )
        } else {
            format!(
                "Histories differ: {} mismatches across {} commits",
                self.mismatches.len(),
                self.commits_compared
            )
        }
    }
}

/// Compare branch `left_ref` of `left` with branch `right_ref` of `right`
pub fn compare_histories<L, R>(left: &L, left_ref: &str, right: &R, right_ref: &str) -> Result<VerificationReport>
where
    L: HistoryReader + ?Sized,
    R: HistoryReader + ?Sized,
{
    let start = Instant::now();
    let left_revisions = left.list_revisions(&left.resolve_ref(left_ref)?)?;
    let right_revisions = right.list_revisions(&right.resolve_ref(right_ref)?)?;
    info!(
        "Comparing {} ({} commits) with {} ({} commits)",
        left_ref,
        left_revisions.len(),
        right_ref,
        right_revisions.len()
    );

    let mut report = VerificationReport::default();
    if left_revisions.len() != right_revisions.len() {
        report.mismatches.push(Mismatch::Length {
            left: left_revisions.len(),
            right: right_revisions.len(),
        });
    }

    for (index, (l, r)) in left_revisions.iter().zip(&right_revisions).enumerate() {
        let l = left.read_commit(l)?;
        let r = right.read_commit(r)?;
        compare_commits(index, &l, &r, &mut report.mismatches);

        let changed = diff_trees(&left.read_tree(&l.tree)?, &right.read_tree(&r.tree)?);
        if !changed.is_empty() {
            report.mismatches.push(Mismatch::Tree {
                index,
                paths: changed.into_iter().map(|change| change.path).collect(),
            });
        }
        report.commits_compared += 1;
        debug!("Compared commit {}", index + 1);
    }

    report.verification_time_ms = start.elapsed().as_millis() as u64;
    for mismatch in &report.mismatches {
        warn!("{}", mismatch);
    }
    Ok(report)
}

// Offsets are part of the rendered line; chrono equality would ignore them.
fn compare_commits(index: usize, left: &Commit, right: &Commit, out: &mut Vec<Mismatch>) {
    let (la, ra) = (left.author.to_line(), right.author.to_line());
    if la != ra {
        out.push(Mismatch::Author { index, left: la, right: ra });
    }
    let (lc, rc) = (left.committer.to_line(), right.committer.to_line());
    if lc != rc {
        out.push(Mismatch::Committer { index, left: lc, right: rc });
    }
    if left.message != right.message {
        out.push(Mismatch::Message { index });
    }
}
