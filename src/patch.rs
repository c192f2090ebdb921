//! Applying unified diff bodies to files in the working tree
//!
//! Documents store patches as bare hunks. Before application a minimal
//! `--- old` / `+++ new` header is put back in front so standard tools accept
//! the input.
//!
//! Two implementations are provided:
//!
//! - [`ExternalPatch`] pipes the input into the system `patch` program, the
//!   same way a shell user would.
//! - [`BuiltinPatch`] parses the hunks and applies them in process. It accepts
//!   no fuzz and no offsets: every context and removed line has to match at
//!   the position the hunk header names, which always holds for archives
//!   produced by extraction.

use crate::error::{PatchtrailError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// File header placed in front of a stored hunk body
pub const PATCH_HEADER: &str = "--- old\n+++ new\n";

/// Something that can apply a unified diff body to a file in place
pub trait PatchTool {
    /// Apply `body` (hunks only, no file header) to the file at `target`
    fn apply(&self, target: &Path, body: &str) -> Result<()>;
}

/// Runs an external `patch` program
#[derive(Debug, Clone)]
pub struct ExternalPatch {
    program: PathBuf,
}

impl ExternalPatch {
    /// Use a specific program instead of `patch` from `PATH`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program that gets invoked
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for ExternalPatch {
    fn default() -> Self {
        Self::new("patch")
    }
}

impl PatchTool for ExternalPatch {
    fn apply(&self, target: &Path, body: &str) -> Result<()> {
        let target = std::path::absolute(target)?;
        debug!("Running {:?} on {:?}", self.program, target);

        let mut child = Command::new(&self.program)
            .arg(&target)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| PatchtrailError::internal("patch stdin was not captured"))?;
            stdin.write_all(PATCH_HEADER.as_bytes())?;
            stdin.write_all(body.as_bytes())?;
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(PatchtrailError::PatchToolFailed {
                path: target,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Applies hunks in process
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPatch;

impl PatchTool for BuiltinPatch {
    fn apply(&self, target: &Path, body: &str) -> Result<()> {
        let original = fs::read(target)?;
        let original = String::from_utf8(original).map_err(|_| {
            PatchtrailError::MalformedPatch(format!("{:?} is not UTF-8 text", target))
        })?;
        let hunks = parse_hunks(body)?;
        let patched = apply_hunks(&original, &hunks, target)?;
        // plain write keeps the file's permission bits
        fs::write(target, patched)?;
        trace!("Applied {} hunks to {:?}", hunks.len(), target);
        Ok(())
    }
}

/// One line of a hunk, terminator included
#[derive(Debug, Clone, PartialEq, Eq)]
enum HunkLine {
    Context(String),
    Removed(String),
    Added(String),
}

impl HunkLine {
    fn text_mut(&mut self) -> &mut String {
        match self {
            HunkLine::Context(text) | HunkLine::Removed(text) | HunkLine::Added(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Hunk {
    old_start: usize,
    old_len: usize,
    lines: Vec<HunkLine>,
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

fn parse_header(line: &str) -> Option<(usize, usize)> {
    let inner = line.strip_prefix("@@ -")?;
    let (old, rest) = inner.split_once(" +")?;
    rest.split_once(" @@")?;
    parse_range(old)
}

fn parse_hunks(body: &str) -> Result<Vec<Hunk>> {
    let mut hunks: Vec<Hunk> = Vec::new();

    for line in body.split_inclusive('\n') {
        if line.starts_with("@@") {
            let (old_start, old_len) = parse_header(line)
                .ok_or_else(|| PatchtrailError::MalformedPatch(format!("bad hunk header {:?}", line)))?;
            hunks.push(Hunk {
                old_start,
                old_len,
                lines: Vec::new(),
            });
            continue;
        }

        let hunk = hunks
            .last_mut()
            .ok_or_else(|| PatchtrailError::MalformedPatch(format!("line outside hunk {:?}", line)))?;

        if line.starts_with('\\') {
            // "\ No newline at end of file" applies to the previous line
            let previous = hunk
                .lines
                .last_mut()
                .ok_or_else(|| PatchtrailError::MalformedPatch("dangling no-newline marker".to_string()))?;
            let text = previous.text_mut();
            if text.ends_with('\n') {
                text.pop();
            }
            continue;
        }

        let parsed = match line.as_bytes()[0] {
            b' ' => HunkLine::Context(line[1..].to_string()),
            b'-' => HunkLine::Removed(line[1..].to_string()),
            b'+' => HunkLine::Added(line[1..].to_string()),
            b'\n' => HunkLine::Context(line.to_string()),
            _ => {
                return Err(PatchtrailError::MalformedPatch(format!("unexpected line {:?}", line)));
            }
        };
        hunk.lines.push(parsed);
    }

    Ok(hunks)
}

fn apply_hunks(original: &str, hunks: &[Hunk], target: &Path) -> Result<String> {
    let old_lines: Vec<&str> = original.split_inclusive('\n').collect();
    let mut output = String::with_capacity(original.len());
    let mut cursor = 0;

    for hunk in hunks {
        let mismatch = || PatchtrailError::HunkMismatch {
            path: target.to_path_buf(),
            line: hunk.old_start,
        };

        let start = if hunk.old_len == 0 {
            hunk.old_start
        } else {
            hunk.old_start.checked_sub(1).ok_or_else(mismatch)?
        };
        if start < cursor || start > old_lines.len() {
            return Err(mismatch());
        }
        old_lines[cursor..start].iter().for_each(|line| output.push_str(line));
        cursor = start;

        for line in &hunk.lines {
            match line {
                HunkLine::Context(text) | HunkLine::Removed(text) => {
                    if old_lines.get(cursor) != Some(&text.as_str()) {
                        return Err(mismatch());
                    }
                    cursor += 1;
                    if let HunkLine::Context(text) = line {
                        output.push_str(text);
                    }
                }
                HunkLine::Added(text) => output.push_str(text),
            }
        }
    }

    old_lines[cursor..].iter().for_each(|line| output.push_str(line));
    Ok(output)
}
