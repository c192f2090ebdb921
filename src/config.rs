//! Run options for extraction and rebuild
//!
//! # Default Values
//!
//! - `branch`: `master`
//! - `force`: false (refuse to write into a non-empty directory)
//! - `patch_tool`: `PatchToolKind::External` running `patch` from `PATH`

use crate::patch::{BuiltinPatch, ExternalPatch, PatchTool};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Branch read from and written to when none is given
pub const DEFAULT_BRANCH: &str = "master";

/// Which patch implementation a rebuild uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchToolKind {
    /// The system `patch` program
    #[default]
    External,
    /// The in-process hunk applier
    Builtin,
}

/// Options for [`crate::extract::extract_repository`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Branch whose history is archived
    pub branch: String,
    /// Clear a non-empty output directory instead of failing
    pub force: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            branch: DEFAULT_BRANCH.to_string(),
            force: false,
        }
    }
}

impl ExtractOptions {
    /// Options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the branch to archive
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Allow replacing an existing output directory
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Options for [`crate::apply::rebuild_repository`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildOptions {
    /// Branch pointed at the rebuilt history
    pub branch: String,
    /// Patch implementation
    pub patch_tool: PatchToolKind,
    /// Program run by the external patch tool
    pub patch_program: PathBuf,
    /// Clear a non-empty target directory instead of failing
    pub force: bool,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self {
            branch: DEFAULT_BRANCH.to_string(),
            patch_tool: PatchToolKind::default(),
            patch_program: PathBuf::from("patch"),
            force: false,
        }
    }
}

impl RebuildOptions {
    /// Options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the branch to create
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Select the patch implementation
    pub fn patch_tool(mut self, kind: PatchToolKind) -> Self {
        self.patch_tool = kind;
        self
    }

    /// Run a specific program for external patching
    pub fn patch_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.patch_program = program.into();
        self
    }

    /// Allow replacing an existing target directory
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Instantiate the selected patch tool
    pub fn make_patch_tool(&self) -> Box<dyn PatchTool> {
        match self.patch_tool {
            PatchToolKind::External => Box::new(ExternalPatch::new(&self.patch_program)),
            PatchToolKind::Builtin => Box::new(BuiltinPatch),
        }
    }
}
