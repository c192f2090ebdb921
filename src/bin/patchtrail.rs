//! # Patchtrail CLI - archive and rebuild linear git histories
//!
//! ## Usage
//! ```bash
//! # Turn the master branch of a repository into an archive
//! patchtrail extract ./project ./project-archive
//!
//! # Rebuild a repository from the archive
//! patchtrail rebuild ./project-archive ./project-copy
//!
//! # Check that the rebuilt history matches the original
//! patchtrail verify ./project ./project-copy
//!
//! # Summarize an archive
//! patchtrail info ./project-archive
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use patchtrail::utils::format_bytes;
use patchtrail::{
    compare_histories, extract_repository_with_progress, rebuild_repository_with_progress, Archive,
    ExtractOptions, GitBackend, PatchToolKind, PatchtrailError, RebuildOptions, RecordStats, Result,
    DEFAULT_BRANCH,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Patchtrail CLI - linear git histories as reviewable diff documents
#[derive(Parser)]
#[command(name = "patchtrail")]
#[command(version)]
#[command(about = "Archive a linear git history as per-commit diff documents and rebuild it")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Hide the progress spinner
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the history of a branch as an archive
    Extract {
        /// Repository to read
        repo: PathBuf,

        /// Archive directory to create
        outdir: PathBuf,

        /// Branch to archive
        #[arg(short, long, default_value = DEFAULT_BRANCH)]
        branch: String,

        /// Replace the contents of a non-empty output directory
        #[arg(long)]
        force: bool,
    },

    /// Create a repository from an archive
    Rebuild {
        /// Archive directory to read
        archive: PathBuf,

        /// Repository to create
        repo: PathBuf,

        /// Branch to create
        #[arg(short, long, default_value = DEFAULT_BRANCH)]
        branch: String,

        /// How patch records are applied
        #[arg(long, value_enum, default_value = "external")]
        patch_tool: PatchMode,

        /// Program used by the external patch tool
        #[arg(long, default_value = "patch")]
        patch_program: PathBuf,

        /// Replace the contents of a non-empty target directory
        #[arg(long)]
        force: bool,
    },

    /// Compare the histories of two repositories
    Verify {
        /// First repository
        repo_a: PathBuf,

        /// Second repository
        repo_b: PathBuf,

        /// Branch in the first repository
        #[arg(long, default_value = DEFAULT_BRANCH)]
        branch_a: String,

        /// Branch in the second repository
        #[arg(long, default_value = DEFAULT_BRANCH)]
        branch_b: String,
    },

    /// Show archive statistics
    Info {
        /// Archive directory
        archive: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PatchMode {
    /// Pipe hunks into the system `patch` program
    External,
    /// Apply hunks in process
    Builtin,
}

impl From<PatchMode> for PatchToolKind {
    fn from(mode: PatchMode) -> Self {
        match mode {
            PatchMode::External => PatchToolKind::External,
            PatchMode::Builtin => PatchToolKind::Builtin,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e.user_message());
            ExitCode::FAILURE
        }
    }
}

/// Main command runner; `Ok(false)` means the command ran but found problems
fn run(cli: Cli) -> Result<bool> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Extract {
            repo,
            outdir,
            branch,
            force,
        } => cmd_extract(&repo, &outdir, ExtractOptions::new().branch(branch).force(force), quiet),
        Commands::Rebuild {
            archive,
            repo,
            branch,
            patch_tool,
            patch_program,
            force,
        } => {
            let options = RebuildOptions::new()
                .branch(branch)
                .patch_tool(patch_tool.into())
                .patch_program(patch_program)
                .force(force);
            cmd_rebuild(&archive, &repo, &options, quiet)
        }
        Commands::Verify {
            repo_a,
            repo_b,
            branch_a,
            branch_b,
        } => cmd_verify(&repo_a, &repo_b, &branch_a, &branch_b),
        Commands::Info { archive } => cmd_info(&archive),
    }
}

/// Spinner reporting `done/total` documents, or nothing when quiet
fn spinner(quiet: bool, verb: &str) -> Result<Option<ProgressBar>> {
    if quiet {
        return Ok(None);
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .map_err(|e| PatchtrailError::internal(e.to_string()))?,
    );
    pb.set_message(format!("{} documents...", verb));
    Ok(Some(pb))
}

fn print_records(records: &RecordStats) {
    println!(
        "  Records: {} created, {} patched, {} replaced, {} deleted",
        records.created.to_string().green(),
        records.patched.to_string().cyan(),
        records.replaced.to_string().yellow(),
        records.deleted.to_string().red()
    );
}

/// Archive the history of one branch
fn cmd_extract(repo: &Path, outdir: &Path, options: ExtractOptions, quiet: bool) -> Result<bool> {
    println!(
        "{} {} of {}",
        "Extracting".blue().bold(),
        options.branch.yellow(),
        repo.display().to_string().cyan()
    );

    let start = Instant::now();
    let progress = spinner(quiet, "Writing")?;
    let summary = extract_repository_with_progress(repo, outdir, options, |done, total| {
        if let Some(pb) = &progress {
            pb.set_message(format!("Writing documents... {}/{}", done, total));
            pb.tick();
        }
    })?;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    println!("{} Archive written to {}", "✓".green().bold(), outdir.display().to_string().cyan());
    println!("  Documents: {}", summary.documents.to_string().cyan());
    println!("  Blobs: {}", summary.blobs.to_string().cyan());
    print_records(&summary.records);
    println!("  Time: {}", format_duration(start.elapsed()).to_string().cyan());
    Ok(true)
}

/// Replay an archive into a fresh repository
fn cmd_rebuild(archive: &Path, repo: &Path, options: &RebuildOptions, quiet: bool) -> Result<bool> {
    println!(
        "{} {} into {}",
        "Rebuilding".blue().bold(),
        archive.display().to_string().cyan(),
        repo.display().to_string().cyan()
    );

    let start = Instant::now();
    let progress = spinner(quiet, "Applying")?;
    let summary = rebuild_repository_with_progress(archive, repo, options, |done, total| {
        if let Some(pb) = &progress {
            pb.set_message(format!("Applying documents... {}/{}", done, total));
            pb.tick();
        }
    })?;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    println!(
        "{} Rebuilt {} commits, {} is at {}",
        "✓".green().bold(),
        summary.commits.to_string().cyan(),
        options.branch.yellow(),
        summary.head.as_str()[..summary.head.as_str().len().min(8)].yellow().bold()
    );
    print_records(&summary.records);
    println!("  Time: {}", format_duration(start.elapsed()).to_string().cyan());
    Ok(true)
}

/// Compare two repositories commit by commit
fn cmd_verify(repo_a: &Path, repo_b: &Path, branch_a: &str, branch_b: &str) -> Result<bool> {
    println!(
        "{} {}:{} against {}:{}",
        "Verifying".blue().bold(),
        repo_a.display().to_string().cyan(),
        branch_a.yellow(),
        repo_b.display().to_string().cyan(),
        branch_b.yellow()
    );

    let left = GitBackend::open(repo_a)?;
    let right = GitBackend::open(repo_b)?;
    let report = compare_histories(&left, branch_a, &right, branch_b)?;

    println!("\n{}", "Verification Report:".bold());
    println!("  Commits compared: {}", report.commits_compared);
    println!("  Verification time: {}ms", report.verification_time_ms);

    if report.is_valid() {
        println!("{} {}", "✓".green().bold(), report.summary());
        return Ok(true);
    }

    println!("{} {}", "✗".red().bold(), report.summary());
    for mismatch in &report.mismatches {
        println!("  - {}", mismatch.to_string().yellow());
    }
    Ok(false)
}

/// Summarize an archive on disk
fn cmd_info(archive_path: &Path) -> Result<bool> {
    let archive = Archive::new(archive_path);
    let documents = archive.list_documents()?;

    let mut total_size = 0u64;
    let mut blob_count = 0usize;
    let data_dir = archive.data_dir();
    for entry in walkdir::WalkDir::new(archive.root()) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        total_size += entry.metadata()?.len();
        if entry.path().starts_with(&data_dir) {
            blob_count += 1;
        }
    }

    println!("{} {}", "Archive".blue().bold(), archive.root().display().to_string().cyan());
    println!();
    println!("{}", "Statistics:".bold());
    println!("  Documents: {}", documents.len().to_string().cyan());
    println!("  Blobs: {}", blob_count.to_string().cyan());
    println!("  Total size: {}", format_bytes(total_size).cyan());

    let mut records = RecordStats::default();
    for (_, path) in &documents {
        for record in archive.read_document(path)?.records {
            records.count(record.kind());
        }
    }
    print_records(&records);

    if let (Some((_, first)), Some((_, last))) = (documents.first(), documents.last()) {
        let first = archive.read_document(first)?;
        let last = archive.read_document(last)?;
        println!("\n{}", "History:".bold());
        println!("  First: {} by {}", first.author.iso_date(), first.author.name.cyan());
        println!("  Last: {} by {}", last.author.iso_date(), last.author.name.cyan());
        if let Some(subject) = last.message.lines().next() {
            println!("  Last message: {}", subject.dimmed());
        }
    }

    Ok(true)
}
