//! CLI argument parsing using clap.

use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "distrolint")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output and debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate one distribution archive
    Check(CheckArgs),
    /// Validate a DistributionInfo.json manifest and the archives it lists
    Manifest(ManifestArgs),
    /// Generate shell completions
    Completion(CompletionArgs),
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// Path to the archive file (plain or compressed tar)
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Expect arm64 executables instead of x86-64
    #[arg(long)]
    pub arm64: bool,

    /// Maximum number of symlinks followed per lookup
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_symlink_hops: Option<u16>,
}

#[derive(clap::Args)]
pub struct ManifestArgs {
    /// Path to the manifest file
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Previous manifest; unchanged entries are skipped
    #[arg(long, value_name = "FILE")]
    pub baseline: Option<PathBuf>,

    /// Print GitHub workflow annotations (ignored with --json)
    #[arg(long)]
    pub annotate: bool,
}

#[derive(clap::Args)]
pub struct CompletionArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}
