use std::path::PathBuf;
use std::process;

use clap::Parser;

use discfit::dedup;
use discfit::error::DiscfitError;
use discfit::report::format_count;

#[derive(Parser)]
#[command(name = "treedup")]
#[command(about = "Delete files in a target tree that duplicate a reference tree", long_about = None)]
struct Cli {
    /// Tree holding the canonical copies; never modified
    reference: PathBuf,

    /// Tree to clean up
    target: PathBuf,

    /// Report what would be deleted without deleting anything
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("[treedup] {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), DiscfitError> {
    let cli = Cli::parse();

    if !cli.reference.is_dir() {
        return Err(DiscfitError::Config(format!(
            "reference '{}' is not a directory",
            cli.reference.display()
        )));
    }
    if !cli.target.is_dir() {
        return Err(DiscfitError::Config(format!(
            "target '{}' is not a directory",
            cli.target.display()
        )));
    }

    let stats = dedup::dedup_tree(&cli.reference, &cli.target, cli.dry_run)?;

    println!(
        "[treedup] examined {} file(s), {} {} duplicate(s), {} bytes freed",
        stats.examined,
        if cli.dry_run { "found" } else { "removed" },
        stats.removed,
        format_count(stats.bytes_freed)
    );
    Ok(())
}
