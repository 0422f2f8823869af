use std::path::{Path, PathBuf};
use std::process;

use chrono::Utc;
use clap::{Parser, Subcommand};

use discfit::error::DiscfitError;
use discfit::queue::{self, DownloadQueue, EntryState, QueueLock};

#[derive(Parser)]
#[command(name = "fetchq")]
#[command(about = "One-at-a-time download queue dispatcher", long_about = None)]
struct Cli {
    /// Queue file
    #[arg(long, default_value = "fetchq.queue")]
    queue: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a url for download
    Add {
        url: String,
        /// Routing tag: video goes to youtube-dl, anything else to wget
        #[arg(long, default_value = "file")]
        tag: String,
    },
    /// Dispatch the next ready download (intended to run from cron)
    Run,
    /// Print the queue
    List,
    /// Drop finished and dead entries
    Prune,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("[fetchq] {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), DiscfitError> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Add { url, tag } => {
            let mut queue = DownloadQueue::load(&cli.queue)?;
            queue.add(&url, &tag)?;
            queue.save()?;
            println!("[fetchq] queued {} (tag {})", url, tag);
        }
        Commands::Run => dispatch(&cli.queue)?,
        Commands::List => {
            let queue = DownloadQueue::load(&cli.queue)?;
            for entry in &queue.entries {
                println!(
                    "{}\t{}\t{}\t{}",
                    entry.state.as_str(),
                    entry.attempts,
                    entry.tag,
                    entry.url
                );
            }
        }
        Commands::Prune => {
            let mut queue = DownloadQueue::load(&cli.queue)?;
            let dropped = queue.prune();
            queue.save()?;
            println!("[fetchq] pruned {} entr{}", dropped, if dropped == 1 { "y" } else { "ies" });
        }
    }
    Ok(())
}

fn dispatch(queue_path: &Path) -> Result<(), DiscfitError> {
    let lock_path = queue::lock_path_for(queue_path);
    let Some(_lock) = QueueLock::acquire(&lock_path)? else {
        println!("[fetchq] another dispatch is running");
        return Ok(());
    };

    let mut queue = DownloadQueue::load(queue_path)?;

    // Holding the lock means no other dispatch is alive, so any run
    // entry in the file is left over from a crash.
    let recovered = queue.recover_crashed_runs();
    if recovered > 0 {
        println!("[fetchq] recovered {} crashed download(s)", recovered);
        queue.save()?;
    }

    let Some(index) = queue.next_ready(Utc::now()) else {
        println!("[fetchq] nothing ready to dispatch");
        return Ok(());
    };

    queue.entries[index].state = EntryState::Run;
    queue.entries[index].last_attempt = Some(Utc::now());
    queue.save()?;

    let picked = queue.entries[index].clone();
    println!(
        "[fetchq] dispatching {} (tag {}, attempt {})",
        picked.url,
        picked.tag,
        picked.attempts + 1
    );
    let succeeded = queue::run_download(&picked)?;

    // Reload before saving the verdict: adds and prunes that happened
    // while the download ran must survive.
    let mut queue = DownloadQueue::load(queue_path)?;
    match queue.apply_verdict(&picked.url, succeeded) {
        Some(entry) if entry.state == EntryState::Done => {
            println!("[fetchq] done: {}", entry.url);
        }
        Some(entry) if entry.state == EntryState::Dead => {
            println!(
                "[fetchq] giving up on {} after {} attempts",
                entry.url, entry.attempts
            );
        }
        Some(entry) => {
            println!("[fetchq] will retry {} (attempt {})", entry.url, entry.attempts);
        }
        None => {
            println!("[fetchq] {} left the queue while downloading", picked.url);
        }
    }
    queue.save()?;
    Ok(())
}
