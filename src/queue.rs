use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Duration, Utc};

use crate::error::DiscfitError;

/// Attempts before an entry is declared dead.
pub const DEFAULT_RETRY_LIMIT: u32 = 5;

/// Base retry delay in minutes; the effective delay is this times the
/// attempt count.
pub const DEFAULT_BACKOFF_MINUTES: i64 = 10;

/// Per-URL lifecycle: wait -> run -> done | fail | dead, fail -> run on
/// retry. A `run` entry in the file on load means a dispatch crashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Wait,
    Run,
    Done,
    Fail,
    Dead,
}

impl EntryState {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryState::Wait => "wait",
            EntryState::Run => "run",
            EntryState::Done => "done",
            EntryState::Fail => "fail",
            EntryState::Dead => "dead",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DiscfitError> {
        match s {
            "wait" => Ok(EntryState::Wait),
            "run" => Ok(EntryState::Run),
            "done" => Ok(EntryState::Done),
            "fail" => Ok(EntryState::Fail),
            "dead" => Ok(EntryState::Dead),
            other => Err(DiscfitError::Queue(format!("unknown state '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub state: EntryState,
    pub attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub tag: String,
    pub url: String,
}

impl QueueEntry {
    fn to_line(&self) -> String {
        let stamp = self
            .last_attempt
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.state.as_str(),
            self.attempts,
            stamp,
            self.tag,
            self.url
        )
    }

    fn from_line(line: &str) -> Result<Self, DiscfitError> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 5 {
            return Err(DiscfitError::Queue(format!(
                "malformed queue line '{}'",
                line
            )));
        }
        let state = EntryState::parse(fields[0])?;
        let attempts: u32 = fields[1]
            .parse()
            .map_err(|_| DiscfitError::Queue(format!("bad attempt count '{}'", fields[1])))?;
        let last_attempt = if fields[2] == "-" {
            None
        } else {
            let parsed = DateTime::parse_from_rfc3339(fields[2])
                .map_err(|_| DiscfitError::Queue(format!("bad timestamp '{}'", fields[2])))?;
            Some(parsed.with_timezone(&Utc))
        };
        Ok(QueueEntry {
            state,
            attempts,
            last_attempt,
            tag: fields[3].to_string(),
            url: fields[4].to_string(),
        })
    }
}

/// The download queue, backed by a flat tab-delimited text file.
pub struct DownloadQueue {
    path: PathBuf,
    pub entries: Vec<QueueEntry>,
}

impl DownloadQueue {
    /// Load the queue file. A missing file is an empty queue. Entries in
    /// `run` are kept as-is: only the lock-holding dispatch can tell a
    /// crashed run from a live one (see `recover_crashed_runs`).
    pub fn load(path: &Path) -> Result<Self, DiscfitError> {
        let mut entries = Vec::new();
        if path.exists() {
            for line in fs::read_to_string(path)?.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                entries.push(QueueEntry::from_line(line)?);
            }
        }
        Ok(DownloadQueue {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Rewrite the queue file atomically: write a temp file, then rename.
    pub fn save(&self) -> Result<(), DiscfitError> {
        let mut text = String::new();
        for entry in &self.entries {
            text.push_str(&entry.to_line());
            text.push('\n');
        }
        let tmp = sibling_with_suffix(&self.path, ".tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Convert `run` entries to `fail`, counting the lost run as an
    /// attempt. A `run` entry can only be stale when no other dispatch
    /// is alive, so this must be called while holding the queue lock.
    pub fn recover_crashed_runs(&mut self) -> usize {
        let mut recovered = 0;
        for entry in &mut self.entries {
            if entry.state == EntryState::Run {
                entry.state = EntryState::Fail;
                entry.attempts += 1;
                recovered += 1;
            }
        }
        recovered
    }

    /// Apply the outcome of a finished download to the entry for `url`.
    /// Returns the updated entry, or None when it left the queue while
    /// the download ran. The caller is expected to have reloaded the
    /// queue from disk first, so adds and prunes made meanwhile survive
    /// the final save.
    pub fn apply_verdict(&mut self, url: &str, succeeded: bool) -> Option<QueueEntry> {
        let entry = self.entries.iter_mut().find(|e| e.url == url)?;
        entry.last_attempt = Some(Utc::now());
        if succeeded {
            entry.state = EntryState::Done;
        } else {
            entry.attempts += 1;
            entry.state = if entry.attempts >= DEFAULT_RETRY_LIMIT {
                EntryState::Dead
            } else {
                EntryState::Fail
            };
        }
        Some(entry.clone())
    }

    /// Append a new entry in state `wait`. Duplicate URLs are rejected.
    pub fn add(&mut self, url: &str, tag: &str) -> Result<(), DiscfitError> {
        if url.is_empty() {
            return Err(DiscfitError::Queue("empty url".to_string()));
        }
        if [url, tag].iter().any(|s| s.contains('\t') || s.contains('\n')) {
            return Err(DiscfitError::Queue(
                "tabs and newlines are not allowed in urls or tags".to_string(),
            ));
        }
        if self.entries.iter().any(|e| e.url == url) {
            return Err(DiscfitError::Queue(format!("already queued: {}", url)));
        }
        self.entries.push(QueueEntry {
            state: EntryState::Wait,
            attempts: 0,
            last_attempt: None,
            tag: tag.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }

    /// Index of the first entry ready to dispatch: `wait` entries are
    /// always ready, `fail` entries once their backoff delay has elapsed.
    pub fn next_ready(&self, now: DateTime<Utc>) -> Option<usize> {
        self.entries.iter().position(|e| match e.state {
            EntryState::Wait => true,
            EntryState::Fail => match e.last_attempt {
                None => true,
                Some(at) => {
                    let delay =
                        Duration::minutes(DEFAULT_BACKOFF_MINUTES * i64::from(e.attempts.max(1)));
                    now - at >= delay
                }
            },
            _ => false,
        })
    }

    /// Drop `done` and `dead` entries. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| !matches!(e.state, EntryState::Done | EntryState::Dead));
        before - self.entries.len()
    }
}

/// The lock path for a queue file: the queue's own name plus `.lock`,
/// so queue files differing only in extension never share a lock.
pub fn lock_path_for(queue_path: &Path) -> PathBuf {
    sibling_with_suffix(queue_path, ".lock")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Build the external download command for a tag.
pub fn download_command(tag: &str, url: &str) -> Command {
    if tag == "video" {
        let mut cmd = Command::new("youtube-dl");
        cmd.arg(url);
        cmd
    } else {
        let mut cmd = Command::new("wget");
        cmd.arg("-c").arg(url);
        cmd
    }
}

/// Run the download synchronously. Ok(true) means the downloader exited
/// with status zero.
pub fn run_download(entry: &QueueEntry) -> Result<bool, DiscfitError> {
    let output = download_command(&entry.tag, &entry.url)
        .output()
        .map_err(|e| DiscfitError::Subprocess(format!("failed to launch downloader: {}", e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        eprintln!("[fetchq] downloader said: {}", stderr.trim_end());
    }
    Ok(output.status.success())
}

/// Pid lock keeping dispatches one-at-a-time. Released on drop.
pub struct QueueLock {
    path: PathBuf,
}

impl QueueLock {
    /// Try to take the dispatch lock. `None` means a live dispatch holds
    /// it. A lock whose pid no longer exists is stale and gets broken.
    pub fn acquire(path: &Path) -> Result<Option<QueueLock>, DiscfitError> {
        for _ in 0..2 {
            match fs::OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    write!(file, "{}", std::process::id())?;
                    return Ok(Some(QueueLock {
                        path: path.to_path_buf(),
                    }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if holder_is_alive(path) {
                        return Ok(None);
                    }
                    fs::remove_file(path)?;
                    // Retry the create once now that the stale lock is gone.
                }
                Err(e) => return Err(DiscfitError::Io(e)),
            }
        }
        Ok(None)
    }
}

fn holder_is_alive(path: &Path) -> bool {
    let holder = fs::read_to_string(path).unwrap_or_default();
    match holder.trim().parse::<u32>() {
        Ok(pid) => Path::new(&format!("/proc/{}", pid)).exists(),
        Err(_) => false,
    }
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
