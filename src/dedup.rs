use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use walkdir::WalkDir;

use crate::error::DiscfitError;

/// Outcome of one dedup pass over a target tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DedupStats {
    pub examined: usize,
    pub removed: usize,
    pub bytes_freed: u64,
}

struct RefFile {
    path: PathBuf,
    digest: Option<String>,
}

/// MD5 of a file's contents, hex encoded.
pub fn md5_file(path: &Path) -> Result<String, DiscfitError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut context = md5::Context::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        context.consume(&buf[..read]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Index the reference tree by file size. Digests are filled in lazily,
/// only for files whose size collides with a target candidate.
fn index_reference(root: &Path) -> Result<FxHashMap<u64, Vec<RefFile>>, DiscfitError> {
    let mut index: FxHashMap<u64, Vec<RefFile>> = FxHashMap::default();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| DiscfitError::Listing(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry
            .metadata()
            .map_err(|e| DiscfitError::Listing(e.to_string()))?
            .len();
        index.entry(size).or_default().push(RefFile {
            path: entry.into_path(),
            digest: None,
        });
    }
    Ok(index)
}

/// Delete files under `target` that are byte-identical to some file under
/// `reference`. With `dry_run` the deletions are only reported. Files
/// inside the reference tree are never deleted, even when the trees
/// overlap. Per-file I/O errors are reported and skipped.
pub fn dedup_tree(
    reference: &Path,
    target: &Path,
    dry_run: bool,
) -> Result<DedupStats, DiscfitError> {
    let reference_root = fs::canonicalize(reference)?;
    let mut index = index_reference(&reference_root)?;
    let mut stats = DedupStats::default();

    for entry in WalkDir::new(target) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                eprintln!("[treedup] skipping: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();

        if let Ok(canonical) = fs::canonicalize(path) {
            if canonical.starts_with(&reference_root) {
                continue;
            }
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                eprintln!("[treedup] skipping {}: {}", path.display(), e);
                continue;
            }
        };
        stats.examined += 1;

        let Some(candidates) = index.get_mut(&size) else {
            continue;
        };
        let digest = match md5_file(path) {
            Ok(digest) => digest,
            Err(e) => {
                eprintln!("[treedup] skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let mut matched: Option<PathBuf> = None;
        for candidate in candidates.iter_mut() {
            if candidate.digest.is_none() {
                match md5_file(&candidate.path) {
                    Ok(d) => candidate.digest = Some(d),
                    Err(e) => {
                        eprintln!(
                            "[treedup] unreadable reference {}: {}",
                            candidate.path.display(),
                            e
                        );
                        continue;
                    }
                }
            }
            if candidate.digest.as_deref() == Some(digest.as_str()) {
                matched = Some(candidate.path.clone());
                break;
            }
        }

        if let Some(original) = matched {
            println!(
                "[treedup] {} {} (matches {})",
                if dry_run { "would remove" } else { "removing" },
                path.display(),
                original.display()
            );
            if !dry_run {
                if let Err(e) = fs::remove_file(path) {
                    eprintln!("[treedup] failed to remove {}: {}", path.display(), e);
                    continue;
                }
            }
            stats.removed += 1;
            stats.bytes_freed += size;
        }
    }

    Ok(stats)
}
