use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use walkdir::WalkDir;

use crate::error::DiscfitError;
use crate::item::Item;

lazy_static! {
    // ls -l: mode, links, owner, group, size, month, day, time/year, name.
    static ref LS_LINE: Regex =
        Regex::new(r"^\S+\s+\S+\s+\S+\s+\S+\s+(\d+)\s+\S+\s+\S+\s+\S+\s+(.+)$")
            .expect("listing pattern must compile");
}

/// Load items from a directory path, a listing file, or `-` for a
/// listing on standard input.
pub fn load_items(source: &str) -> Result<Vec<Item>, DiscfitError> {
    if source == "-" {
        let stdin = io::stdin();
        return items_from_listing(stdin.lock());
    }
    let path = Path::new(source);
    if path.is_dir() {
        items_from_dir(path)
    } else if path.is_file() {
        let file = fs::File::open(path)?;
        items_from_listing(BufReader::new(file))
    } else {
        Err(DiscfitError::Listing(format!("unreadable source '{}'", source)))
    }
}

/// Snapshot the regular files directly inside a directory.
pub fn items_from_dir(path: &Path) -> Result<Vec<Item>, DiscfitError> {
    let mut items = Vec::new();
    for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| DiscfitError::Listing(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = entry
            .metadata()
            .map_err(|e| DiscfitError::Listing(e.to_string()))?;
        items.push(Item::new(
            entry.file_name().to_string_lossy(),
            metadata.len(),
        ));
    }
    Ok(items)
}

/// Parse an `ls -l`-style listing: size from the 5th whitespace field,
/// name from the tail of the line. Lines that do not match are skipped.
pub fn items_from_listing(reader: impl BufRead) -> Result<Vec<Item>, DiscfitError> {
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if let Some(caps) = LS_LINE.captures(&line) {
            let size: u64 = match caps[1].parse() {
                Ok(size) => size,
                Err(_) => continue,
            };
            items.push(Item::new(caps[2].trim_end(), size));
        }
    }
    Ok(items)
}
