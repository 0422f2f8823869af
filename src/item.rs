use crate::error::DiscfitError;

/// A candidate file: name plus size in bytes. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    pub size: u64,
}

impl Item {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Item { name: name.into(), size }
    }
}

/// Sort items descending by size so the search tries large items first.
/// Ties break by name to keep runs deterministic.
pub fn sort_for_search(items: &mut [Item]) {
    items.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));
}

/// Drop items below the minimum size.
pub fn apply_min_size(items: Vec<Item>, min_size: u64) -> Vec<Item> {
    items.into_iter().filter(|i| i.size >= min_size).collect()
}

/// Parse a byte count with an optional K/M/G suffix (powers of 1024).
/// A malformed value is a fatal configuration error.
pub fn parse_size(input: &str) -> Result<u64, DiscfitError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DiscfitError::Config("empty size value".to_string()));
    }

    let (digits, multiplier) = match trimmed.chars().last() {
        Some('k') | Some('K') => (&trimmed[..trimmed.len() - 1], 1u64 << 10),
        Some('m') | Some('M') => (&trimmed[..trimmed.len() - 1], 1u64 << 20),
        Some('g') | Some('G') => (&trimmed[..trimmed.len() - 1], 1u64 << 30),
        _ => (trimmed, 1u64),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| DiscfitError::Config(format!("unparseable size '{}'", input)))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| DiscfitError::Config(format!("size '{}' overflows", input)))
}
