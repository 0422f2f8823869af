use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DiscfitError;

/// A named capacity tier, e.g. an optical disc format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerClass {
    pub label: String,
    pub capacity: u64,
}

impl ContainerClass {
    pub fn new(label: impl Into<String>, capacity: u64) -> Self {
        ContainerClass { label: label.into(), capacity }
    }
}

/// The built-in class table, ascending by capacity.
pub fn default_classes() -> Vec<ContainerClass> {
    vec![
        ContainerClass::new("cd-700", 737_280_000),
        ContainerClass::new("dvd4.5", 4_700_000_000),
        ContainerClass::new("dvd8.5", 8_500_000_000),
        ContainerClass::new("bd-r-25", 25_000_000_000),
    ]
}

/// Load a class table from a JSON object of label -> capacity.
pub fn load_classes(path: &Path) -> Result<Vec<ContainerClass>, DiscfitError> {
    let text = fs::read_to_string(path)?;
    let table: BTreeMap<String, u64> = serde_json::from_str(&text)?;
    let classes = table
        .into_iter()
        .map(|(label, capacity)| ContainerClass { label, capacity })
        .collect();
    validate(classes)
}

/// Sort ascending by capacity and reject empty or duplicate-capacity tables.
pub fn validate(mut classes: Vec<ContainerClass>) -> Result<Vec<ContainerClass>, DiscfitError> {
    if classes.is_empty() {
        return Err(DiscfitError::Config("no container classes defined".to_string()));
    }
    for class in &classes {
        if class.capacity == 0 {
            return Err(DiscfitError::Config(format!(
                "class '{}' has zero capacity",
                class.label
            )));
        }
    }
    classes.sort_by(|a, b| a.capacity.cmp(&b.capacity));
    for pair in classes.windows(2) {
        if pair[0].capacity == pair[1].capacity {
            return Err(DiscfitError::Config(format!(
                "classes '{}' and '{}' share capacity {}",
                pair[0].label, pair[1].label, pair[0].capacity
            )));
        }
    }
    Ok(classes)
}
