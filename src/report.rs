use itertools::Itertools;

use crate::container::ContainerClass;
use crate::finder::ResultSet;
use crate::item::Item;

/// One ranked line of the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub class_label: String,
    pub member_names: Vec<String>,
    pub total: u64,
    pub remaining: u64,
}

/// Flatten the result set and rank it tightest fit first across all
/// classes combined. Ties break by class label then member names so the
/// output is stable between runs.
pub fn rank(
    results: &ResultSet,
    items: &[Item],
    classes: &[ContainerClass],
    top_n: usize,
) -> Vec<ReportEntry> {
    results
        .iter()
        .map(|(key, size)| {
            let class = &classes[key.class];
            let member_names: Vec<String> = key
                .members
                .iter()
                .map(|&id| items[id as usize].name.clone())
                .collect();
            ReportEntry {
                class_label: class.label.clone(),
                member_names,
                total: size,
                remaining: class.capacity - size,
            }
        })
        .sorted_by(|a, b| {
            a.remaining
                .cmp(&b.remaining)
                .then_with(|| a.class_label.cmp(&b.class_label))
                .then_with(|| a.member_names.cmp(&b.member_names))
        })
        .take(top_n)
        .collect()
}

/// Render ranked entries as the human-readable report.
pub fn render(entries: &[ReportEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.class_label);
        out.push_str(":\n");
        if entry.member_names.is_empty() {
            out.push_str("  (no fitting combination)\n");
        }
        for name in &entry.member_names {
            out.push_str("  ");
            out.push_str(name);
            out.push('\n');
        }
        out.push_str(&format!(
            "= {} ({} remaining)\n",
            format_count(entry.total),
            format_count(entry.remaining)
        ));
    }
    out
}

/// Format an integer with thousands separators.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
