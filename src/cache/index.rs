//! Category index derived from a sorted post sequence.

use std::collections::BTreeMap;

use crate::domain::posts::{Post, normalize_category};

#[derive(Debug, Clone, Default)]
struct CategoryEntry {
    label: String,
    positions: Vec<usize>,
}

/// Maps lower-cased category names to positions in the owning snapshot.
///
/// Positions are ascending, so iterating them preserves the global
/// `pub_date`-descending order.
#[derive(Debug, Clone, Default)]
pub(crate) struct CategoryIndex {
    entries: BTreeMap<String, CategoryEntry>,
}

impl CategoryIndex {
    pub(crate) fn build(posts: &[Post]) -> Self {
        let mut entries: BTreeMap<String, CategoryEntry> = BTreeMap::new();
        for (position, post) in posts.iter().enumerate() {
            for label in &post.categories {
                let entry = entries
                    .entry(normalize_category(label))
                    .or_insert_with(|| CategoryEntry {
                        label: label.trim().to_string(),
                        positions: Vec::new(),
                    });
                if entry.positions.last() != Some(&position) {
                    entry.positions.push(position);
                }
            }
        }
        Self { entries }
    }

    pub(crate) fn positions(&self, category: &str) -> &[usize] {
        self.entries
            .get(&normalize_category(category))
            .map(|entry| entry.positions.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &str, &[usize])> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry.label.as_str(), entry.positions.as_slice()))
    }

    pub(crate) fn get(&self, category: &str) -> Option<(&str, &str, &[usize])> {
        self.entries
            .get_key_value(&normalize_category(category))
            .map(|(key, entry)| (key.as_str(), entry.label.as_str(), entry.positions.as_slice()))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
