//! The persisted per-user behavioral profile.
//!
//! All mutation goes through the capped insert helpers here so the
//! invariants hold no matter which caller drives them: capped sequences
//! evict from the tail, histories are unique by item id, and affinity
//! stays sorted descending by score.

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::Caps;

/// Accumulated interest in one content category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffinityEntry {
    #[serde(rename = "categoryId", alias = "id")]
    pub category_id: i64,
    #[serde(default)]
    pub score: f64,
}

/// One recorded interaction with a content item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "itemId", alias = "id")]
    pub item_id: i64,
    #[serde(rename = "categoryId", default)]
    pub category_id: i64,
    /// Unix milliseconds.
    #[serde(default)]
    pub timestamp: i64,
}

impl HistoryEntry {
    pub fn new(item_id: i64, category_id: i64, timestamp: i64) -> Self {
        Self {
            item_id,
            category_id,
            timestamp,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    #[serde(
        rename = "categoryAffinity",
        alias = "categories",
        deserialize_with = "null_as_default"
    )]
    pub category_affinity: Vec<AffinityEntry>,
    #[serde(rename = "viewHistory", deserialize_with = "null_as_default")]
    pub view_history: Vec<HistoryEntry>,
    #[serde(rename = "likeHistory", deserialize_with = "null_as_default")]
    pub like_history: Vec<HistoryEntry>,
    #[serde(rename = "collectHistory", deserialize_with = "null_as_default")]
    pub collect_history: Vec<HistoryEntry>,
    #[serde(
        rename = "searchKeywords",
        alias = "keywords",
        deserialize_with = "null_as_default"
    )]
    pub search_keywords: Vec<String>,
}

/// An explicit `null` field is treated like a missing one.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl UserProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.category_affinity.is_empty()
            && self.view_history.is_empty()
            && self.like_history.is_empty()
            && self.collect_history.is_empty()
            && self.search_keywords.is_empty()
    }

    pub fn affinity_for(&self, category_id: i64) -> Option<f64> {
        self.category_affinity
            .iter()
            .find(|e| e.category_id == category_id)
            .map(|e| e.score)
    }

    pub fn has_viewed(&self, item_id: i64) -> bool {
        self.view_history.iter().any(|e| e.item_id == item_id)
    }

    pub fn has_liked(&self, item_id: i64) -> bool {
        self.like_history.iter().any(|e| e.item_id == item_id)
    }

    pub fn has_collected(&self, item_id: i64) -> bool {
        self.collect_history.iter().any(|e| e.item_id == item_id)
    }

    /// Move-to-front insert into the view history, evicting the oldest
    /// entries beyond `cap`.
    pub(crate) fn push_view(&mut self, entry: HistoryEntry, cap: usize) {
        self.view_history.retain(|e| e.item_id != entry.item_id);
        self.view_history.insert(0, entry);
        self.view_history.truncate(cap);
    }

    /// Returns false when the item was already liked.
    pub(crate) fn add_like(&mut self, entry: HistoryEntry) -> bool {
        insert_unique(&mut self.like_history, entry)
    }

    /// Returns false when the item was not liked.
    pub(crate) fn remove_like(&mut self, item_id: i64) -> bool {
        remove_by_item(&mut self.like_history, item_id)
    }

    pub(crate) fn add_collect(&mut self, entry: HistoryEntry) -> bool {
        insert_unique(&mut self.collect_history, entry)
    }

    pub(crate) fn remove_collect(&mut self, item_id: i64) -> bool {
        remove_by_item(&mut self.collect_history, item_id)
    }

    /// Move-to-front insert of an already normalized keyword.
    pub(crate) fn push_keyword(&mut self, keyword: String, cap: usize) {
        self.search_keywords.retain(|k| *k != keyword);
        self.search_keywords.insert(0, keyword);
        self.search_keywords.truncate(cap);
    }

    /// Add `weight` to a category's score (inserting it if unknown), re-sort
    /// descending and keep the top `cap`.
    ///
    /// The sort is stable: equal scores keep their previous relative order
    /// and a newly inserted category sorts after existing ties, so it is the
    /// first to be evicted when it ties the last place.
    pub(crate) fn bump_affinity(&mut self, category_id: i64, weight: f64, cap: usize) {
        match self
            .category_affinity
            .iter_mut()
            .find(|e| e.category_id == category_id)
        {
            Some(entry) => entry.score += weight,
            None => self.category_affinity.push(AffinityEntry {
                category_id,
                score: weight,
            }),
        }
        sort_affinity(&mut self.category_affinity);
        self.category_affinity.truncate(cap);
    }

    /// Repair a profile that came from outside the engine: drop duplicates
    /// (first occurrence wins), drop negative or non-finite affinity, drop
    /// blank keywords, re-sort affinity and enforce caps.
    ///
    /// Returns true when anything changed.
    pub fn normalize(&mut self, caps: &Caps) -> bool {
        let before = self.clone();

        self.category_affinity
            .retain(|e| e.score.is_finite() && e.score >= 0.0);
        let mut seen = std::collections::HashSet::new();
        self.category_affinity.retain(|e| seen.insert(e.category_id));
        sort_affinity(&mut self.category_affinity);
        self.category_affinity.truncate(caps.affinity);

        dedup_by_item(&mut self.view_history);
        self.view_history.truncate(caps.view_history);
        dedup_by_item(&mut self.like_history);
        dedup_by_item(&mut self.collect_history);

        let mut seen = std::collections::HashSet::new();
        self.search_keywords
            .retain(|k| !k.trim().is_empty() && seen.insert(k.clone()));
        self.search_keywords.truncate(caps.search_keywords);

        *self != before
    }
}

fn sort_affinity(entries: &mut [AffinityEntry]) {
    entries.sort_by(|a, b| b.score.total_cmp(&a.score));
}

fn insert_unique(history: &mut Vec<HistoryEntry>, entry: HistoryEntry) -> bool {
    if history.iter().any(|e| e.item_id == entry.item_id) {
        return false;
    }
    history.push(entry);
    true
}

fn remove_by_item(history: &mut Vec<HistoryEntry>, item_id: i64) -> bool {
    let len = history.len();
    history.retain(|e| e.item_id != item_id);
    history.len() != len
}

fn dedup_by_item(history: &mut Vec<HistoryEntry>) {
    let mut seen = std::collections::HashSet::new();
    history.retain(|e| seen.insert(e.item_id));
}
