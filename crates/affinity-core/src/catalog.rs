//! Read-only records supplied by the content catalog.

use serde::{Deserialize, Serialize};

/// A content item evaluated for ranking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub id: i64,
    #[serde(rename = "categoryId")]
    pub category_id: i64,
    #[serde(rename = "viewCount", default)]
    pub view_count: u64,
    #[serde(rename = "likeCount", default)]
    pub like_count: u64,
    #[serde(rename = "collectCount", default)]
    pub collect_count: u64,
}

impl CandidateItem {
    pub fn new(id: i64, category_id: i64) -> Self {
        Self {
            id,
            category_id,
            view_count: 0,
            like_count: 0,
            collect_count: 0,
        }
    }

    pub fn with_counts(mut self, views: u64, likes: u64, collects: u64) -> Self {
        self.view_count = views;
        self.like_count = likes;
        self.collect_count = collects;
        self
    }
}

/// A candidate with its computed score attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: CandidateItem,
    #[serde(rename = "recommendScore")]
    pub score: f64,
}

/// Category descriptor from the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A recommended category, named when the catalog knows it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedCategory {
    pub id: i64,
    pub name: Option<String>,
}

/// Resolve category ids to catalog names, preserving order.
pub fn resolve_names(ids: &[i64], catalog: &[Category]) -> Vec<NamedCategory> {
    ids.iter()
        .map(|&id| NamedCategory {
            id,
            name: catalog.iter().find(|c| c.id == id).map(|c| c.name.clone()),
        })
        .collect()
}
