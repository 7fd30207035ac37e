//! Event recording and candidate scoring.
//!
//! `RankingEngine` holds only immutable tuning. The caller owns the
//! `UserProfile` and threads it through every call, so one engine can
//! serve any number of sessions.

use crate::catalog::{CandidateItem, Category, NamedCategory, ScoredItem, resolve_names};
use crate::config::{ConfigError, EngineConfig};
use crate::event::{Event, EventError};
use crate::profile::{AffinityEntry, HistoryEntry, UserProfile};
use crate::time::now_millis;

/// What a recorded event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventOutcome {
    /// A history or keyword collection changed.
    pub history_changed: bool,
    /// Category affinity was bumped.
    pub affinity_bumped: bool,
}

impl EventOutcome {
    pub fn changed(&self) -> bool {
        self.history_changed || self.affinity_bumped
    }
}

#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    config: EngineConfig,
}

impl RankingEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply an event stamped with the current time.
    pub fn record_event(
        &self,
        profile: &mut UserProfile,
        event: &Event,
    ) -> Result<EventOutcome, EventError> {
        self.record_event_at(profile, event, now_millis())
    }

    /// Apply an event stamped with `timestamp` (Unix ms).
    ///
    /// The event is validated before any mutation; a rejected event leaves
    /// the profile untouched.
    pub fn record_event_at(
        &self,
        profile: &mut UserProfile,
        event: &Event,
        timestamp: i64,
    ) -> Result<EventOutcome, EventError> {
        event.validate()?;

        let caps = &self.config.caps;
        let weights = &self.config.weights;
        let mut outcome = EventOutcome::default();

        match event {
            Event::View {
                item_id,
                category_id,
            } => {
                profile.push_view(
                    HistoryEntry::new(*item_id, *category_id, timestamp),
                    caps.view_history,
                );
                outcome.history_changed = true;
                self.bump(profile, *category_id, weights.view, &mut outcome);
            }
            Event::Like {
                item_id,
                category_id,
            } => {
                outcome.history_changed =
                    profile.add_like(HistoryEntry::new(*item_id, *category_id, timestamp));
                self.bump(profile, *category_id, weights.like, &mut outcome);
            }
            Event::Unlike { item_id } => {
                outcome.history_changed = profile.remove_like(*item_id);
            }
            Event::Collect {
                item_id,
                category_id,
            } => {
                outcome.history_changed =
                    profile.add_collect(HistoryEntry::new(*item_id, *category_id, timestamp));
                self.bump(profile, *category_id, weights.collect, &mut outcome);
            }
            Event::Uncollect { item_id } => {
                outcome.history_changed = profile.remove_collect(*item_id);
            }
            Event::Search { keyword } => {
                let keyword = crate::event::normalize_keyword(keyword)?;
                profile.push_keyword(keyword, caps.search_keywords);
                outcome.history_changed = true;
            }
        }

        Ok(outcome)
    }

    // Affinity only grows: repeated likes of an already-liked item still
    // bump, and unlike/uncollect never roll back.
    fn bump(&self, profile: &mut UserProfile, category_id: i64, weight: f64, out: &mut EventOutcome) {
        profile.bump_affinity(category_id, weight, self.config.caps.affinity);
        out.affinity_bumped = true;
    }

    /// Empty the search keyword history. Returns false if it was already empty.
    pub fn clear_keywords(&self, profile: &mut UserProfile) -> bool {
        let had_any = !profile.search_keywords.is_empty();
        profile.search_keywords.clear();
        had_any
    }

    /// Relevance of `item` for this profile. Pure and deterministic.
    pub fn score(&self, profile: &UserProfile, item: &CandidateItem) -> f64 {
        let s = &self.config.scoring;
        let mut score = 0.0;

        if let Some(affinity) = profile.affinity_for(item.category_id) {
            score += affinity * s.affinity_multiplier;
        }
        if !profile.has_viewed(item.id) {
            score += s.unseen_bonus;
        }

        score += (item.view_count as f64 / s.view_divisor).min(s.view_cap);
        score += (item.like_count as f64 / s.like_divisor).min(s.like_cap);
        score += (item.collect_count as f64 / s.collect_divisor).min(s.collect_cap);
        score
    }

    /// Score every candidate and sort descending. The sort is stable, so
    /// equal scores keep their input order.
    pub fn rank(&self, profile: &UserProfile, candidates: &[CandidateItem]) -> Vec<ScoredItem> {
        let mut scored: Vec<ScoredItem> = candidates
            .iter()
            .map(|item| ScoredItem {
                item: item.clone(),
                score: self.score(profile, item),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }

    /// First `limit` entries of `rank`.
    pub fn rank_top(
        &self,
        profile: &UserProfile,
        candidates: &[CandidateItem],
        limit: usize,
    ) -> Vec<ScoredItem> {
        let mut ranked = self.rank(profile, candidates);
        ranked.truncate(limit);
        ranked
    }

    /// `rank_top` with the configured page size.
    pub fn rank_page(&self, profile: &UserProfile, candidates: &[CandidateItem]) -> Vec<ScoredItem> {
        self.rank_top(profile, candidates, self.config.recommend.page_size)
    }

    /// Top categories by affinity.
    ///
    /// Sorts a copy, so a hand-built profile with unordered affinity still
    /// yields the highest scores. Equal scores keep their stored order.
    pub fn recommended_categories(&self, profile: &UserProfile) -> Vec<i64> {
        let mut entries: Vec<&AffinityEntry> = profile.category_affinity.iter().collect();
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        entries
            .into_iter()
            .take(self.config.recommend.categories)
            .map(|e| e.category_id)
            .collect()
    }

    pub fn recommended_category_names(
        &self,
        profile: &UserProfile,
        catalog: &[Category],
    ) -> Vec<NamedCategory> {
        resolve_names(&self.recommended_categories(profile), catalog)
    }

    /// Most recent search keywords.
    pub fn recommended_keywords(&self, profile: &UserProfile) -> Vec<String> {
        profile
            .search_keywords
            .iter()
            .take(self.config.recommend.keywords)
            .cloned()
            .collect()
    }
}
