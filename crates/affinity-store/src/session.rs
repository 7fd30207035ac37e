//! One user's profile bound to an engine and a store.
//!
//! The session owns the only live copy of the profile. Every mutation is
//! applied in memory first and then persisted; a failed save is reported
//! through `Persist` and never rolls the in-memory profile back.

use affinity_core::{
    CandidateItem, Category, Event, EventError, NamedCategory, RankingEngine, ScoredItem,
    UserProfile,
};

use crate::error::StoreError;
use crate::profile_store::ProfileStore;

/// Result of the persistence step after a mutation.
#[must_use]
#[derive(Debug)]
pub enum Persist {
    Saved,
    /// Nothing changed, nothing written.
    Unchanged,
    /// The in-memory profile is updated but the store rejected the write.
    Failed(StoreError),
}

impl Persist {
    pub fn is_saved(&self) -> bool {
        matches!(self, Persist::Saved)
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            Persist::Failed(e) => Some(e),
            _ => None,
        }
    }
}

pub struct Session<S: ProfileStore> {
    user_id: String,
    profile: UserProfile,
    engine: RankingEngine,
    store: S,
}

impl<S: ProfileStore> Session<S> {
    /// Load the user's profile (or start empty) and bind it to `store`.
    pub fn open(store: S, user_id: &str, engine: RankingEngine) -> Self {
        let profile = store.load(user_id);
        Self {
            user_id: user_id.to_string(),
            profile,
            engine,
            store,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn engine(&self) -> &RankingEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply an event and persist. Invalid events are rejected without
    /// touching the profile or the store.
    pub fn record(&mut self, event: &Event) -> Result<Persist, EventError> {
        let outcome = self.engine.record_event(&mut self.profile, event)?;
        if !outcome.changed() {
            return Ok(Persist::Unchanged);
        }
        Ok(self.persist())
    }

    pub fn clear_keywords(&mut self) -> Persist {
        if self.engine.clear_keywords(&mut self.profile) {
            self.persist()
        } else {
            Persist::Unchanged
        }
    }

    /// Swap in a profile from elsewhere (import) and persist it.
    pub fn replace_profile(&mut self, mut profile: UserProfile) -> Persist {
        profile.normalize(&self.engine.config().caps);
        self.profile = profile;
        self.persist()
    }

    pub fn rank(&self, candidates: &[CandidateItem]) -> Vec<ScoredItem> {
        self.engine.rank(&self.profile, candidates)
    }

    pub fn rank_top(&self, candidates: &[CandidateItem], limit: usize) -> Vec<ScoredItem> {
        self.engine.rank_top(&self.profile, candidates, limit)
    }

    pub fn recommended_categories(&self) -> Vec<i64> {
        self.engine.recommended_categories(&self.profile)
    }

    pub fn recommended_category_names(&self, catalog: &[Category]) -> Vec<NamedCategory> {
        self.engine.recommended_category_names(&self.profile, catalog)
    }

    pub fn recommended_keywords(&self) -> Vec<String> {
        self.engine.recommended_keywords(&self.profile)
    }

    pub fn into_profile(self) -> UserProfile {
        self.profile
    }

    fn persist(&self) -> Persist {
        match self.store.save(&self.user_id, &self.profile) {
            Ok(()) => Persist::Saved,
            Err(e) => {
                tracing::warn!(
                    user_id = %self.user_id,
                    "profile not persisted, continuing in memory: {e}"
                );
                Persist::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile_store::MemoryProfileStore;
    use affinity_core::EngineConfig;

    fn open(store: &MemoryProfileStore) -> Session<&MemoryProfileStore> {
        Session::open(store, "u", RankingEngine::default())
    }

    #[test]
    fn test_record_persists() {
        let store = MemoryProfileStore::new();
        let mut session = open(&store);
        let status = session.record(&Event::like(1, 2, true)).unwrap();
        assert!(status.is_saved());

        let reloaded = open(&store);
        assert_eq!(reloaded.profile(), session.profile());
        assert_eq!(reloaded.recommended_categories(), vec![2]);
    }

    #[test]
    fn test_noop_event_skips_save() {
        let store = MemoryProfileStore::new();
        let mut session = open(&store);
        let status = session.record(&Event::Unlike { item_id: 3 }).unwrap();
        assert!(matches!(status, Persist::Unchanged));
        assert!(store.raw("u").is_none());
    }

    #[test]
    fn test_invalid_event_is_rejected() {
        let store = MemoryProfileStore::new();
        let mut session = open(&store);
        let bad = Event::Search {
            keyword: String::new(),
        };
        assert!(session.record(&bad).is_err());
        assert!(session.profile().is_empty());
        assert!(store.raw("u").is_none());
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let store = MemoryProfileStore::new();
        let mut session = open(&store);
        store.set_unavailable(true);

        let status = session.record(&Event::collect(1, 4, true)).unwrap();
        let err = status.error().expect("save should fail");
        assert!(err.is_unavailable());
        assert!(session.profile().has_collected(1));

        let ranked = session.rank(&[CandidateItem::new(9, 1), CandidateItem::new(8, 4)]);
        assert_eq!(ranked[0].item.id, 8);

        store.set_unavailable(false);
        assert!(session.record(&Event::search("tea").unwrap()).unwrap().is_saved());
        assert!(open(&store).profile().has_collected(1));
    }

    #[test]
    fn test_unavailable_on_open_starts_empty() {
        let store = MemoryProfileStore::new();
        assert!(open(&store).record(&Event::like(1, 1, true)).unwrap().is_saved());
        store.set_unavailable(true);
        let session = open(&store);
        assert!(session.profile().is_empty());
        let ranked = session.rank(&[
            CandidateItem::new(1, 1).with_counts(10, 0, 0),
            CandidateItem::new(2, 1).with_counts(500, 0, 0),
        ]);
        assert_eq!(ranked[0].item.id, 2);
    }

    #[test]
    fn test_clear_keywords() {
        let store = MemoryProfileStore::new();
        let mut session = open(&store);
        assert!(matches!(session.clear_keywords(), Persist::Unchanged));
        assert!(session.record(&Event::search("kites").unwrap()).unwrap().is_saved());
        assert_eq!(session.recommended_keywords(), vec!["kites"]);
        assert!(session.clear_keywords().is_saved());
        assert!(open(&store).recommended_keywords().is_empty());
    }

    #[test]
    fn test_replace_profile_normalizes() {
        let store = MemoryProfileStore::new();
        let mut cfg = EngineConfig::default();
        cfg.caps.search_keywords = 1;
        let mut session = Session::open(&store, "u", RankingEngine::new(cfg).unwrap());

        let mut incoming = UserProfile::new();
        incoming.search_keywords = vec!["a".into(), "b".into()];
        assert!(session.replace_profile(incoming).is_saved());
        assert_eq!(session.profile().search_keywords, vec!["a"]);
    }
}
