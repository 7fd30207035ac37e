//! Client-local personalization and ranking engine.
//!
//! Observes a user's interaction events (view, like, collect, search),
//! folds them into a compact behavioral profile, and scores candidate
//! content items against that profile so a list can be sorted by inferred
//! relevance.
//!
//! Zero I/O: the engine is stateless, callers own the `UserProfile` and
//! persistence lives in `affinity-store`.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod engine;
pub mod event;
pub mod profile;
pub mod serde_compat;
pub mod time;

pub use catalog::{CandidateItem, Category, NamedCategory, ScoredItem, resolve_names};
pub use config::{Caps, ConfigError, EngineConfig, EventWeights, RecommendLimits, ScoringWeights};
pub use constants::{AFFINITY_CAP, PAGE_SIZE, SEARCH_KEYWORDS_CAP, VIEW_HISTORY_CAP};
pub use engine::{EventOutcome, RankingEngine};
pub use event::{Event, EventError, EventKind, normalize_keyword};
pub use profile::{AffinityEntry, HistoryEntry, UserProfile};
pub use serde_compat::{
    CURRENT_VERSION, ProfileError, ProfileExport, decode_profile, encode_profile, export_json,
    import_json,
};
pub use time::{millis_to_iso8601, now_iso8601, now_millis};
