/// Maximum number of categories tracked in `category_affinity`
pub const AFFINITY_CAP: usize = 5;

/// Maximum number of entries kept in `view_history`
pub const VIEW_HISTORY_CAP: usize = 50;

/// Maximum number of entries kept in `search_keywords`
pub const SEARCH_KEYWORDS_CAP: usize = 20;

/// Affinity weight of a view
pub const VIEW_WEIGHT: f64 = 1.0;

/// Affinity weight of a like
pub const LIKE_WEIGHT: f64 = 2.0;

/// Affinity weight of a collect (strongest intent)
pub const COLLECT_WEIGHT: f64 = 3.0;

/// Multiplier applied to a matching category's affinity score
pub const AFFINITY_MULTIPLIER: f64 = 10.0;

/// Bonus for items absent from the view history
pub const UNSEEN_BONUS: f64 = 5.0;

/// Popularity terms: `min(count / divisor, cap)`
pub const VIEW_COUNT_DIVISOR: f64 = 100.0;
pub const VIEW_COUNT_CAP: f64 = 10.0;
pub const LIKE_COUNT_DIVISOR: f64 = 10.0;
pub const LIKE_COUNT_CAP: f64 = 5.0;
pub const COLLECT_COUNT_DIVISOR: f64 = 5.0;
pub const COLLECT_COUNT_CAP: f64 = 3.0;

/// Number of categories returned by `recommended_categories`
pub const RECOMMENDED_CATEGORIES: usize = 3;

/// Number of keywords returned by `recommended_keywords`
pub const RECOMMENDED_KEYWORDS: usize = 5;

/// Default page size for `rank_top`
pub const PAGE_SIZE: usize = 20;
