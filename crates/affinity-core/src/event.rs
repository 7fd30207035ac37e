//! Interaction events and their validation.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    View,
    Like,
    Unlike,
    Collect,
    Uncollect,
    Search,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::View,
        EventKind::Like,
        EventKind::Unlike,
        EventKind::Collect,
        EventKind::Uncollect,
        EventKind::Search,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::View => "view",
            EventKind::Like => "like",
            EventKind::Unlike => "unlike",
            EventKind::Collect => "collect",
            EventKind::Uncollect => "uncollect",
            EventKind::Search => "search",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user interaction with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Event {
    View {
        #[serde(rename = "itemId")]
        item_id: i64,
        #[serde(rename = "categoryId")]
        category_id: i64,
    },
    Like {
        #[serde(rename = "itemId")]
        item_id: i64,
        #[serde(rename = "categoryId")]
        category_id: i64,
    },
    Unlike {
        #[serde(rename = "itemId")]
        item_id: i64,
    },
    Collect {
        #[serde(rename = "itemId")]
        item_id: i64,
        #[serde(rename = "categoryId")]
        category_id: i64,
    },
    Uncollect {
        #[serde(rename = "itemId")]
        item_id: i64,
    },
    Search { keyword: String },
}

/// The event was rejected before touching the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    UnknownKind(String),
    MissingField {
        kind: EventKind,
        field: &'static str,
    },
    EmptyKeyword,
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::UnknownKind(kind) => write!(
                f,
                "unknown event kind '{kind}' (expected one of: view, like, unlike, collect, uncollect, search)"
            ),
            EventError::MissingField { kind, field } => {
                write!(f, "{kind} event requires {field}")
            }
            EventError::EmptyKeyword => write!(f, "search keyword is empty"),
        }
    }
}

impl std::error::Error for EventError {}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::View { .. } => EventKind::View,
            Event::Like { .. } => EventKind::Like,
            Event::Unlike { .. } => EventKind::Unlike,
            Event::Collect { .. } => EventKind::Collect,
            Event::Uncollect { .. } => EventKind::Uncollect,
            Event::Search { .. } => EventKind::Search,
        }
    }

    /// Build an event from loosely typed input (CLI flags, tool arguments).
    /// Fields the kind does not use are ignored.
    pub fn from_parts(
        kind: &str,
        item_id: Option<i64>,
        category_id: Option<i64>,
        keyword: Option<&str>,
    ) -> Result<Self, EventError> {
        let kind = EventKind::parse(kind).ok_or_else(|| EventError::UnknownKind(kind.to_string()))?;
        let item = || item_id.ok_or(EventError::MissingField { kind, field: "itemId" });
        let category = || {
            category_id.ok_or(EventError::MissingField {
                kind,
                field: "categoryId",
            })
        };

        let event = match kind {
            EventKind::View => Event::View {
                item_id: item()?,
                category_id: category()?,
            },
            EventKind::Like => Event::Like {
                item_id: item()?,
                category_id: category()?,
            },
            EventKind::Unlike => Event::Unlike { item_id: item()? },
            EventKind::Collect => Event::Collect {
                item_id: item()?,
                category_id: category()?,
            },
            EventKind::Uncollect => Event::Uncollect { item_id: item()? },
            EventKind::Search => {
                let keyword = keyword.ok_or(EventError::MissingField {
                    kind,
                    field: "keyword",
                })?;
                Event::search(keyword)?
            }
        };
        Ok(event)
    }

    /// Like toggle as the client UI reports it: `on = false` is an unlike.
    pub fn like(item_id: i64, category_id: i64, on: bool) -> Self {
        if on {
            Event::Like {
                item_id,
                category_id,
            }
        } else {
            Event::Unlike { item_id }
        }
    }

    /// Collect toggle: `on = false` is an uncollect.
    pub fn collect(item_id: i64, category_id: i64, on: bool) -> Self {
        if on {
            Event::Collect {
                item_id,
                category_id,
            }
        } else {
            Event::Uncollect { item_id }
        }
    }

    /// Search event with a normalized keyword.
    pub fn search(keyword: &str) -> Result<Self, EventError> {
        Ok(Event::Search {
            keyword: normalize_keyword(keyword)?,
        })
    }

    /// Check the payload without applying it.
    pub fn validate(&self) -> Result<(), EventError> {
        match self {
            Event::Search { keyword } if keyword.trim().is_empty() => Err(EventError::EmptyKeyword),
            _ => Ok(()),
        }
    }
}

/// Trim and collapse internal whitespace runs to a single space.
pub fn normalize_keyword(raw: &str) -> Result<String, EventError> {
    let collapsed = WHITESPACE_RUN.replace_all(raw.trim(), " ");
    if collapsed.is_empty() {
        return Err(EventError::EmptyKeyword);
    }
    Ok(collapsed.into_owned())
}
