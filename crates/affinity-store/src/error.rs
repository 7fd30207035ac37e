use std::fmt;

use affinity_core::ProfileError;

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    /// The backing store could not be reached or written.
    Unavailable(String),
    /// A stored blob failed shape validation.
    Malformed(String),
    InvalidData(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "SQLite error: {e}"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::Malformed(msg) => write!(f, "malformed profile: {msg}"),
            StoreError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<ProfileError> for StoreError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::Malformed(e) => StoreError::Malformed(e.to_string()),
            ProfileError::NotAnObject => StoreError::Malformed("expected a JSON object".into()),
        }
    }
}

impl StoreError {
    /// True for read/write failures of the backend itself, as opposed to
    /// bad data.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Sqlite(_) | StoreError::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
