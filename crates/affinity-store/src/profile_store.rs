//! The `ProfileStore` seam between the engine and durable storage.
//!
//! `load` never fails: a missing, unreadable or malformed profile all
//! degrade to the default empty profile so ranking always has something to
//! work with. `save` reports failures but never touches the caller's
//! in-memory profile.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use affinity_core::{Caps, UserProfile, decode_profile, encode_profile};

use crate::error::{Result, StoreError};
use crate::store::Store;

pub trait ProfileStore {
    /// Stored profile for `user_id`; `Ok(None)` when none was ever saved.
    fn try_load(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Persist the full profile, overwriting any prior value.
    fn save(&self, user_id: &str, profile: &UserProfile) -> Result<()>;

    /// Stored profile, or a fresh default when absent, unreadable or malformed.
    fn load(&self, user_id: &str) -> UserProfile {
        match self.try_load(user_id) {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::debug!(user_id, "no stored profile, starting empty");
                UserProfile::default()
            }
            Err(e) if e.is_unavailable() => {
                tracing::warn!(user_id, "profile store unavailable, using empty profile: {e}");
                UserProfile::default()
            }
            Err(e) => {
                tracing::warn!(user_id, "discarding stored profile: {e}");
                UserProfile::default()
            }
        }
    }
}

impl<S: ProfileStore + ?Sized> ProfileStore for &S {
    fn try_load(&self, user_id: &str) -> Result<Option<UserProfile>> {
        (**self).try_load(user_id)
    }

    fn save(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        (**self).save(user_id, profile)
    }
}

impl<S: ProfileStore + ?Sized> ProfileStore for Box<S> {
    fn try_load(&self, user_id: &str) -> Result<Option<UserProfile>> {
        (**self).try_load(user_id)
    }

    fn save(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        (**self).save(user_id, profile)
    }
}

impl<S: ProfileStore + ?Sized> ProfileStore for Arc<S> {
    fn try_load(&self, user_id: &str) -> Result<Option<UserProfile>> {
        (**self).try_load(user_id)
    }

    fn save(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        (**self).save(user_id, profile)
    }
}

/// Durable store on SQLite.
pub struct SqliteProfileStore {
    store: Store,
    caps: Caps,
}

impl SqliteProfileStore {
    pub fn open(path: &Path, caps: Caps) -> Result<Self> {
        Ok(Self {
            store: Store::open(path)?,
            caps,
        })
    }

    pub fn open_in_memory(caps: Caps) -> Result<Self> {
        Ok(Self {
            store: Store::open_in_memory()?,
            caps,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl ProfileStore for SqliteProfileStore {
    fn try_load(&self, user_id: &str) -> Result<Option<UserProfile>> {
        match self.store.get_profile_blob(user_id)? {
            Some(blob) => Ok(Some(decode_profile(&blob, &self.caps)?)),
            None => Ok(None),
        }
    }

    fn save(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        let blob = encode_profile(profile)
            .map_err(|e| StoreError::InvalidData(format!("failed to encode profile: {e}")))?;
        self.store.put_profile_blob(user_id, &blob)?;
        tracing::debug!(user_id, bytes = blob.len(), "profile saved");
        Ok(())
    }
}

/// Process-local store holding encoded blobs, so the same decode path runs
/// as with SQLite. Can be switched offline to exercise failure handling.
#[derive(Default)]
pub struct MemoryProfileStore {
    blobs: Mutex<HashMap<String, String>>,
    caps: Caps,
    unavailable: AtomicBool,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_caps(caps: Caps) -> Self {
        Self {
            caps,
            ..Self::default()
        }
    }

    /// Make every subsequent read and write fail as `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Store a raw blob as-is, bypassing encoding.
    pub fn insert_raw(&self, user_id: &str, blob: &str) {
        self.lock().insert(user_id.to_string(), blob.to_string());
    }

    pub fn raw(&self, user_id: &str) -> Option<String> {
        self.lock().get(user_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map still holds whole blobs; keep using it.
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

impl ProfileStore for MemoryProfileStore {
    fn try_load(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.check_available()?;
        match self.raw(user_id) {
            Some(blob) => Ok(Some(decode_profile(&blob, &self.caps)?)),
            None => Ok(None),
        }
    }

    fn save(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        self.check_available()?;
        let blob = encode_profile(profile)
            .map_err(|e| StoreError::InvalidData(format!("failed to encode profile: {e}")))?;
        self.insert_raw(user_id, &blob);
        Ok(())
    }
}
