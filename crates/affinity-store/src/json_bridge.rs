use std::fs;
use std::path::Path;

use affinity_core::{Caps, UserProfile, export_json, import_json};

use crate::error::{Result, StoreError};

/// Read a profile export (or a bare profile blob) from disk.
/// Unlike `ProfileStore::load`, a malformed file is an error: the user
/// asked for this specific file.
pub fn read_profile_file(path: &Path, caps: &Caps) -> Result<UserProfile> {
    let json = fs::read_to_string(path).map_err(|e| {
        StoreError::Unavailable(format!("failed to read {}: {e}", path.display()))
    })?;
    Ok(import_json(&json, caps)?)
}

/// Write `profile` to disk inside a versioned export envelope.
pub fn write_profile_file(path: &Path, user_id: &str, profile: &UserProfile) -> Result<()> {
    let json = export_json(user_id, profile)
        .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))?;
    fs::write(path, json).map_err(|e| {
        StoreError::Unavailable(format!("failed to write {}: {e}", path.display()))
    })
}
