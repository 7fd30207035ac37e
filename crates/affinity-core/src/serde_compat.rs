//! JSON wire format for profile blobs and export files.
//!
//! The blob is the camelCase `UserProfile` shape. Decoding tolerates missing
//! or `null` fields and the legacy client field names, then normalizes so a
//! hand-edited or older blob still satisfies every profile invariant.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Caps;
use crate::profile::UserProfile;
use crate::time::now_iso8601;

pub const CURRENT_VERSION: &str = "1";

#[derive(Debug)]
pub enum ProfileError {
    /// The blob is not valid JSON or has the wrong shape.
    Malformed(serde_json::Error),
    /// The top-level value is not a JSON object.
    NotAnObject,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::Malformed(e) => write!(f, "malformed profile: {e}"),
            ProfileError::NotAnObject => write!(f, "malformed profile: expected a JSON object"),
        }
    }
}

impl std::error::Error for ProfileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProfileError::Malformed(e) => Some(e),
            ProfileError::NotAnObject => None,
        }
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(e: serde_json::Error) -> Self {
        ProfileError::Malformed(e)
    }
}

/// Export file envelope.
#[derive(Serialize, Deserialize, Debug)]
pub struct ProfileExport {
    pub version: String,
    pub timestamp: String,
    #[serde(rename = "userId", default)]
    pub user_id: String,
    pub profile: UserProfile,
}

impl ProfileExport {
    pub fn new(user_id: &str, profile: &UserProfile) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            timestamp: now_iso8601(),
            user_id: user_id.to_string(),
            profile: profile.clone(),
        }
    }
}

/// Serialize a profile to its compact storage blob.
pub fn encode_profile(profile: &UserProfile) -> Result<String, serde_json::Error> {
    serde_json::to_string(profile)
}

/// Parse and normalize a storage blob.
pub fn decode_profile(blob: &str, caps: &Caps) -> Result<UserProfile, ProfileError> {
    let value: serde_json::Value = serde_json::from_str(blob)?;
    profile_from_value(value, caps)
}

fn profile_from_value(value: serde_json::Value, caps: &Caps) -> Result<UserProfile, ProfileError> {
    if !value.is_object() {
        return Err(ProfileError::NotAnObject);
    }
    let mut profile: UserProfile = serde_json::from_value(value)?;
    profile.normalize(caps);
    Ok(profile)
}

/// Serialize a profile into a pretty-printed export envelope.
pub fn export_json(user_id: &str, profile: &UserProfile) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ProfileExport::new(user_id, profile))
}

/// Read either an export envelope or a bare profile blob.
pub fn import_json(json: &str, caps: &Caps) -> Result<UserProfile, ProfileError> {
    let mut value: serde_json::Value = serde_json::from_str(json)?;
    let is_envelope = value
        .as_object()
        .is_some_and(|o| o.contains_key("version") && o.contains_key("profile"));
    if is_envelope {
        let profile = value
            .get_mut("profile")
            .map(serde_json::Value::take)
            .unwrap_or_default();
        return profile_from_value(profile, caps);
    }
    profile_from_value(value, caps)
}
