//! On-disk layout and optional `config.toml` overrides.
//!
//! ```text
//! ~/.affinity/
//! ├── config.toml   (optional)
//! └── profiles.db
//! ```

use std::path::{Path, PathBuf};
use std::{env, fs};

use affinity_core::{Caps, Category, EngineConfig, EventWeights, RecommendLimits, ScoringWeights};
use serde::Deserialize;

use crate::error::{Result, StoreError};

pub const CONFIG_FILE: &str = "config.toml";
pub const DB_FILE: &str = "profiles.db";

/// Default base directory for all affinity storage.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".affinity")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Engine tuning plus the category catalog used to name recommendations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub engine: EngineConfig,
    pub categories: Vec<Category>,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    weights: EventWeights,
    caps: Caps,
    scoring: ScoringWeights,
    recommend: RecommendLimits,
    categories: Vec<Category>,
}

impl Settings {
    /// Parse TOML config text and validate it.
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)
            .map_err(|e| StoreError::InvalidData(format!("invalid {CONFIG_FILE}: {e}")))?;
        let engine = EngineConfig {
            weights: file.weights,
            caps: file.caps,
            scoring: file.scoring,
            recommend: file.recommend,
        };
        engine
            .validate()
            .map_err(|e| StoreError::InvalidData(format!("invalid {CONFIG_FILE}: {e}")))?;
        Ok(Self {
            engine,
            categories: file.categories,
        })
    }

    /// Load `config.toml` from `base_dir`. A missing file yields defaults.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => {
                let settings = Self::from_toml(&text)?;
                tracing::info!(
                    "loaded {} ({} categories)",
                    path.display(),
                    settings.categories.len()
                );
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no {} found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(StoreError::Unavailable(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}
