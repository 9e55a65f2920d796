/// Engine configuration, loaded from RON.
///
/// Every field has a default, so an empty `()` file is a valid config and
/// a partial file only overrides what it names.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::achievements::AchievementRules;
use crate::core::audio::AudioSettings;
use crate::core::persistence::StorageKeys;
use crate::schema::ids::SceneId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub opening_scene: SceneId,
    /// Character id excluded from the affection table.
    pub protagonist_id: String,
    /// Speaker ids rendered with an empty name.
    pub narrator_speakers: Vec<String>,
    /// Speaker ids that need no character entry.
    pub free_speakers: Vec<String>,
    pub image_root: String,
    pub autoplay_interval_ms: u64,
    pub typewriter_char_ms: u64,
    pub notice_dismiss_ms: u64,
    /// Upper bound on events processed without player input in one step.
    pub max_auto_steps: usize,
    pub storage: StorageKeys,
    pub achievements: AchievementRules,
    pub audio: AudioSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            opening_scene: SceneId::from("opening"),
            protagonist_id: "protagonist".to_string(),
            narrator_speakers: vec!["旁白".to_string(), "narrator".to_string()],
            free_speakers: vec!["旁白".to_string(), "narrator".to_string(), "system".to_string()],
            image_root: "assets/images/characters".to_string(),
            autoplay_interval_ms: 3000,
            typewriter_char_ms: 30,
            notice_dismiss_ms: 2000,
            max_auto_steps: 256,
            storage: StorageKeys::default(),
            achievements: AchievementRules::default(),
            audio: AudioSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load a config from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a config from a RON string.
    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }

    pub fn is_narrator(&self, speaker: &str) -> bool {
        self.narrator_speakers.iter().any(|s| s == speaker)
    }
}
