/// Script data — the immutable scene, character and achievement tables.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};

use super::event::{Dialogue, NarrativeEvent};
use super::ids::{AchievementId, CharacterId, SceneId};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The whole narrative, loaded once per session and never mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptData {
    #[serde(default)]
    pub scenes: HashMap<SceneId, Scene>,
    #[serde(default)]
    pub characters: HashMap<CharacterId, CharacterDef>,
    #[serde(default, rename = "achievements")]
    pub achievement_catalog: HashMap<AchievementId, AchievementDef>,
}

/// A named, ordered sequence of events with its backdrop and music.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default, rename = "background", skip_serializing_if = "Option::is_none")]
    pub background_id: Option<String>,
    #[serde(default, rename = "music", skip_serializing_if = "Option::is_none")]
    pub music_id: Option<String>,
    #[serde(rename = "script", alias = "dialogues", default)]
    pub events: Vec<NarrativeEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterDef {
    pub name: String,
    #[serde(default = "default_color", alias = "displayColor")]
    pub color: String,
    /// Expression name to image file name.
    #[serde(default)]
    pub expressions: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_image: Option<String>,
    /// Image directory; the character id is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

impl CharacterDef {
    /// Resolve the sprite file for an expression, falling back to the
    /// character's default image.
    pub fn image_for(&self, expression: &str) -> Option<&str> {
        self.expressions
            .get(expression)
            .or(self.default_image.as_ref())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

fn default_color() -> String {
    "#ffffff".to_string()
}

impl ScriptData {
    /// Load script data from a JSON file.
    pub fn load_from_json(path: &Path) -> Result<ScriptData, ScriptError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_json(&contents)
    }

    /// Parse script data from a JSON string.
    pub fn parse_json(input: &str) -> Result<ScriptData, ScriptError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Load script data, substituting the built-in fallback scene when the
    /// file cannot be read or parsed.
    pub fn load_or_fallback(path: &Path) -> ScriptData {
        match Self::load_from_json(path) {
            Ok(script) => {
                info!(
                    path = %path.display(),
                    scenes = script.scenes.len(),
                    characters = script.characters.len(),
                    "script data loaded"
                );
                script
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "script data failed to load, using fallback scene");
                Self::fallback()
            }
        }
    }

    /// Minimal one-line script used when the real one is unavailable.
    pub fn fallback() -> ScriptData {
        let opening = Scene {
            background_id: Some("school.jpg".to_string()),
            music_id: Some("default".to_string()),
            events: vec![NarrativeEvent::Dialogue(Dialogue {
                speaker: Some("system".to_string()),
                text: "Welcome to the campus story!".to_string(),
                affection_changes: Default::default(),
                character: None,
                position: None,
            })],
        };
        ScriptData {
            scenes: HashMap::from([(SceneId::from("opening"), opening)]),
            characters: HashMap::new(),
            achievement_catalog: HashMap::new(),
        }
    }

    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.get(id)
    }

    pub fn character(&self, id: &str) -> Option<&CharacterDef> {
        self.characters.get(id)
    }

    pub fn achievement(&self, id: &str) -> Option<&AchievementDef> {
        self.achievement_catalog.get(id)
    }
}

impl Scene {
    pub fn event(&self, index: usize) -> Option<&NarrativeEvent> {
        self.events.get(index)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r##"{
        "scenes": {
            "opening": {
                "background": "school_gate.jpg",
                "music": "opening_theme",
                "script": [
                    { "type": "dialogue", "speaker": "narrator", "text": "Spring again." },
                    { "type": "scene_transition", "nextScene": "canteen" }
                ]
            },
            "canteen": {
                "background": "canteen.jpg",
                "dialogues": [
                    { "type": "ending", "endingId": "lunch_ending", "text": "Lunch forever." }
                ]
            }
        },
        "characters": {
            "heroine1": {
                "name": "Hana",
                "color": "#ff88aa",
                "expressions": { "happy": "smile.png" },
                "defaultImage": "1.png"
            },
            "protagonist": { "name": "You" }
        },
        "achievements": {
            "first_choice": { "name": "First Choice", "description": "Made a choice", "icon": "*" }
        }
    }"##;

    #[test]
    fn parse_script_tables() {
        let script = ScriptData::parse_json(SCRIPT).unwrap();
        assert_eq!(script.scenes.len(), 2);
        assert_eq!(script.characters.len(), 2);
        assert!(script.achievement("first_choice").is_some());

        let opening = script.scene("opening").unwrap();
        assert_eq!(opening.background_id.as_deref(), Some("school_gate.jpg"));
        assert_eq!(opening.len(), 2);
        assert_eq!(opening.event(1).unwrap().kind(), "scene_transition");
    }

    #[test]
    fn dialogues_alias_and_missing_music() {
        let script = ScriptData::parse_json(SCRIPT).unwrap();
        let canteen = script.scene("canteen").unwrap();
        assert!(canteen.music_id.is_none());
        assert_eq!(canteen.len(), 1);
    }

    #[test]
    fn character_defaults_and_images() {
        let script = ScriptData::parse_json(SCRIPT).unwrap();
        let hana = script.character("heroine1").unwrap();
        assert_eq!(hana.color, "#ff88aa");
        assert_eq!(hana.image_for("happy"), Some("smile.png"));
        assert_eq!(hana.image_for("angry"), Some("1.png"));

        let you = script.character("protagonist").unwrap();
        assert_eq!(you.color, "#ffffff");
        assert_eq!(you.image_for("happy"), None);
    }

    #[test]
    fn fallback_has_opening_scene() {
        let script = ScriptData::fallback();
        let opening = script.scene("opening").unwrap();
        assert_eq!(opening.len(), 1);
        assert!(matches!(opening.event(0), Some(NarrativeEvent::Dialogue(_))));
    }

    #[test]
    fn load_or_fallback_on_missing_file() {
        let script = ScriptData::load_or_fallback(Path::new("tests/fixtures/does_not_exist.json"));
        assert!(script.scene("opening").is_some());
        assert!(script.characters.is_empty());
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(matches!(
            ScriptData::parse_json("{ not json"),
            Err(ScriptError::Json(_))
        ));
    }
}
