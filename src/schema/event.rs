use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{CharacterId, EndingId, SceneId};

/// Signed affection changes keyed by character.
pub type AffectionDelta = BTreeMap<CharacterId, i32>;

/// One entry of a scene's script, tagged by its `type` field.
///
/// Any `type` the engine does not know deserializes to `Unknown`, which the
/// interpreter skips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NarrativeEvent {
    Dialogue(Dialogue),
    Character(CharacterCue),
    Choice(Choice),
    Ending(Ending),
    SceneTransition(SceneTransition),
    #[serde(other)]
    Unknown,
}

impl NarrativeEvent {
    /// Returns the script tag for this event kind (e.g., "scene_transition").
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dialogue(_) => "dialogue",
            Self::Character(_) => "character",
            Self::Choice(_) => "choice",
            Self::Ending(_) => "ending",
            Self::SceneTransition(_) => "scene_transition",
            Self::Unknown => "unknown",
        }
    }

    /// Choices and endings hold the cursor until resolved explicitly;
    /// a plain "continue" does nothing while one is displayed.
    pub fn holds_cursor(&self) -> bool {
        matches!(self, Self::Choice(_) | Self::Ending(_))
    }

    /// Whether the scene may legally stop after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ending(_) | Self::SceneTransition(_))
    }
}

/// A spoken or narrated line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialogue {
    #[serde(default, alias = "speakerId")]
    pub speaker: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub affection_changes: AffectionDelta,
    /// Sprite to bring on stage together with the line.
    #[serde(default, alias = "characterId", skip_serializing_if = "Option::is_none")]
    pub character: Option<CharacterId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

/// Stage direction: put a character sprite on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterCue {
    #[serde(alias = "character")]
    pub character_id: CharacterId,
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default = "default_expression")]
    pub expression: String,
}

/// A branching point. The prompt is stored under `question` in script data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(rename = "question", alias = "text", alias = "prompt", default)]
    pub prompt: String,
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub text: String,
    #[serde(rename = "nextScene", alias = "nextSceneId")]
    pub next_scene: SceneId,
    #[serde(
        rename = "affectionChange",
        alias = "affectionChanges",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub affection_change: AffectionDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ending {
    #[serde(rename = "endingId", alias = "id")]
    pub ending_id: EndingId,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneTransition {
    #[serde(rename = "nextScene", alias = "nextSceneId")]
    pub next_scene: SceneId,
}

pub(crate) fn default_position() -> String {
    "center".to_string()
}

fn default_expression() -> String {
    "normal".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialogue_with_affection_changes() {
        let json = r#"{
            "type": "dialogue",
            "speaker": "heroine1",
            "text": "Good morning!",
            "affectionChanges": { "heroine1": 3, "heroine2": -2 }
        }"#;
        let event: NarrativeEvent = serde_json::from_str(json).unwrap();
        let NarrativeEvent::Dialogue(line) = event else {
            panic!("expected dialogue");
        };
        assert_eq!(line.speaker.as_deref(), Some("heroine1"));
        assert_eq!(line.affection_changes["heroine1"], 3);
        assert_eq!(line.affection_changes["heroine2"], -2);
        assert!(line.character.is_none());
    }

    #[test]
    fn dialogue_accepts_null_character() {
        let json = r#"{"type": "dialogue", "speaker": "system", "text": "hi", "character": null}"#;
        let event: NarrativeEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, NarrativeEvent::Dialogue(Dialogue { character: None, .. })));
    }

    #[test]
    fn character_cue_defaults() {
        let json = r#"{"type": "character", "characterId": "heroine2"}"#;
        let event: NarrativeEvent = serde_json::from_str(json).unwrap();
        let NarrativeEvent::Character(cue) = event else {
            panic!("expected character cue");
        };
        assert_eq!(cue.character_id.as_str(), "heroine2");
        assert_eq!(cue.position, "center");
        assert_eq!(cue.expression, "normal");
    }

    #[test]
    fn choice_uses_question_and_next_scene() {
        let json = r#"{
            "type": "choice",
            "question": "Where to?",
            "options": [
                { "text": "Library", "nextScene": "library" },
                { "text": "Canteen", "nextScene": "canteen", "affectionChange": { "heroine1": 5 } }
            ]
        }"#;
        let event: NarrativeEvent = serde_json::from_str(json).unwrap();
        let NarrativeEvent::Choice(choice) = event else {
            panic!("expected choice");
        };
        assert_eq!(choice.prompt, "Where to?");
        assert_eq!(choice.options.len(), 2);
        assert!(choice.options[0].affection_change.is_empty());
        assert_eq!(choice.options[1].next_scene.as_str(), "canteen");
        assert_eq!(choice.options[1].affection_change["heroine1"], 5);
    }

    #[test]
    fn choice_prompt_alias_text() {
        let json = r#"{"type": "choice", "text": "Pick", "options": []}"#;
        let event: NarrativeEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, NarrativeEvent::Choice(Choice { ref prompt, .. }) if prompt == "Pick"));
    }

    #[test]
    fn unknown_kind_is_tolerated() {
        let json = r#"{"type": "camera_pan", "angle": 30}"#;
        let event: NarrativeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, NarrativeEvent::Unknown);
        assert_eq!(event.kind(), "unknown");
    }

    #[test]
    fn cursor_holding_and_terminal_kinds() {
        let ending = NarrativeEvent::Ending(Ending {
            ending_id: EndingId::from("true_ending"),
            text: "Fin.".to_string(),
        });
        let transition = NarrativeEvent::SceneTransition(SceneTransition {
            next_scene: SceneId::from("library"),
        });
        assert!(ending.holds_cursor());
        assert!(ending.is_terminal());
        assert!(!transition.holds_cursor());
        assert!(transition.is_terminal());
        assert!(!NarrativeEvent::Unknown.is_terminal());
    }
}
