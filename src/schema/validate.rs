/// Static checks over loaded script data.
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use super::event::NarrativeEvent;
use super::ids::SceneId;
use super::script::ScriptData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// A single problem found in the script, located by scene and event index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptIssue {
    pub severity: Severity,
    pub scene: SceneId,
    pub index: Option<usize>,
    pub message: String,
}

impl fmt::Display for ScriptIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        match self.index {
            Some(i) => write!(f, "{level}: {}[{i}]: {}", self.scene, self.message),
            None => write!(f, "{level}: {}: {}", self.scene, self.message),
        }
    }
}

/// What the validator should treat as known beyond the script's own tables.
#[derive(Debug, Clone)]
pub struct ValidationOptions<'a> {
    pub opening_scene: &'a str,
    /// Speaker ids that are valid without a character entry (narrator, system).
    pub free_speakers: &'a [String],
}

impl ScriptData {
    /// Check scene references, scene tails, choices and speakers.
    ///
    /// Issues are sorted by scene id, then event index.
    pub fn validate(&self, options: &ValidationOptions<'_>) -> Vec<ScriptIssue> {
        let mut issues = Vec::new();

        if self.scene(options.opening_scene).is_none() {
            issues.push(ScriptIssue {
                severity: Severity::Error,
                scene: SceneId::from(options.opening_scene),
                index: None,
                message: "opening scene is missing".to_string(),
            });
        }

        for (scene_id, scene) in &self.scenes {
            let mut push = |severity: Severity, index: Option<usize>, message: String| {
                issues.push(ScriptIssue {
                    severity,
                    scene: scene_id.clone(),
                    index,
                    message,
                })
            };

            match scene.events.last() {
                None => push(Severity::Error, None, "scene has no events".to_string()),
                Some(last) if !last.is_terminal() => push(
                    Severity::Warning,
                    Some(scene.len() - 1),
                    "scene does not end in an ending or scene_transition; play returns to the menu"
                        .to_string(),
                ),
                Some(_) => {}
            }

            for (i, event) in scene.events.iter().enumerate() {
                match event {
                    NarrativeEvent::Dialogue(line) => {
                        if let Some(ref speaker) = line.speaker {
                            if self.character(speaker).is_none()
                                && !options.free_speakers.iter().any(|s| s == speaker)
                            {
                                push(
                                    Severity::Warning,
                                    Some(i),
                                    format!("speaker '{speaker}' has no character entry"),
                                );
                            }
                        }
                        for character in line.affection_changes.keys() {
                            if self.character(character.as_str()).is_none() {
                                push(
                                    Severity::Warning,
                                    Some(i),
                                    format!("affection change for unknown character '{character}'"),
                                );
                            }
                        }
                    }
                    NarrativeEvent::Character(cue) => {
                        if self.character(cue.character_id.as_str()).is_none() {
                            push(
                                Severity::Warning,
                                Some(i),
                                format!("unknown character '{}'", cue.character_id),
                            );
                        }
                    }
                    NarrativeEvent::Choice(choice) => {
                        if choice.options.is_empty() {
                            push(Severity::Error, Some(i), "choice has no options".to_string());
                        }
                        for option in &choice.options {
                            if self.scene(option.next_scene.as_str()).is_none() {
                                push(
                                    Severity::Error,
                                    Some(i),
                                    format!("option '{}' leads to missing scene '{}'", option.text, option.next_scene),
                                );
                            }
                        }
                    }
                    NarrativeEvent::SceneTransition(transition) => {
                        if self.scene(transition.next_scene.as_str()).is_none() {
                            push(
                                Severity::Error,
                                Some(i),
                                format!("transition to missing scene '{}'", transition.next_scene),
                            );
                        }
                    }
                    NarrativeEvent::Ending(_) => {}
                    NarrativeEvent::Unknown => {
                        push(Severity::Warning, Some(i), "unknown event type is skipped".to_string())
                    }
                }
            }
        }

        let reachable = self.reachable_scenes(options.opening_scene);
        for scene_id in self.scenes.keys() {
            if !reachable.contains(scene_id) {
                issues.push(ScriptIssue {
                    severity: Severity::Warning,
                    scene: scene_id.clone(),
                    index: None,
                    message: "scene is unreachable from the opening scene".to_string(),
                });
            }
        }

        issues.sort_by(|a, b| (&a.scene, a.index).cmp(&(&b.scene, b.index)));
        issues
    }

    /// Every scene reachable from `start` through choices and transitions.
    pub fn reachable_scenes(&self, start: &str) -> BTreeSet<SceneId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        if self.scene(start).is_some() {
            queue.push_back(SceneId::from(start));
        }

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(scene) = self.scene(id.as_str()) else {
                continue;
            };
            for event in &scene.events {
                match event {
                    NarrativeEvent::Choice(choice) => {
                        for option in &choice.options {
                            if self.scene(option.next_scene.as_str()).is_some() {
                                queue.push_back(option.next_scene.clone());
                            }
                        }
                    }
                    NarrativeEvent::SceneTransition(t) => {
                        if self.scene(t.next_scene.as_str()).is_some() {
                            queue.push_back(t.next_scene.clone());
                        }
                    }
                    _ => {}
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> (String, Vec<String>) {
        ("opening".to_string(), vec!["narrator".to_string()])
    }

    fn check(json: &str) -> Vec<ScriptIssue> {
        let script = ScriptData::parse_json(json).unwrap();
        let (opening, free) = options();
        script.validate(&ValidationOptions {
            opening_scene: &opening,
            free_speakers: &free,
        })
    }

    #[test]
    fn clean_script_has_no_issues() {
        let issues = check(
            r#"{
                "scenes": {
                    "opening": { "script": [
                        { "type": "dialogue", "speaker": "narrator", "text": "Hello." },
                        { "type": "scene_transition", "nextScene": "end" }
                    ]},
                    "end": { "script": [ { "type": "ending", "endingId": "e1", "text": "Bye." } ] }
                }
            }"#,
        );
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn dangling_references_are_errors() {
        let issues = check(
            r#"{
                "scenes": {
                    "opening": { "script": [
                        { "type": "choice", "question": "?", "options": [
                            { "text": "Go", "nextScene": "nowhere" }
                        ]}
                    ]}
                }
            }"#,
        );
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("nowhere")));
    }

    #[test]
    fn open_tail_and_unknown_speaker_are_warnings() {
        let issues = check(
            r#"{
                "scenes": {
                    "opening": { "script": [
                        { "type": "dialogue", "speaker": "ghost", "text": "Boo." }
                    ]}
                }
            }"#,
        );
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.severity == Severity::Warning));
        assert!(issues.iter().any(|i| i.message.contains("ghost")));
    }

    #[test]
    fn unreachable_and_empty_scenes() {
        let issues = check(
            r#"{
                "scenes": {
                    "opening": { "script": [ { "type": "ending", "endingId": "e", "text": "" } ] },
                    "orphan": { "script": [] }
                }
            }"#,
        );
        let orphan: Vec<_> = issues.iter().filter(|i| i.scene.as_str() == "orphan").collect();
        assert_eq!(orphan.len(), 2);
        assert!(orphan.iter().any(|i| i.severity == Severity::Error));
    }

    #[test]
    fn missing_opening_scene() {
        let issues = check(r#"{ "scenes": {} }"#);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].to_string(), "ERROR: opening: opening scene is missing");
    }
}
