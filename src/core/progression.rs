/// Progression state — everything one playthrough mutates.
use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::persistence::SaveSnapshot;
use crate::schema::event::AffectionDelta;
use crate::schema::ids::{AchievementId, CharacterId, EndingId, SceneId};
use crate::schema::script::ScriptData;

pub const AFFECTION_MIN: i32 = 0;
pub const AFFECTION_MAX: i32 = 100;

/// Relationship tier derived from an affection value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AffectionLevel {
    Stranger,
    Acquaintance,
    Friend,
    CloseFriend,
    Intimate,
    Beloved,
}

impl AffectionLevel {
    pub fn from_value(value: i32) -> Self {
        match value {
            v if v < 20 => Self::Stranger,
            v if v < 40 => Self::Acquaintance,
            v if v < 60 => Self::Friend,
            v if v < 80 => Self::CloseFriend,
            v if v < 95 => Self::Intimate,
            _ => Self::Beloved,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Stranger => "stranger",
            Self::Acquaintance => "acquaintance",
            Self::Friend => "friend",
            Self::CloseFriend => "close friend",
            Self::Intimate => "intimate",
            Self::Beloved => "beloved",
        }
    }
}

/// A clamped affection change that actually landed on a tracked character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectionChange {
    pub character: CharacterId,
    pub value: i32,
    pub increased: bool,
}

/// Mutable state of a single playthrough.
///
/// `current_scene` is `None` while the player sits at the menu. Affection is
/// private so every write goes through the clamping methods.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionState {
    pub current_scene: Option<SceneId>,
    pub current_line: usize,
    affection: BTreeMap<CharacterId, i32>,
    pub choices_made: u32,
    pub visited_scenes: FxHashSet<SceneId>,
    pub unlocked_endings: FxHashSet<EndingId>,
    /// Unlock order is kept; this list outlives individual playthroughs.
    pub unlocked_achievements: Vec<AchievementId>,
    pub session_start: DateTime<Utc>,
    pub autoplay_enabled: bool,
}

impl ProgressionState {
    /// Fresh state tracking affection for the given characters.
    pub fn new<I>(tracked: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = CharacterId>,
    {
        Self {
            current_scene: None,
            current_line: 0,
            affection: tracked.into_iter().map(|c| (c, AFFECTION_MIN)).collect(),
            choices_made: 0,
            visited_scenes: FxHashSet::default(),
            unlocked_endings: FxHashSet::default(),
            unlocked_achievements: Vec::new(),
            session_start: now,
            autoplay_enabled: false,
        }
    }

    /// Fresh state tracking every scripted character except the protagonist.
    pub fn for_script(script: &ScriptData, protagonist: &str, now: DateTime<Utc>) -> Self {
        Self::new(tracked_characters(script, protagonist), now)
    }

    /// Start a new playthrough. Unlocked achievements carry over.
    pub fn reset_for_new_game(&mut self, script: &ScriptData, protagonist: &str, now: DateTime<Utc>) {
        let unlocked = std::mem::take(&mut self.unlocked_achievements);
        *self = Self::for_script(script, protagonist, now);
        self.unlocked_achievements = unlocked;
    }

    pub fn is_at_menu(&self) -> bool {
        self.current_scene.is_none()
    }

    /// Leave the current scene. Progress counters stay until the next new game.
    pub fn return_to_menu(&mut self) {
        self.current_scene = None;
        self.current_line = 0;
        self.autoplay_enabled = false;
    }

    pub(crate) fn enter_scene(&mut self, scene: &SceneId) {
        self.visited_scenes.insert(scene.clone());
        self.current_scene = Some(scene.clone());
        self.current_line = 0;
    }

    pub fn is_tracked(&self, character: &str) -> bool {
        self.affection.contains_key(character)
    }

    /// Current affection; untracked characters read as 0.
    pub fn affection(&self, character: &str) -> i32 {
        self.affection.get(character).copied().unwrap_or(AFFECTION_MIN)
    }

    pub fn affection_table(&self) -> &BTreeMap<CharacterId, i32> {
        &self.affection
    }

    pub fn affection_level(&self, character: &str) -> AffectionLevel {
        AffectionLevel::from_value(self.affection(character))
    }

    /// Raise affection, clamped. Returns the new value, or `None` when the
    /// character is not tracked.
    pub fn increase_affection(&mut self, character: &str, amount: u32) -> Option<i32> {
        self.shift_affection(character, i64::from(amount))
    }

    /// Lower affection, clamped. Returns the new value, or `None` when the
    /// character is not tracked.
    pub fn decrease_affection(&mut self, character: &str, amount: u32) -> Option<i32> {
        self.shift_affection(character, -i64::from(amount))
    }

    pub fn set_affection(&mut self, character: &str, value: i32) -> Option<i32> {
        let slot = self.affection.get_mut(character)?;
        *slot = value.clamp(AFFECTION_MIN, AFFECTION_MAX);
        debug!(character, value = *slot, "affection set");
        Some(*slot)
    }

    fn shift_affection(&mut self, character: &str, delta: i64) -> Option<i32> {
        let slot = self.affection.get_mut(character)?;
        let next = (i64::from(*slot) + delta).clamp(i64::from(AFFECTION_MIN), i64::from(AFFECTION_MAX));
        *slot = next as i32;
        debug!(character, value = *slot, "affection changed");
        Some(*slot)
    }

    /// Apply signed deltas: positive raises, negative lowers by the absolute
    /// value, zero and untracked characters are skipped.
    pub fn apply_affection_changes(&mut self, changes: &AffectionDelta) -> Vec<AffectionChange> {
        let mut applied = Vec::new();
        for (character, &delta) in changes {
            let value = match delta.signum() {
                1 => self.increase_affection(character.as_str(), delta.unsigned_abs()),
                -1 => self.decrease_affection(character.as_str(), delta.unsigned_abs()),
                _ => None,
            };
            if let Some(value) = value {
                applied.push(AffectionChange {
                    character: character.clone(),
                    value,
                    increased: delta > 0,
                });
            }
        }
        applied
    }

    /// The character with the strictly highest affection; ties go to the
    /// first id in order.
    pub fn highest_affection_character(&self) -> Option<&CharacterId> {
        let mut best: Option<(&CharacterId, i32)> = None;
        for (character, &value) in &self.affection {
            if best.map_or(true, |(_, top)| value > top) {
                best = Some((character, value));
            }
        }
        best.map(|(character, _)| character)
    }

    pub fn reset_affection(&mut self) {
        for value in self.affection.values_mut() {
            *value = AFFECTION_MIN;
        }
    }

    pub fn has_achievement(&self, id: &str) -> bool {
        self.unlocked_achievements.iter().any(|a| a.as_str() == id)
    }

    /// Capture the saveable part of the state. `None` at the menu.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Option<SaveSnapshot> {
        let scene = self.current_scene.clone()?;
        Some(SaveSnapshot {
            scene,
            line_index: self.current_line,
            character_affection: self.affection.clone(),
            timestamp: now,
            choices_made: self.choices_made,
            visited_scenes: self.visited_scenes.iter().cloned().collect(),
            unlocked_endings: self.unlocked_endings.iter().cloned().collect(),
        })
    }

    /// Restore progress from a snapshot. Tracked characters missing from the
    /// snapshot drop to 0; untracked ids in it are ignored.
    pub fn apply_snapshot(&mut self, snapshot: &SaveSnapshot) {
        for (character, value) in self.affection.iter_mut() {
            *value = snapshot
                .character_affection
                .get(character)
                .copied()
                .unwrap_or(AFFECTION_MIN)
                .clamp(AFFECTION_MIN, AFFECTION_MAX);
        }
        self.current_scene = Some(snapshot.scene.clone());
        self.current_line = snapshot.line_index;
        self.choices_made = snapshot.choices_made;
        self.visited_scenes = snapshot.visited_scenes.iter().cloned().collect();
        self.visited_scenes.insert(snapshot.scene.clone());
        self.unlocked_endings = snapshot.unlocked_endings.iter().cloned().collect();
    }
}

fn tracked_characters<'a>(
    script: &'a ScriptData,
    protagonist: &'a str,
) -> impl Iterator<Item = CharacterId> + 'a {
    script
        .characters
        .keys()
        .filter(move |id| id.as_str() != protagonist)
        .cloned()
}
