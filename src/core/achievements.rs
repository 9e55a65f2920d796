/// Achievement evaluation — pure predicates over progression state.
///
/// The evaluator only reports which achievements now qualify. Unlocking,
/// persistence and notices belong to the interpreter.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::core::progression::{ProgressionState, AFFECTION_MAX};
use crate::schema::ids::{AchievementId, EndingId, SceneId};
use crate::schema::script::AchievementDef;

pub const FIRST_CHOICE: &str = "first_choice";
pub const ALL_ENDINGS: &str = "all_endings";
pub const TRUE_ENDING: &str = "true_ending";
pub const SPEEDRUN: &str = "speedrun";
pub const EXPLORER: &str = "explorer";
pub const FIRST_MEETING: &str = "first_meeting";
pub const ALL_CHARACTERS_MET: &str = "all_characters_met";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("session started at {start} which is after now ({now})")]
    ClockSkew {
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    },
}

/// Tunable thresholds and ids for the built-in rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AchievementRules {
    /// Appended to a character id to form its max-affection achievement.
    pub max_affection_suffix: String,
    pub endings_required: usize,
    pub true_ending_id: EndingId,
    /// The scene a speedrun has to reach.
    pub ending_scene: SceneId,
    pub speedrun_minutes: i64,
    pub explorer_scenes: usize,
    pub hub_scenes: Vec<SceneId>,
    /// Ending id to the achievement it unlocks directly.
    pub ending_achievements: BTreeMap<EndingId, AchievementId>,
}

impl Default for AchievementRules {
    fn default() -> Self {
        Self {
            max_affection_suffix: "_max_affection".to_string(),
            endings_required: 3,
            true_ending_id: EndingId::from("true_ending"),
            ending_scene: SceneId::from("ending"),
            speedrun_minutes: 10,
            explorer_scenes: 5,
            hub_scenes: ["library_roof", "student_council", "canteen", "school_gate"]
                .into_iter()
                .map(SceneId::from)
                .collect(),
            ending_achievements: [
                ("huanshi_ending", "huanshi_end"),
                ("chengxiang_ending", "chengxiang_end"),
                ("tianhuazhu_ending", "tianhuazhu_end"),
                ("hesuowu_ending", "hesuowu_end"),
            ]
            .into_iter()
            .map(|(ending, achievement)| (EndingId::from(ending), AchievementId::from(achievement)))
            .collect(),
        }
    }
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Newly qualifying ids: in the catalog, not yet unlocked, no duplicates.
    pub qualified: Vec<AchievementId>,
    /// Rules that could not be decided this pass.
    pub errors: Vec<EvaluationError>,
}

/// Run every rule against `state`.
pub fn evaluate(
    state: &ProgressionState,
    catalog: &HashMap<AchievementId, AchievementDef>,
    rules: &AchievementRules,
    now: DateTime<Utc>,
) -> Evaluation {
    let mut candidates: Vec<AchievementId> = Vec::new();
    let mut errors = Vec::new();

    if state.choices_made > 0 {
        candidates.push(AchievementId::from(FIRST_CHOICE));
    }

    for (character, &value) in state.affection_table() {
        if value >= AFFECTION_MAX {
            candidates.push(AchievementId::new(format!(
                "{character}{}",
                rules.max_affection_suffix
            )));
        }
    }

    if state.unlocked_endings.len() >= rules.endings_required {
        candidates.push(AchievementId::from(ALL_ENDINGS));
    }

    if state.unlocked_endings.contains(&rules.true_ending_id) {
        candidates.push(AchievementId::from(TRUE_ENDING));
    }

    for (ending, achievement) in &rules.ending_achievements {
        if state.unlocked_endings.contains(ending) {
            candidates.push(achievement.clone());
        }
    }

    if state.current_scene.as_ref() == Some(&rules.ending_scene) {
        match speedrun_qualifies(state.session_start, now, rules.speedrun_minutes) {
            Ok(true) => candidates.push(AchievementId::from(SPEEDRUN)),
            Ok(false) => {}
            Err(e) => errors.push(e),
        }
    }

    if state.visited_scenes.len() >= rules.explorer_scenes {
        candidates.push(AchievementId::from(EXPLORER));
    }

    let hubs_visited = rules
        .hub_scenes
        .iter()
        .filter(|hub| state.visited_scenes.contains(*hub))
        .count();
    if hubs_visited > 0 {
        candidates.push(AchievementId::from(FIRST_MEETING));
    }
    if !rules.hub_scenes.is_empty() && hubs_visited == rules.hub_scenes.len() {
        candidates.push(AchievementId::from(ALL_CHARACTERS_MET));
    }

    let mut qualified: Vec<AchievementId> = Vec::new();
    for id in candidates {
        if catalog.contains_key(&id)
            && !state.unlocked_achievements.contains(&id)
            && !qualified.contains(&id)
        {
            qualified.push(id);
        }
    }

    Evaluation { qualified, errors }
}

fn speedrun_qualifies(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    limit_minutes: i64,
) -> Result<bool, EvaluationError> {
    let elapsed = now.signed_duration_since(start);
    if elapsed < Duration::zero() {
        return Err(EvaluationError::ClockSkew { start, now });
    }
    Ok(elapsed <= Duration::minutes(limit_minutes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ids::CharacterId;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
    }

    fn catalog() -> HashMap<AchievementId, AchievementDef> {
        [
            FIRST_CHOICE,
            ALL_ENDINGS,
            TRUE_ENDING,
            SPEEDRUN,
            EXPLORER,
            FIRST_MEETING,
            ALL_CHARACTERS_MET,
            "heroine1_max_affection",
            "huanshi_end",
        ]
        .into_iter()
        .map(|id| {
            (
                AchievementId::from(id),
                AchievementDef {
                    name: id.to_string(),
                    description: String::new(),
                    icon: String::new(),
                },
            )
        })
        .collect()
    }

    fn state() -> ProgressionState {
        ProgressionState::new(
            [CharacterId::from("heroine1"), CharacterId::from("heroine2")],
            t0(),
        )
    }

    fn ids(eval: &Evaluation) -> Vec<&str> {
        eval.qualified.iter().map(|a| a.as_str()).collect()
    }

    #[test]
    fn fresh_state_qualifies_for_nothing() {
        let eval = evaluate(&state(), &catalog(), &AchievementRules::default(), t0());
        assert!(eval.qualified.is_empty());
        assert!(eval.errors.is_empty());
    }

    #[test]
    fn first_choice_and_max_affection() {
        let mut s = state();
        s.choices_made = 1;
        s.set_affection("heroine1", 100);
        s.set_affection("heroine2", 100);
        let eval = evaluate(&s, &catalog(), &AchievementRules::default(), t0());
        // heroine2 has no catalog entry
        assert_eq!(ids(&eval), vec![FIRST_CHOICE, "heroine1_max_affection"]);
    }

    #[test]
    fn already_unlocked_is_not_reported() {
        let mut s = state();
        s.choices_made = 2;
        s.unlocked_achievements.push(AchievementId::from(FIRST_CHOICE));
        let eval = evaluate(&s, &catalog(), &AchievementRules::default(), t0());
        assert!(eval.qualified.is_empty());
    }

    #[test]
    fn endings_rules() {
        let mut s = state();
        for ending in ["huanshi_ending", "true_ending", "chengxiang_ending"] {
            s.unlocked_endings.insert(EndingId::from(ending));
        }
        let eval = evaluate(&s, &catalog(), &AchievementRules::default(), t0());
        assert_eq!(ids(&eval), vec![ALL_ENDINGS, TRUE_ENDING, "huanshi_end"]);
    }

    #[test]
    fn hubs_need_all_four() {
        let rules = AchievementRules::default();
        let mut s = state();
        for (n, hub) in ["canteen", "school_gate", "library_roof"].iter().enumerate() {
            s.visited_scenes.insert(SceneId::from(*hub));
            let eval = evaluate(&s, &catalog(), &rules, t0());
            assert!(eval.qualified.iter().any(|a| a.as_str() == FIRST_MEETING), "visit {n}");
            assert!(!eval.qualified.iter().any(|a| a.as_str() == ALL_CHARACTERS_MET));
        }
        s.visited_scenes.insert(SceneId::from("student_council"));
        let eval = evaluate(&s, &catalog(), &rules, t0());
        assert!(eval.qualified.iter().any(|a| a.as_str() == ALL_CHARACTERS_MET));
    }

    #[test]
    fn explorer_after_five_scenes() {
        let mut s = state();
        for scene in ["a", "b", "c", "d"] {
            s.visited_scenes.insert(SceneId::from(scene));
        }
        let rules = AchievementRules::default();
        assert!(evaluate(&s, &catalog(), &rules, t0()).qualified.is_empty());
        s.visited_scenes.insert(SceneId::from("e"));
        assert_eq!(ids(&evaluate(&s, &catalog(), &rules, t0())), vec![EXPLORER]);
    }

    #[test]
    fn speedrun_window() {
        let rules = AchievementRules::default();
        let mut s = state();
        s.current_scene = Some(SceneId::from("ending"));
        let in_time = evaluate(&s, &catalog(), &rules, t0() + Duration::minutes(10));
        assert!(in_time.qualified.iter().any(|a| a.as_str() == SPEEDRUN));
        let too_slow = evaluate(&s, &catalog(), &rules, t0() + Duration::minutes(11));
        assert!(!too_slow.qualified.iter().any(|a| a.as_str() == SPEEDRUN));
    }

    #[test]
    fn clock_skew_is_isolated() {
        let rules = AchievementRules::default();
        let mut s = state();
        s.current_scene = Some(SceneId::from("ending"));
        s.choices_made = 1;
        let eval = evaluate(&s, &catalog(), &rules, t0() - Duration::seconds(5));
        assert_eq!(eval.errors.len(), 1);
        assert_eq!(ids(&eval), vec![FIRST_CHOICE]);
    }
}
