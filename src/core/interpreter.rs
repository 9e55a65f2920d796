/// The narrative interpreter: walks the current scene, resolves choices and
/// reports everything the host should render or play as commands.
///
/// Each public entry point takes `&mut self`, finishes synchronously and
/// returns its commands. Narrative failures are logged and degrade to a
/// no-op; persistence failures are returned to the caller.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core::achievements;
use crate::core::audio::{AudioMixer, AudioSettings};
use crate::core::clock::{Clock, SystemClock};
use crate::core::command::{Command, EffectTarget};
use crate::core::config::{ConfigError, EngineConfig};
use crate::core::persistence::{
    KeyValueStore, MemoryStore, PersistenceError, SaveGateway, SlotId, SlotSummary,
};
use crate::core::progression::ProgressionState;
use crate::core::scheduler::{RepeatingTimer, Typewriter};
use crate::schema::event::{default_position, AffectionDelta, Choice, Dialogue, Ending, NarrativeEvent};
use crate::schema::ids::{AchievementId, SceneId};
use crate::schema::script::{Scene, ScriptData, ScriptError};
use crate::schema::validate::{Severity, ValidationOptions};

const TEXT_FLASH_MS: u64 = 300;
const ENTRANCE_MS: u64 = 500;
const CHOICE_PULSE_BASE_MS: u64 = 1000;
const CHOICE_PULSE_STEP_MS: u64 = 200;
const CHOSEN_SHAKE_MS: u64 = 300;
const AFFECTION_EFFECT_MS: u64 = 300;
const CHOICE_SFX: &str = "click";
const CONTINUE_SFX: &str = "notification";
const DEFAULT_SPRITE: &str = "1.png";
const PLAIN_COLOR: &str = "#ffffff";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("script error: {0}")]
    Script(#[from] ScriptError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("scene not found: {0}")]
    SceneNotFound(SceneId),
    #[error("save slot {0} is empty")]
    SlotEmpty(u8),
    #[error("no game in progress")]
    NotPlaying,
    #[error("no choice is waiting for an answer")]
    NoChoicePending,
    #[error("option {index} out of range ({available} options)")]
    OptionOutOfRange { index: usize, available: usize },
    #[error("scene {scene} ran {steps} events without waiting for the player")]
    RunawayScript { scene: SceneId, steps: usize },
}

/// A visual-novel playthrough. Built via `GalgameEngine::builder()`.
pub struct GalgameEngine {
    script: ScriptData,
    config: EngineConfig,
    state: ProgressionState,
    saves: SaveGateway,
    audio: AudioMixer,
    autoplay: RepeatingTimer,
    typewriter: Typewriter,
    clock: Box<dyn Clock>,
    rng: StdRng,
    /// Host time in milliseconds as of the last `tick`.
    now_ms: u64,
}

/// Builder for constructing a `GalgameEngine`.
pub struct GalgameEngineBuilder {
    config: Option<EngineConfig>,
    config_path: Option<PathBuf>,
    script: Option<ScriptData>,
    script_json: Option<String>,
    script_path: Option<PathBuf>,
    store: Option<Box<dyn KeyValueStore>>,
    clock: Option<Box<dyn Clock>>,
    seed: u64,
}

impl GalgameEngine {
    pub fn builder() -> GalgameEngineBuilder {
        GalgameEngineBuilder {
            config: None,
            config_path: None,
            script: None,
            script_json: None,
            script_path: None,
            store: None,
            clock: None,
            seed: 0,
        }
    }

    // --- session -------------------------------------------------------

    /// Reset the playthrough and load the opening scene.
    pub fn start_game(&mut self) -> Vec<Command> {
        let now = self.clock.now();
        self.state
            .reset_for_new_game(&self.script, &self.config.protagonist_id, now);
        self.autoplay.cancel();
        self.typewriter.cancel();
        info!("new game started");

        let opening = self.config.opening_scene.clone();
        self.run("start_game", |engine, out| {
            out.push(Command::ClearTransientUi);
            out.push(Command::ClearCharacters);
            engine.push_affection_table(out);
            engine.load_and_display(&opening, out)
        })
    }

    /// Leave the current scene for the menu.
    pub fn return_to_menu(&mut self) -> Vec<Command> {
        self.run("return_to_menu", |engine, out| {
            engine.end_to_menu(out);
            Ok(())
        })
    }

    // --- cursor movement -----------------------------------------------

    /// Load a scene and display its first event. Unknown scenes are a
    /// logged no-op.
    pub fn advance_to(&mut self, scene: &str) -> Vec<Command> {
        let scene = SceneId::from(scene);
        self.run("advance_to", |engine, out| engine.load_and_display(&scene, out))
    }

    /// The player's "continue". Ignored while a choice or ending is shown.
    pub fn advance_one_step(&mut self) -> Vec<Command> {
        self.run("advance_one_step", |engine, out| engine.step(out))
    }

    /// Pick an option of the choice on screen.
    pub fn resolve_choice(&mut self, index: usize) -> Vec<Command> {
        self.run("resolve_choice", |engine, out| {
            let option = match engine.current_event() {
                Some(NarrativeEvent::Choice(choice)) => match choice.options.get(index) {
                    Some(option) => option.clone(),
                    None => {
                        return Err(EngineError::OptionOutOfRange {
                            index,
                            available: choice.options.len(),
                        })
                    }
                },
                Some(_) => return Err(EngineError::NoChoicePending),
                None => return Err(EngineError::NotPlaying),
            };
            if engine.script.scene(option.next_scene.as_str()).is_none() {
                return Err(EngineError::SceneNotFound(option.next_scene));
            }

            out.extend(engine.audio.play_sfx(CHOICE_SFX));
            out.push(Command::effect(
                EffectTarget::ChoiceButton(index),
                "shake",
                CHOSEN_SHAKE_MS,
            ));
            engine.apply_affection(&option.affection_change, out);
            engine.state.choices_made += 1;
            engine.state.current_line = 0;
            info!(option = index, next = %option.next_scene, "choice resolved");
            engine.load_and_display(&option.next_scene, out)
        })
    }

    /// Jump to just before the next choice in this scene, or to the scene's
    /// last event when there is none. When the cursor already sits there the
    /// line is shown again without re-applying its affection.
    pub fn skip_to_next_choice(&mut self) -> Vec<Command> {
        self.run("skip_to_next_choice", |engine, out| {
            let scene_id = engine.state.current_scene.clone().ok_or(EngineError::NotPlaying)?;
            let scene = engine.scene(&scene_id)?;
            let from = engine.state.current_line;
            if scene.event(from).is_some_and(NarrativeEvent::holds_cursor) {
                return Ok(());
            }

            let target = scene
                .events
                .iter()
                .enumerate()
                .skip(from + 1)
                .find(|(_, event)| matches!(event, NarrativeEvent::Choice(_)))
                .map(|(i, _)| i - 1)
                .unwrap_or_else(|| scene.len().saturating_sub(1));
            if target <= from {
                return engine.display_current(out, false);
            }

            debug!(scene = %scene_id, from, to = target, "skipping ahead");
            engine.state.current_line = target;
            engine.display_current(out, true)
        })
    }

    // --- autoplay and time ---------------------------------------------

    /// Turn autoplay on or off at host time `now_ms`. Returns whether it is
    /// now on. Autoplay only runs while a game is in progress.
    pub fn set_autoplay(&mut self, enabled: bool, now_ms: u64) -> bool {
        self.now_ms = now_ms;
        if enabled {
            if self.state.is_at_menu() {
                warn!("autoplay requested at the menu, ignoring");
            } else if self.autoplay.start(self.now_ms).is_some() {
                info!(interval_ms = self.autoplay.interval_ms(), "autoplay on");
            }
        } else if self.autoplay.is_running() {
            self.autoplay.cancel();
            info!("autoplay off");
        }
        self.state.autoplay_enabled = self.autoplay.is_running();
        self.state.autoplay_enabled
    }

    pub fn toggle_autoplay(&mut self, now_ms: u64) -> bool {
        self.set_autoplay(!self.autoplay.is_running(), now_ms)
    }

    /// Advance host time. Runs one autoplay step when the timer is due and
    /// nothing is waiting on the player.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Command> {
        self.now_ms = now_ms;
        if !self.autoplay.poll(now_ms) {
            return Vec::new();
        }
        if self.current_event().map_or(true, NarrativeEvent::holds_cursor) {
            debug!("autoplay waiting on the player");
            return Vec::new();
        }
        debug!(now_ms, "autoplay step");
        self.advance_one_step()
    }

    /// The part of the current line revealed so far. Also records `now_ms`
    /// as the host time the next line starts typing from.
    pub fn visible_dialogue(&mut self, now_ms: u64) -> &str {
        self.now_ms = now_ms;
        self.typewriter.visible(now_ms)
    }

    pub fn finish_typewriter(&mut self) {
        self.typewriter.finish();
    }

    // --- achievements --------------------------------------------------

    /// Unlock an achievement by id. Unknown or already unlocked ids do nothing.
    pub fn unlock_achievement(&mut self, id: &str) -> Vec<Command> {
        self.run("unlock_achievement", |engine, out| {
            engine.unlock_into(id, out);
            Ok(())
        })
    }

    /// Run the achievement rules against the current state.
    pub fn check_achievements(&mut self) -> Vec<Command> {
        self.run("check_achievements", |_, _| Ok(()))
    }

    /// Set a character's affection directly (clamped).
    pub fn set_affection(&mut self, character: &str, value: i32) -> Vec<Command> {
        self.run("set_affection", |engine, out| {
            if let Some(value) = engine.state.set_affection(character, value) {
                out.push(Command::ShowAffection {
                    character_id: character.to_string(),
                    value,
                });
            } else {
                warn!(character, "affection set for untracked character, ignoring");
            }
            Ok(())
        })
    }

    // --- persistence ---------------------------------------------------

    /// Snapshot the playthrough into a slot (1..=5).
    pub fn save(&mut self, slot: u8) -> Result<(), EngineError> {
        let slot = SlotId::new(slot)?;
        let snapshot = self
            .state
            .snapshot(self.clock.now())
            .ok_or(EngineError::NotPlaying)?;
        self.saves.save(slot, &snapshot)?;
        Ok(())
    }

    /// Restore a slot and show the saved line again. Affection attached to
    /// that line is not applied a second time.
    pub fn load(&mut self, slot: u8) -> Result<Vec<Command>, EngineError> {
        let slot = SlotId::new(slot)?;
        let snapshot = self
            .saves
            .load(slot)?
            .ok_or(EngineError::SlotEmpty(slot.get()))?;
        let last = self.scene(&snapshot.scene)?.len().saturating_sub(1);

        self.autoplay.cancel();
        self.typewriter.cancel();
        self.state.apply_snapshot(&snapshot);
        self.state.autoplay_enabled = false;

        let mut out = vec![Command::ClearTransientUi, Command::ClearCharacters];
        self.enter_scene(&snapshot.scene, &mut out)?;
        if snapshot.line_index > last {
            warn!(
                scene = %snapshot.scene,
                line = snapshot.line_index,
                "saved line is past the end of the scene, clamping"
            );
        }
        self.state.current_line = snapshot.line_index.min(last);
        info!(slot = slot.get(), scene = %snapshot.scene, line = self.state.current_line, "game loaded");

        self.push_affection_table(&mut out);
        if let Err(e) = self.display_current(&mut out, false) {
            warn!(error = %e, "display after load failed");
        }
        self.check_achievements_into(&mut out);
        Ok(out)
    }

    pub fn list_slots(&self) -> Result<Vec<SlotSummary>, EngineError> {
        Ok(self.saves.list_slots()?)
    }

    // --- audio ---------------------------------------------------------

    pub fn set_music_volume(&mut self, volume: f32) -> Vec<Command> {
        vec![self.audio.set_music_volume(volume)]
    }

    pub fn set_sfx_volume(&mut self, volume: f32) -> Vec<Command> {
        vec![self.audio.set_sfx_volume(volume)]
    }

    pub fn toggle_mute(&mut self) -> Vec<Command> {
        vec![self.audio.toggle_mute()]
    }

    // --- accessors -----------------------------------------------------

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn script(&self) -> &ScriptData {
        &self.script
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn audio_settings(&self) -> &AudioSettings {
        self.audio.settings()
    }

    pub fn autoplay_enabled(&self) -> bool {
        self.autoplay.is_running()
    }

    /// The event under the cursor, if a game is in progress.
    pub fn current_event(&self) -> Option<&NarrativeEvent> {
        let scene = self.state.current_scene.as_ref()?;
        self.script.scene(scene.as_str())?.event(self.state.current_line)
    }

    pub fn is_choice_pending(&self) -> bool {
        matches!(self.current_event(), Some(NarrativeEvent::Choice(_)))
    }

    pub fn is_at_ending(&self) -> bool {
        matches!(self.current_event(), Some(NarrativeEvent::Ending(_)))
    }

    // --- internals -----------------------------------------------------

    /// Boundary of every narrative entry point: errors are logged, the
    /// achievement rules run, and the collected commands are returned.
    fn run<F>(&mut self, op: &'static str, f: F) -> Vec<Command>
    where
        F: FnOnce(&mut Self, &mut Vec<Command>) -> Result<(), EngineError>,
    {
        let mut out = Vec::new();
        match f(self, &mut out) {
            Ok(()) => {}
            Err(e @ EngineError::RunawayScript { .. }) => error!(op, error = %e, "step aborted"),
            Err(e) => warn!(op, error = %e, "operation ignored"),
        }
        self.check_achievements_into(&mut out);
        out
    }

    fn scene(&self, id: &SceneId) -> Result<&Scene, EngineError> {
        self.script
            .scene(id.as_str())
            .ok_or_else(|| EngineError::SceneNotFound(id.clone()))
    }

    fn step(&mut self, out: &mut Vec<Command>) -> Result<(), EngineError> {
        let (holds, kind) = match self.current_event() {
            Some(event) => (event.holds_cursor(), event.kind()),
            None => return Err(EngineError::NotPlaying),
        };
        if holds {
            debug!(kind, "continue ignored while waiting on the player");
            return Ok(());
        }

        out.extend(self.audio.play_sfx(CONTINUE_SFX));
        self.state.current_line += 1;
        debug!(line = self.state.current_line, "cursor advanced");
        self.display_current(out, true)
    }

    fn load_and_display(&mut self, scene: &SceneId, out: &mut Vec<Command>) -> Result<(), EngineError> {
        self.enter_scene(scene, out)?;
        self.display_current(out, true)
    }

    /// Record the visit, reset the cursor and switch backdrop and music.
    fn enter_scene(&mut self, scene_id: &SceneId, out: &mut Vec<Command>) -> Result<(), EngineError> {
        let scene = self.scene(scene_id)?;
        let background = scene.background_id.clone();
        let music = scene.music_id.clone();

        self.state.enter_scene(scene_id);
        self.typewriter.cancel();
        debug!(scene = %scene_id, "scene loaded");

        if let Some(background) = background {
            out.push(Command::ShowBackground { background });
        }
        if let Some(track) = music {
            out.extend(self.audio.play_music(&track));
        }
        Ok(())
    }

    /// Show the event under the cursor, running through events that do not
    /// wait for the player.
    fn display_current(&mut self, out: &mut Vec<Command>, apply_affection: bool) -> Result<(), EngineError> {
        let mut apply_affection = apply_affection;
        let mut steps = 0;
        loop {
            let Some(scene_id) = self.state.current_scene.clone() else {
                return Ok(());
            };
            steps += 1;
            if steps > self.config.max_auto_steps {
                return Err(EngineError::RunawayScript {
                    scene: scene_id,
                    steps: self.config.max_auto_steps,
                });
            }

            let Some(event) = self.scene(&scene_id)?.event(self.state.current_line).cloned() else {
                info!(scene = %scene_id, "scene ran out of events, returning to menu");
                self.end_to_menu(out);
                return Ok(());
            };

            match event {
                NarrativeEvent::Dialogue(line) => {
                    self.show_dialogue(&line, apply_affection, out);
                    return Ok(());
                }
                NarrativeEvent::Character(cue) => {
                    self.show_character(cue.character_id.as_str(), &cue.position, &cue.expression, out);
                    self.state.current_line += 1;
                }
                NarrativeEvent::Choice(choice) => {
                    self.show_choice(&choice, out);
                    return Ok(());
                }
                NarrativeEvent::Ending(ending) => {
                    self.show_ending(&ending, out);
                    return Ok(());
                }
                NarrativeEvent::SceneTransition(transition) => {
                    // The cursor stays on the transition when the target is missing.
                    self.scene(&transition.next_scene)?;
                    self.state.current_line += 1;
                    self.enter_scene(&transition.next_scene, out)?;
                }
                NarrativeEvent::Unknown => {
                    warn!(scene = %scene_id, line = self.state.current_line, "unknown event type, skipping");
                    self.state.current_line += 1;
                }
            }
            apply_affection = true;
        }
    }

    fn show_dialogue(&mut self, line: &Dialogue, apply_affection: bool, out: &mut Vec<Command>) {
        if apply_affection {
            self.apply_affection(&line.affection_changes, out);
        }
        if let Some(ref character) = line.character {
            let position = line.position.clone().unwrap_or_else(default_position);
            self.show_character(character.as_str(), &position, "normal", out);
        }

        let (speaker_name, color) = self.speaker_label(line.speaker.as_deref());
        out.push(Command::effect(EffectTarget::TextBox, "flash", TEXT_FLASH_MS));
        out.push(Command::ShowDialogue {
            speaker_name,
            color,
            text: line.text.clone(),
        });
        self.typewriter.start(&line.text, self.now_ms);
    }

    /// Name and color for a speaker id. Narrators get an empty name; ids
    /// without a character entry are shown as-is.
    fn speaker_label(&self, speaker: Option<&str>) -> (String, String) {
        match speaker {
            None => (String::new(), PLAIN_COLOR.to_string()),
            Some(id) if self.config.is_narrator(id) => (String::new(), PLAIN_COLOR.to_string()),
            Some(id) => match self.script.character(id) {
                Some(def) => (def.name.clone(), def.color.clone()),
                None => (id.to_string(), PLAIN_COLOR.to_string()),
            },
        }
    }

    fn show_character(&mut self, character_id: &str, position: &str, expression: &str, out: &mut Vec<Command>) {
        let Some(def) = self.script.character(character_id) else {
            warn!(character = character_id, "unknown character, sprite not shown");
            return;
        };
        let folder = def.folder.as_deref().unwrap_or(character_id);
        let file = def.image_for(expression).unwrap_or(DEFAULT_SPRITE);
        let image = format!("{}/{}/{}", self.config.image_root, folder, file);

        out.push(Command::ClearCharacters);
        out.push(Command::ShowCharacter {
            character_id: character_id.to_string(),
            position: position.to_string(),
            expression: expression.to_string(),
            image,
        });

        let target = EffectTarget::Character(character_id.to_string());
        let entrance = match position {
            "left" => "slideInLeft",
            "right" => "slideInRight",
            "center" => "zoomIn",
            _ => "fadeIn",
        };
        out.push(Command::effect(target.clone(), entrance, ENTRANCE_MS));

        let mood = match expression {
            "happy" | "angry" => Some(("shake", 600)),
            "surprised" => Some(("rotate", 500)),
            "sad" => Some(("pulse", 1000)),
            _ => self.rng.gen_bool(0.5).then_some(("pulse", 1000)),
        };
        if let Some((effect, duration_ms)) = mood {
            out.push(Command::effect(target, effect, duration_ms));
        }
    }

    fn show_choice(&mut self, choice: &Choice, out: &mut Vec<Command>) {
        self.typewriter.cancel();
        out.push(Command::ClearCharacters);
        out.push(Command::ShowChoices {
            prompt: choice.prompt.clone(),
            options: choice.options.iter().map(|o| o.text.clone()).collect(),
        });
        for i in 0..choice.options.len() {
            out.push(Command::effect(
                EffectTarget::ChoiceButton(i),
                "pulse",
                CHOICE_PULSE_BASE_MS + CHOICE_PULSE_STEP_MS * i as u64,
            ));
        }
    }

    fn show_ending(&mut self, ending: &Ending, out: &mut Vec<Command>) {
        self.typewriter.cancel();
        if self.state.unlocked_endings.insert(ending.ending_id.clone()) {
            info!(ending = %ending.ending_id, "ending reached for the first time");
        }
        out.push(Command::ClearCharacters);
        out.push(Command::ShowEnding {
            text: ending.text.clone(),
        });
    }

    fn apply_affection(&mut self, changes: &AffectionDelta, out: &mut Vec<Command>) {
        for change in self.state.apply_affection_changes(changes) {
            let effect = if change.increased { "flash" } else { "shake" };
            out.push(Command::ShowAffection {
                character_id: change.character.to_string(),
                value: change.value,
            });
            out.push(Command::effect(
                EffectTarget::AffectionEntry(change.character.to_string()),
                effect,
                AFFECTION_EFFECT_MS,
            ));
        }
    }

    fn push_affection_table(&self, out: &mut Vec<Command>) {
        for (character, &value) in self.state.affection_table() {
            out.push(Command::ShowAffection {
                character_id: character.to_string(),
                value,
            });
        }
    }

    fn end_to_menu(&mut self, out: &mut Vec<Command>) {
        self.autoplay.cancel();
        self.typewriter.cancel();
        self.state.return_to_menu();
        out.extend(self.audio.stop_music());
        out.push(Command::ClearTransientUi);
        out.push(Command::ReturnToMenu);
    }

    fn check_achievements_into(&mut self, out: &mut Vec<Command>) {
        let evaluation = achievements::evaluate(
            &self.state,
            &self.script.achievement_catalog,
            &self.config.achievements,
            self.clock.now(),
        );
        for e in &evaluation.errors {
            warn!(error = %e, "achievement rule skipped");
        }
        for id in evaluation.qualified {
            self.unlock_into(id.as_str(), out);
        }
    }

    fn unlock_into(&mut self, id: &str, out: &mut Vec<Command>) -> bool {
        let Some(def) = self.script.achievement(id) else {
            debug!(achievement = id, "not in the catalog, ignoring");
            return false;
        };
        if self.state.has_achievement(id) {
            return false;
        }

        self.state.unlocked_achievements.push(AchievementId::from(id));
        info!(achievement = id, "achievement unlocked");
        if let Err(e) = self
            .saves
            .store_unlocked_achievements(&self.state.unlocked_achievements)
        {
            warn!(error = %e, "could not persist unlocked achievements");
        }
        out.push(Command::ShowAchievementNotice {
            name: def.name.clone(),
            icon: def.icon.clone(),
            description: def.description.clone(),
            dismiss_after_ms: self.config.notice_dismiss_ms,
        });
        true
    }
}

impl GalgameEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the config from a RON file at build time.
    pub fn config_path(mut self, path: &Path) -> Self {
        self.config_path = Some(path.to_path_buf());
        self
    }

    /// Provide script data directly.
    pub fn script(mut self, script: ScriptData) -> Self {
        self.script = Some(script);
        self
    }

    /// Parse script data from JSON at build time. Parse errors fail the build.
    pub fn script_json(mut self, json: &str) -> Self {
        self.script_json = Some(json.to_string());
        self
    }

    /// Load script data from a file, falling back to the built-in scene when
    /// it cannot be read.
    pub fn script_path(mut self, path: &Path) -> Self {
        self.script_path = Some(path.to_path_buf());
        self
    }

    pub fn store(mut self, store: impl KeyValueStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<GalgameEngine, EngineError> {
        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => EngineConfig::load_from_ron(&path)?,
            (None, None) => EngineConfig::default(),
        };

        let script = if let Some(script) = self.script {
            script
        } else if let Some(ref json) = self.script_json {
            ScriptData::parse_json(json)?
        } else if let Some(ref path) = self.script_path {
            ScriptData::load_or_fallback(path)
        } else {
            warn!("no script supplied, using the fallback scene");
            ScriptData::fallback()
        };

        let issues = script.validate(&ValidationOptions {
            opening_scene: config.opening_scene.as_str(),
            free_speakers: &config.free_speakers,
        });
        for issue in &issues {
            match issue.severity {
                Severity::Error => warn!(%issue, "script problem"),
                Severity::Warning => debug!(%issue, "script warning"),
            }
        }

        let clock: Box<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Box::new(SystemClock),
        };
        let store: Box<dyn KeyValueStore> = match self.store {
            Some(store) => store,
            None => Box::new(MemoryStore::new()),
        };
        let saves = SaveGateway::new(store, config.storage.clone());

        let mut state = ProgressionState::for_script(&script, &config.protagonist_id, clock.now());
        state.unlocked_achievements = restore_unlocked(&saves, &script);

        Ok(GalgameEngine {
            audio: AudioMixer::new(config.audio.clone()),
            autoplay: RepeatingTimer::new(config.autoplay_interval_ms),
            typewriter: Typewriter::new(config.typewriter_char_ms),
            rng: StdRng::seed_from_u64(self.seed),
            script,
            config,
            state,
            saves,
            clock,
            now_ms: 0,
        })
    }
}

/// Read the persisted unlock list, keeping ids the catalog still knows.
fn restore_unlocked(saves: &SaveGateway, script: &ScriptData) -> Vec<AchievementId> {
    let stored = match saves.load_unlocked_achievements() {
        Ok(stored) => stored,
        Err(e) => {
            warn!(error = %e, "could not read unlocked achievements");
            return Vec::new();
        }
    };
    let mut unlocked: Vec<AchievementId> = Vec::new();
    for id in stored {
        if script.achievement(id.as_str()).is_none() {
            debug!(achievement = %id, "dropping stored achievement missing from the catalog");
        } else if !unlocked.contains(&id) {
            unlocked.push(id);
        }
    }
    unlocked
}
