//! WASM bindings for galgame-engine — drives a playthrough from the browser.
//!
//! Every call that moves the story returns a JSON array of commands for the
//! page to render. Saves live in an in-memory store that the page can
//! export to and restore from `localStorage`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

use galgame_engine::core::interpreter::GalgameEngine;
use galgame_engine::core::persistence::{KeyValueStore, MemoryStore, PersistenceError};
use galgame_engine::schema::script::ScriptData;

// ---------------------------------------------------------------------------
// Embedded demo script — compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const CAMPUS_SCRIPT: &str = include_str!("../../script_data/campus/script.json");
}

// ---------------------------------------------------------------------------
// Store shared between the engine and the page
// ---------------------------------------------------------------------------
#[derive(Clone, Default)]
struct SharedStore(Rc<RefCell<MemoryStore>>);

impl KeyValueStore for SharedStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.0.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.0.borrow_mut().set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.0.borrow_mut().remove(key)
    }
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct SessionView {
    scene: Option<String>,
    line: usize,
    affection: BTreeMap<String, i32>,
    choices_made: u32,
    unlocked_achievements: Vec<String>,
    autoplay: bool,
    choice_pending: bool,
    at_ending: bool,
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

#[wasm_bindgen]
pub struct GalgameSession {
    engine: GalgameEngine,
    store: SharedStore,
}

#[wasm_bindgen]
impl GalgameSession {
    /// Build a session from script JSON and, optionally, a previously
    /// exported store. Unparseable script data falls back to the built-in
    /// one-line scene.
    #[wasm_bindgen(constructor)]
    pub fn new(
        script_json: &str,
        store_json: Option<String>,
        seed: u64,
    ) -> Result<GalgameSession, JsError> {
        let script = ScriptData::parse_json(script_json).unwrap_or_else(|_| ScriptData::fallback());
        let memory = match store_json {
            Some(json) => MemoryStore::from_json(&json)
                .map_err(|e| JsError::new(&format!("Invalid store JSON: {e}")))?,
            None => MemoryStore::new(),
        };
        let store = SharedStore(Rc::new(RefCell::new(memory)));
        let engine = GalgameEngine::builder()
            .script(script)
            .store(store.clone())
            .seed(seed)
            .build()
            .map_err(|e| JsError::new(&format!("Engine error: {e}")))?;
        Ok(GalgameSession { engine, store })
    }

    /// A session over the bundled campus script.
    pub fn demo(seed: u64) -> Result<GalgameSession, JsError> {
        GalgameSession::new(data::CAMPUS_SCRIPT, None, seed)
    }

    pub fn start_game(&mut self) -> Result<String, JsError> {
        to_json(&self.engine.start_game())
    }

    /// The player's "continue".
    pub fn advance(&mut self) -> Result<String, JsError> {
        to_json(&self.engine.advance_one_step())
    }

    pub fn choose(&mut self, index: usize) -> Result<String, JsError> {
        to_json(&self.engine.resolve_choice(index))
    }

    pub fn skip(&mut self) -> Result<String, JsError> {
        to_json(&self.engine.skip_to_next_choice())
    }

    pub fn return_to_menu(&mut self) -> Result<String, JsError> {
        to_json(&self.engine.return_to_menu())
    }

    /// Pass `performance.now()` so the first autoplay step waits a full
    /// interval.
    pub fn toggle_autoplay(&mut self, now_ms: f64) -> bool {
        self.engine.toggle_autoplay(now_ms.max(0.0) as u64)
    }

    /// Call from `requestAnimationFrame` with `performance.now()`.
    pub fn tick(&mut self, now_ms: f64) -> Result<String, JsError> {
        to_json(&self.engine.tick(now_ms.max(0.0) as u64))
    }

    /// Dialogue text revealed so far by the typewriter.
    pub fn visible_text(&mut self, now_ms: f64) -> String {
        self.engine.visible_dialogue(now_ms.max(0.0) as u64).to_string()
    }

    pub fn finish_text(&mut self) {
        self.engine.finish_typewriter();
    }

    pub fn save(&mut self, slot: u8) -> Result<(), JsError> {
        self.engine
            .save(slot)
            .map_err(|e| JsError::new(&format!("Save failed: {e}")))
    }

    pub fn load(&mut self, slot: u8) -> Result<String, JsError> {
        let commands = self
            .engine
            .load(slot)
            .map_err(|e| JsError::new(&format!("Load failed: {e}")))?;
        to_json(&commands)
    }

    /// JSON array of slot summaries, empty slots included.
    pub fn list_slots(&self) -> Result<String, JsError> {
        let slots = self
            .engine
            .list_slots()
            .map_err(|e| JsError::new(&format!("Storage error: {e}")))?;
        to_json(&slots)
    }

    /// The whole store as JSON, for mirroring into `localStorage`.
    pub fn export_store(&self) -> Result<String, JsError> {
        self.store
            .0
            .borrow()
            .to_json()
            .map_err(|e| JsError::new(&format!("Storage error: {e}")))
    }

    pub fn set_music_volume(&mut self, volume: f32) -> Result<String, JsError> {
        to_json(&self.engine.set_music_volume(volume))
    }

    pub fn set_sfx_volume(&mut self, volume: f32) -> Result<String, JsError> {
        to_json(&self.engine.set_sfx_volume(volume))
    }

    pub fn toggle_mute(&mut self) -> Result<String, JsError> {
        to_json(&self.engine.toggle_mute())
    }

    /// JSON snapshot of the progress panel.
    pub fn view(&self) -> Result<String, JsError> {
        let state = self.engine.state();
        let view = SessionView {
            scene: state.current_scene.as_ref().map(|s| s.to_string()),
            line: state.current_line,
            affection: state
                .affection_table()
                .iter()
                .map(|(c, v)| (c.to_string(), *v))
                .collect(),
            choices_made: state.choices_made,
            unlocked_achievements: state
                .unlocked_achievements
                .iter()
                .map(|a| a.to_string())
                .collect(),
            autoplay: self.engine.autoplay_enabled(),
            choice_pending: self.engine.is_choice_pending(),
            at_ending: self.engine.is_at_ending(),
        };
        to_json(&view)
    }
}
