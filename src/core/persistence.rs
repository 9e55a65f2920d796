/// Persistence gateway — save slots and the achievement list over a
/// string key/value store shaped like browser local storage.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::schema::ids::{AchievementId, CharacterId, EndingId, SceneId};

/// Number of numbered save slots.
pub const SLOT_COUNT: u8 = 5;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save slot {0} does not exist (valid slots are 1..={SLOT_COUNT})")]
    SlotOutOfRange(u8),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A validated save slot number in `1..=SLOT_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotId(u8);

impl SlotId {
    pub fn new(slot: u8) -> Result<SlotId, PersistenceError> {
        if (1..=SLOT_COUNT).contains(&slot) {
            Ok(SlotId(slot))
        } else {
            Err(PersistenceError::SlotOutOfRange(slot))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Every slot, in order.
    pub fn all() -> impl Iterator<Item = SlotId> {
        (1..=SLOT_COUNT).map(SlotId)
    }
}

impl TryFrom<u8> for SlotId {
    type Error = PersistenceError;

    fn try_from(slot: u8) -> Result<Self, Self::Error> {
        SlotId::new(slot)
    }
}

impl From<SlotId> for u8 {
    fn from(slot: SlotId) -> u8 {
        slot.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a save slot holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSnapshot {
    pub scene: SceneId,
    pub line_index: usize,
    pub character_affection: BTreeMap<CharacterId, i32>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub choices_made: u32,
    #[serde(default)]
    pub visited_scenes: BTreeSet<SceneId>,
    #[serde(default)]
    pub unlocked_endings: BTreeSet<EndingId>,
}

/// One row of the save/load screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSummary {
    pub slot: SlotId,
    pub timestamp: Option<DateTime<Utc>>,
    pub scene: Option<SceneId>,
    pub line_index: Option<usize>,
}

impl SlotSummary {
    pub fn is_empty(&self) -> bool {
        self.scene.is_none()
    }
}

/// String key/value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&mut self, key: &str) -> Result<(), PersistenceError>;
}

/// In-memory store. Can be exported to and restored from JSON so a host
/// can mirror it into real storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every access fails, for exercising storage errors.
    pub fn unavailable() -> Self {
        Self {
            entries: BTreeMap::new(),
            unavailable: true,
        }
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(&self.entries)?)
    }

    pub fn from_json(input: &str) -> Result<MemoryStore, PersistenceError> {
        Ok(MemoryStore {
            entries: serde_json::from_str(input)?,
            unavailable: false,
        })
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.unavailable {
            Err(PersistenceError::Unavailable("memory store disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.check()?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.check()?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.check()?;
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: &Path) -> Result<FileStore, PersistenceError> {
        std::fs::create_dir_all(dir)?;
        Ok(FileStore {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Storage keys used by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub saves: String,
    pub achievements: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            saves: "galgame_save_data".to_string(),
            achievements: "galgame_achievements".to_string(),
        }
    }
}

/// Reads and writes save slots and the unlocked-achievement list.
pub struct SaveGateway {
    store: Box<dyn KeyValueStore>,
    keys: StorageKeys,
}

impl SaveGateway {
    pub fn new(store: Box<dyn KeyValueStore>, keys: StorageKeys) -> Self {
        Self { store, keys }
    }

    /// Write a snapshot into a slot, replacing whatever was there.
    pub fn save(&mut self, slot: SlotId, snapshot: &SaveSnapshot) -> Result<(), PersistenceError> {
        let mut slots = self.read_slots()?;
        slots.insert(slot, snapshot.clone());
        self.write_slots(&slots)?;
        info!(slot = slot.get(), scene = %snapshot.scene, line = snapshot.line_index, "game saved");
        Ok(())
    }

    /// The snapshot stored in a slot, or `None` when the slot is empty.
    pub fn load(&self, slot: SlotId) -> Result<Option<SaveSnapshot>, PersistenceError> {
        let mut slots = self.read_slots()?;
        Ok(slots.remove(&slot))
    }

    pub fn clear(&mut self, slot: SlotId) -> Result<(), PersistenceError> {
        let mut slots = self.read_slots()?;
        if slots.remove(&slot).is_some() {
            self.write_slots(&slots)?;
        }
        Ok(())
    }

    /// A summary for every slot, empty ones included.
    pub fn list_slots(&self) -> Result<Vec<SlotSummary>, PersistenceError> {
        let slots = self.read_slots()?;
        Ok(SlotId::all()
            .map(|slot| match slots.get(&slot) {
                Some(snap) => SlotSummary {
                    slot,
                    timestamp: Some(snap.timestamp),
                    scene: Some(snap.scene.clone()),
                    line_index: Some(snap.line_index),
                },
                None => SlotSummary {
                    slot,
                    timestamp: None,
                    scene: None,
                    line_index: None,
                },
            })
            .collect())
    }

    pub fn load_unlocked_achievements(&self) -> Result<Vec<AchievementId>, PersistenceError> {
        match self.store.get(&self.keys.achievements)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn store_unlocked_achievements(&mut self, unlocked: &[AchievementId]) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(unlocked)?;
        self.store.set(&self.keys.achievements, &raw)
    }

    fn read_slots(&self) -> Result<BTreeMap<SlotId, SaveSnapshot>, PersistenceError> {
        let Some(raw) = self.store.get(&self.keys.saves)? else {
            return Ok(BTreeMap::new());
        };
        // Out-of-range or unreadable entries are dropped rather than failing the read.
        let entries: BTreeMap<u8, serde_json::Value> = serde_json::from_str(&raw)?;
        let mut slots = BTreeMap::new();
        for (n, value) in entries {
            let Ok(slot) = SlotId::new(n) else {
                debug!(slot = n, "ignoring out-of-range save slot");
                continue;
            };
            match serde_json::from_value::<SaveSnapshot>(value) {
                Ok(snap) => {
                    slots.insert(slot, snap);
                }
                Err(e) => warn!(slot = n, error = %e, "dropping unreadable save slot"),
            }
        }
        Ok(slots)
    }

    fn write_slots(&mut self, slots: &BTreeMap<SlotId, SaveSnapshot>) -> Result<(), PersistenceError> {
        let entries: BTreeMap<u8, &SaveSnapshot> = slots.iter().map(|(k, v)| (k.get(), v)).collect();
        let raw = serde_json::to_string(&entries)?;
        self.store.set(&self.keys.saves, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(scene: &str, line: usize) -> SaveSnapshot {
        SaveSnapshot {
            scene: SceneId::from(scene),
            line_index: line,
            character_affection: BTreeMap::from([(CharacterId::from("heroine1"), 15)]),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 2, 18, 30, 0).unwrap(),
            choices_made: 1,
            visited_scenes: BTreeSet::from([SceneId::from("opening"), SceneId::from(scene)]),
            unlocked_endings: BTreeSet::new(),
        }
    }

    fn gateway() -> SaveGateway {
        SaveGateway::new(Box::new(MemoryStore::new()), StorageKeys::default())
    }

    #[test]
    fn slot_range() {
        assert!(SlotId::new(0).is_err());
        assert!(SlotId::new(1).is_ok());
        assert!(SlotId::new(5).is_ok());
        assert!(matches!(SlotId::new(6), Err(PersistenceError::SlotOutOfRange(6))));
        assert_eq!(SlotId::all().count(), 5);
    }

    #[test]
    fn save_then_load() {
        let mut g = gateway();
        let slot = SlotId::new(1).unwrap();
        let snap = snapshot("library", 3);
        g.save(slot, &snap).unwrap();
        assert_eq!(g.load(slot).unwrap(), Some(snap));
        assert_eq!(g.load(SlotId::new(2).unwrap()).unwrap(), None);
    }

    #[test]
    fn save_overwrites_silently() {
        let mut g = gateway();
        let slot = SlotId::new(4).unwrap();
        g.save(slot, &snapshot("library", 3)).unwrap();
        g.save(slot, &snapshot("canteen", 0)).unwrap();
        assert_eq!(g.load(slot).unwrap().unwrap().scene.as_str(), "canteen");
    }

    #[test]
    fn list_slots_includes_empty() {
        let mut g = gateway();
        g.save(SlotId::new(2).unwrap(), &snapshot("canteen", 1)).unwrap();
        let slots = g.list_slots().unwrap();
        assert_eq!(slots.len(), 5);
        assert!(slots[0].is_empty());
        assert_eq!(slots[1].scene.as_ref().map(|s| s.as_str()), Some("canteen"));
        assert_eq!(slots[1].line_index, Some(1));
        assert!(slots[2..].iter().all(SlotSummary::is_empty));
    }

    #[test]
    fn clear_empties_slot() {
        let mut g = gateway();
        let slot = SlotId::new(3).unwrap();
        g.save(slot, &snapshot("library", 0)).unwrap();
        g.clear(slot).unwrap();
        assert!(g.load(slot).unwrap().is_none());
    }

    #[test]
    fn legacy_snapshot_without_progress_fields() {
        let mut store = MemoryStore::new();
        store
            .set(
                "galgame_save_data",
                r#"{"1": {"scene": "opening", "lineIndex": 2, "characterAffection": {"heroine1": 7}, "timestamp": "2024-05-02T18:30:00Z"}}"#,
            )
            .unwrap();
        let g = SaveGateway::new(Box::new(store), StorageKeys::default());
        let snap = g.load(SlotId::new(1).unwrap()).unwrap().unwrap();
        assert_eq!(snap.line_index, 2);
        assert_eq!(snap.choices_made, 0);
        assert!(snap.visited_scenes.is_empty());
    }

    #[test]
    fn unreadable_slot_does_not_block_the_others() {
        let mut store = MemoryStore::new();
        store
            .set(
                "galgame_save_data",
                r#"{"1": {"scene": "opening", "lineIndex": 2, "characterAffection": {}, "timestamp": "2024-05-02T18:30:00Z"},
                    "3": {"scene": null, "lineIndex": 0, "characterAffection": {}}}"#,
            )
            .unwrap();
        let mut g = SaveGateway::new(Box::new(store), StorageKeys::default());

        assert_eq!(g.load(SlotId::new(1).unwrap()).unwrap().unwrap().line_index, 2);
        assert!(g.load(SlotId::new(3).unwrap()).unwrap().is_none());
        let slots = g.list_slots().unwrap();
        assert!(!slots[0].is_empty());
        assert!(slots[2].is_empty());

        g.save(SlotId::new(2).unwrap(), &snapshot("canteen", 1)).unwrap();
        assert!(g.load(SlotId::new(2).unwrap()).unwrap().is_some());
        assert!(g.load(SlotId::new(1).unwrap()).unwrap().is_some());
    }

    #[test]
    fn unavailable_storage_is_an_error() {
        let mut g = SaveGateway::new(Box::new(MemoryStore::unavailable()), StorageKeys::default());
        let result = g.save(SlotId::new(1).unwrap(), &snapshot("opening", 0));
        assert!(matches!(result, Err(PersistenceError::Unavailable(_))));
        assert!(g.list_slots().is_err());
    }

    #[test]
    fn achievement_list_round_trip() {
        let mut g = gateway();
        assert!(g.load_unlocked_achievements().unwrap().is_empty());
        let unlocked = vec![AchievementId::from("first_choice"), AchievementId::from("explorer")];
        g.store_unlocked_achievements(&unlocked).unwrap();
        assert_eq!(g.load_unlocked_achievements().unwrap(), unlocked);
    }

    #[test]
    fn memory_store_export_import() {
        let mut store = MemoryStore::new();
        store.set("k", "v").unwrap();
        let restored = MemoryStore::from_json(&store.to_json().unwrap()).unwrap();
        assert_eq!(restored.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn file_store_keys_are_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("galgame_achievements").unwrap(), None);
        store.set("galgame_achievements", "[\"explorer\"]").unwrap();
        assert!(dir.path().join("galgame_achievements.json").exists());
        assert_eq!(
            store.get("galgame_achievements").unwrap().as_deref(),
            Some("[\"explorer\"]")
        );
        store.remove("galgame_achievements").unwrap();
        store.remove("galgame_achievements").unwrap();
        assert_eq!(store.get("galgame_achievements").unwrap(), None);
    }
}
