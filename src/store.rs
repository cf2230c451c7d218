//! Storage for decks, items, and per-learner scheduling records
//!
//! Directory structure:
//! ```text
//! <data_dir>/
//! ├── decks.json                        # Array of all decks
//! ├── items/
//! │   └── {item-id}.json                # Individual item files
//! └── records/
//!     └── {learner-id}/
//!         └── {item-id}.json            # Scheduling record per (learner, item)
//! ```
//!
//! Everything is loaded into an in-memory index at open and written through
//! on mutation. Mutations run under a single writer lock; `save_record`
//! additionally checks the record's `version` so a stale writer fails with
//! `VersionConflict` instead of silently overwriting a concurrent review.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Deck, Item, ReviewRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Deck not found: {0}")]
    DeckNotFound(Uuid),

    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Record version conflict for learner {learner_id}, item {item_id}: expected {expected}, found {found}")]
    VersionConflict {
        learner_id: Uuid,
        item_id: Uuid,
        expected: u64,
        found: u64,
    },

    #[error("Data directory not found")]
    DataDirNotFound,

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Records are keyed by (learner, item)
pub type RecordKey = (Uuid, Uuid);

#[derive(Default)]
struct Index {
    decks: HashMap<Uuid, Deck>,
    items: HashMap<Uuid, Item>,
    records: HashMap<RecordKey, ReviewRecord>,
}

/// Durable keyed store for learnable items and scheduling records
pub struct ItemStore {
    data_dir: PathBuf,
    index: RwLock<Index>,
}

impl ItemStore {
    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("srs-engine"))
            .ok_or(StoreError::DataDirNotFound)
    }

    /// Open (and if necessary initialize) a store rooted at `data_dir`
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(data_dir.join("items"))?;
        fs::create_dir_all(data_dir.join("records"))?;

        let store = Self {
            data_dir,
            index: RwLock::new(Index::default()),
        };
        store.load()?;
        Ok(store)
    }

    fn decks_path(&self) -> PathBuf {
        self.data_dir.join("decks.json")
    }

    fn item_path(&self, item_id: Uuid) -> PathBuf {
        self.data_dir.join("items").join(format!("{}.json", item_id))
    }

    fn learner_dir(&self, learner_id: Uuid) -> PathBuf {
        self.data_dir.join("records").join(learner_id.to_string())
    }

    fn record_path(&self, learner_id: Uuid, item_id: Uuid) -> PathBuf {
        self.learner_dir(learner_id)
            .join(format!("{}.json", item_id))
    }

    /// Populate the in-memory index from disk
    fn load(&self) -> Result<()> {
        let mut index = self.index.write().map_err(|_| StoreError::LockPoisoned)?;

        let decks_path = self.decks_path();
        if decks_path.exists() {
            let content = fs::read_to_string(&decks_path)?;
            let decks: Vec<Deck> = serde_json::from_str(&content)?;
            index.decks = decks.into_iter().map(|d| (d.id, d)).collect();
        }

        for entry in fs::read_dir(self.data_dir.join("items"))? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                let item: Item = serde_json::from_str(&fs::read_to_string(&path)?)?;
                index.items.insert(item.id, item);
            }
        }

        for learner_entry in fs::read_dir(self.data_dir.join("records"))? {
            let learner_path = learner_entry?.path();
            if !learner_path.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&learner_path)? {
                let path = entry?.path();
                if path.extension().map_or(false, |ext| ext == "json") {
                    let record: ReviewRecord =
                        serde_json::from_str(&fs::read_to_string(&path)?)?;
                    index
                        .records
                        .insert((record.learner_id, record.item_id), record);
                }
            }
        }

        log::debug!(
            "loaded store: {} decks, {} items, {} records",
            index.decks.len(),
            index.items.len(),
            index.records.len()
        );
        Ok(())
    }

    fn write_decks(&self, decks: &HashMap<Uuid, Deck>) -> Result<()> {
        let mut decks: Vec<&Deck> = decks.values().collect();
        decks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        fs::write(self.decks_path(), serde_json::to_string_pretty(&decks)?)?;
        Ok(())
    }

    // ==================== Deck Operations ====================

    /// Create a new deck
    pub fn create_deck(
        &self,
        name: String,
        description: Option<String>,
        color: Option<String>,
    ) -> Result<Deck> {
        let mut index = self.index.write().map_err(|_| StoreError::LockPoisoned)?;

        let mut deck = Deck::new(name);
        deck.description = description;
        deck.color = color;

        // Disk first: a failed write must leave the index untouched
        let mut decks = index.decks.clone();
        decks.insert(deck.id, deck.clone());
        self.write_decks(&decks)?;
        index.decks = decks;

        Ok(deck)
    }

    /// List all decks, most recently updated first
    pub fn list_decks(&self) -> Result<Vec<Deck>> {
        let index = self.index.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut decks: Vec<Deck> = index.decks.values().cloned().collect();
        decks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(decks)
    }

    /// Get a specific deck
    pub fn get_deck(&self, deck_id: Uuid) -> Result<Deck> {
        let index = self.index.read().map_err(|_| StoreError::LockPoisoned)?;
        index
            .decks
            .get(&deck_id)
            .cloned()
            .ok_or(StoreError::DeckNotFound(deck_id))
    }

    /// Delete a deck, cascading to its items and every learner's records
    pub fn delete_deck(&self, deck_id: Uuid) -> Result<()> {
        let mut index = self.index.write().map_err(|_| StoreError::LockPoisoned)?;

        if !index.decks.contains_key(&deck_id) {
            return Err(StoreError::DeckNotFound(deck_id));
        }

        // Commit the deck removal to disk before touching the index, so a
        // failed write cannot resurrect a half-deleted deck on reload
        let mut decks = index.decks.clone();
        decks.remove(&deck_id);
        self.write_decks(&decks)?;
        index.decks = decks;

        let item_ids: Vec<Uuid> = index
            .items
            .values()
            .filter(|i| i.deck_id == deck_id)
            .map(|i| i.id)
            .collect();
        for item_id in item_ids {
            self.remove_item_locked(&mut index, item_id)?;
        }

        log::info!("deleted deck {}", deck_id);
        Ok(())
    }

    // ==================== Item Operations ====================

    /// Create a new item in a deck
    pub fn create_item(
        &self,
        deck_id: Uuid,
        front: String,
        back: String,
        hint: Option<String>,
    ) -> Result<Item> {
        let mut index = self.index.write().map_err(|_| StoreError::LockPoisoned)?;

        if !index.decks.contains_key(&deck_id) {
            return Err(StoreError::DeckNotFound(deck_id));
        }

        let item = Item::new(deck_id, front, back, hint);
        fs::write(
            self.item_path(item.id),
            serde_json::to_string_pretty(&item)?,
        )?;
        index.items.insert(item.id, item.clone());

        self.refresh_deck_count_locked(&mut index, deck_id)?;
        Ok(item)
    }

    /// Get a specific item
    pub fn get_item(&self, item_id: Uuid) -> Result<Item> {
        let index = self.index.read().map_err(|_| StoreError::LockPoisoned)?;
        index
            .items
            .get(&item_id)
            .cloned()
            .ok_or(StoreError::ItemNotFound(item_id))
    }

    /// List items, optionally restricted to one deck, oldest first
    pub fn list_items(&self, deck_id: Option<Uuid>) -> Result<Vec<Item>> {
        let index = self.index.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut items: Vec<Item> = index
            .items
            .values()
            .filter(|i| deck_id.map_or(true, |d| i.deck_id == d))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    /// Delete an item, cascading to every learner's record for it
    pub fn delete_item(&self, item_id: Uuid) -> Result<()> {
        let mut index = self.index.write().map_err(|_| StoreError::LockPoisoned)?;
        let deck_id = self.remove_item_locked(&mut index, item_id)?;
        self.refresh_deck_count_locked(&mut index, deck_id)?;
        Ok(())
    }

    fn remove_item_locked(&self, index: &mut Index, item_id: Uuid) -> Result<Uuid> {
        let item = index
            .items
            .remove(&item_id)
            .ok_or(StoreError::ItemNotFound(item_id))?;

        let item_file = self.item_path(item_id);
        if item_file.exists() {
            fs::remove_file(&item_file)?;
        }

        let keys: Vec<RecordKey> = index
            .records
            .keys()
            .filter(|(_, id)| *id == item_id)
            .copied()
            .collect();
        for (learner_id, _) in &keys {
            let record_file = self.record_path(*learner_id, item_id);
            if record_file.exists() {
                fs::remove_file(&record_file)?;
            }
        }
        for key in keys {
            index.records.remove(&key);
        }

        Ok(item.deck_id)
    }

    fn refresh_deck_count_locked(&self, index: &mut Index, deck_id: Uuid) -> Result<()> {
        let count = index.items.values().filter(|i| i.deck_id == deck_id).count();
        let mut decks = index.decks.clone();
        if let Some(deck) = decks.get_mut(&deck_id) {
            deck.card_count = count;
            deck.updated_at = Utc::now();
        }
        self.write_decks(&decks)?;
        index.decks = decks;
        Ok(())
    }

    // ==================== Record Operations ====================

    /// Get the scheduling record for a (learner, item) pair, creating the
    /// default record if none exists yet. Idempotent: repeated calls with no
    /// intervening review return the same record.
    pub fn get_or_create_record(&self, learner_id: Uuid, item_id: Uuid) -> Result<ReviewRecord> {
        let mut index = self.index.write().map_err(|_| StoreError::LockPoisoned)?;

        if !index.items.contains_key(&item_id) {
            return Err(StoreError::ItemNotFound(item_id));
        }

        if let Some(record) = index.records.get(&(learner_id, item_id)) {
            return Ok(record.clone());
        }

        let record = ReviewRecord::new(learner_id, item_id);
        fs::create_dir_all(self.learner_dir(learner_id))?;
        fs::write(
            self.record_path(learner_id, item_id),
            serde_json::to_string_pretty(&record)?,
        )?;
        index.records.insert((learner_id, item_id), record.clone());

        Ok(record)
    }

    /// Get the stored record for a (learner, item) pair, if any
    pub fn get_record(&self, learner_id: Uuid, item_id: Uuid) -> Result<Option<ReviewRecord>> {
        let index = self.index.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(index.records.get(&(learner_id, item_id)).cloned())
    }

    /// Replace a record, compare-and-swap on its version.
    ///
    /// The caller passes the record it read (carrying the version it read);
    /// on success the stored copy has `version + 1`. A mismatch means another
    /// writer committed in between, and nothing is persisted.
    pub fn save_record(&self, record: &ReviewRecord) -> Result<ReviewRecord> {
        let mut index = self.index.write().map_err(|_| StoreError::LockPoisoned)?;

        if !index.items.contains_key(&record.item_id) {
            return Err(StoreError::ItemNotFound(record.item_id));
        }

        let key = (record.learner_id, record.item_id);
        let current = index.records.get(&key).map(|r| r.version).unwrap_or(0);
        if current != record.version {
            return Err(StoreError::VersionConflict {
                learner_id: record.learner_id,
                item_id: record.item_id,
                expected: record.version,
                found: current,
            });
        }

        let mut committed = record.clone();
        committed.version = record.version + 1;

        fs::create_dir_all(self.learner_dir(record.learner_id))?;
        fs::write(
            self.record_path(record.learner_id, record.item_id),
            serde_json::to_string_pretty(&committed)?,
        )?;
        index.records.insert(key, committed.clone());

        Ok(committed)
    }

    /// Snapshot a learner's items with their records, optionally restricted
    /// to one deck. Items the learner has never been shown come back with
    /// `None` for the record.
    pub fn learner_view(
        &self,
        learner_id: Uuid,
        deck_id: Option<Uuid>,
    ) -> Result<Vec<(Item, Option<ReviewRecord>)>> {
        let index = self.index.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut view: Vec<(Item, Option<ReviewRecord>)> = index
            .items
            .values()
            .filter(|i| deck_id.map_or(true, |d| i.deck_id == d))
            .map(|item| {
                let record = index.records.get(&(learner_id, item.id)).cloned();
                (item.clone(), record)
            })
            .collect();
        view.sort_by(|a, b| a.0.created_at.cmp(&b.0.created_at));
        Ok(view)
    }
}
