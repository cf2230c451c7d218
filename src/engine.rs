//! Engine facade
//!
//! The operations the surrounding portal calls: submit a review, fetch the
//! due queue, fetch stats, manage items and decks. The scheduler transition
//! itself is pure; this layer wires it to the store and handles the
//! optimistic-concurrency retry when two submissions for the same card race
//! (duplicate client retries, multiple devices).

use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::algorithm::{self, ReviewQuality};
use crate::models::{Deck, DeckStats, DueCard, Item, ReviewReceipt};
use crate::queue;
use crate::stats::{self, StatsCache};
use crate::store::{ItemStore, StoreError};

/// How many times a racing review submission is retried before the caller
/// sees a conflict
const MAX_REVIEW_ATTEMPTS: u32 = 3;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid review quality {0}: expected 1 (again), 3 (hard), 4 (good), or 5 (easy)")]
    InvalidQuality(i32),

    #[error("Deck not found: {0}")]
    DeckNotFound(Uuid),

    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Concurrent reviews for item {0} kept conflicting; retry the submission")]
    Conflict(Uuid),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DeckNotFound(id) => Self::DeckNotFound(id),
            StoreError::ItemNotFound(id) => Self::ItemNotFound(id),
            other => Self::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// The review engine: an item store plus the read paths over it
pub struct Engine {
    store: Arc<ItemStore>,
    stats_cache: Mutex<StatsCache>,
}

impl Engine {
    pub fn new(store: Arc<ItemStore>) -> Self {
        Self {
            store,
            stats_cache: Mutex::new(StatsCache::default()),
        }
    }

    /// Open an engine over a store rooted at `data_dir`
    pub fn open(data_dir: std::path::PathBuf) -> Result<Self> {
        Ok(Self::new(Arc::new(ItemStore::open(data_dir)?)))
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    // ==================== Review Operations ====================

    /// Submit one review for a (learner, item) pair.
    ///
    /// Validates the grade, lazily creates the scheduling record on first
    /// exposure, runs the pure transition, and commits with compare-and-swap.
    /// A lost race re-reads the current record and tries again, so duplicate
    /// submissions stay idempotent at this boundary; only
    /// `MAX_REVIEW_ATTEMPTS` consecutive losses surface as `Conflict`.
    pub fn submit_review(
        &self,
        learner_id: Uuid,
        item_id: Uuid,
        quality: i32,
    ) -> Result<ReviewReceipt> {
        let quality =
            ReviewQuality::from_i32(quality).ok_or(EngineError::InvalidQuality(quality))?;

        for attempt in 1..=MAX_REVIEW_ATTEMPTS {
            let record = self.store.get_or_create_record(learner_id, item_id)?;
            let next = algorithm::review(&record, quality, Utc::now());

            match self.store.save_record(&next) {
                Ok(saved) => {
                    self.invalidate_learner(learner_id);
                    log::debug!(
                        "review committed: learner {} item {} -> {:?}, due {}",
                        learner_id,
                        item_id,
                        saved.mastery,
                        saved.due_at
                    );
                    return Ok(ReviewReceipt {
                        item_id,
                        mastery: saved.mastery,
                        due_at: saved.due_at,
                        interval_days: saved.interval_days,
                    });
                }
                Err(StoreError::VersionConflict { .. }) => {
                    log::warn!(
                        "review conflict for learner {} item {} (attempt {}/{})",
                        learner_id,
                        item_id,
                        attempt,
                        MAX_REVIEW_ATTEMPTS
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(EngineError::Conflict(item_id))
    }

    /// The ordered due queue for a learner, optionally restricted to a deck
    /// and capped at `limit` cards
    pub fn get_due_cards(
        &self,
        learner_id: Uuid,
        deck_id: Option<Uuid>,
        limit: Option<usize>,
    ) -> Result<Vec<DueCard>> {
        if let Some(deck_id) = deck_id {
            self.store.get_deck(deck_id)?;
        }
        let view = self.store.learner_view(learner_id, deck_id)?;
        let mut due = queue::due_cards(view, learner_id, Utc::now());
        if let Some(limit) = limit {
            due.truncate(limit);
        }
        Ok(due)
    }

    /// Mastery-bucket counts for a learner, optionally restricted to a deck.
    /// Served from the display cache when nothing has changed since the last
    /// call.
    pub fn get_stats(&self, learner_id: Uuid, deck_id: Option<Uuid>) -> Result<DeckStats> {
        if let Some(deck_id) = deck_id {
            self.store.get_deck(deck_id)?;
        }

        // Sample the generation with the miss check: a review that commits
        // while we compute bumps it, and the stale fill is dropped at put.
        let generation = match self.stats_cache.lock() {
            Ok(cache) => {
                if let Some(cached) = cache.get(learner_id, deck_id) {
                    return Ok(cached);
                }
                Some(cache.generation())
            }
            Err(_) => None,
        };

        let view = self.store.learner_view(learner_id, deck_id)?;
        let stats = stats::deck_stats(&view, Utc::now());

        if let (Some(generation), Ok(mut cache)) = (generation, self.stats_cache.lock()) {
            cache.put(learner_id, deck_id, stats, generation);
        }
        Ok(stats)
    }

    /// Intervals each review button would schedule for an item, in button
    /// order (Again, Hard, Good, Easy)
    pub fn preview_intervals(&self, learner_id: Uuid, item_id: Uuid) -> Result<[i32; 4]> {
        self.store.get_item(item_id)?;
        let record = self
            .store
            .get_record(learner_id, item_id)?
            .unwrap_or_else(|| crate::models::ReviewRecord::new(learner_id, item_id));
        Ok(algorithm::preview_intervals(&record))
    }

    // ==================== Content Operations ====================

    pub fn create_item(
        &self,
        deck_id: Uuid,
        front: String,
        back: String,
        hint: Option<String>,
    ) -> Result<Item> {
        let item = self.store.create_item(deck_id, front, back, hint)?;
        self.invalidate_all();
        log::info!("created item {} in deck {}", item.id, deck_id);
        Ok(item)
    }

    pub fn delete_item(&self, item_id: Uuid) -> Result<()> {
        self.store.delete_item(item_id)?;
        self.invalidate_all();
        log::info!("deleted item {}", item_id);
        Ok(())
    }

    pub fn create_deck(
        &self,
        name: String,
        description: Option<String>,
        color: Option<String>,
    ) -> Result<Deck> {
        let deck = self.store.create_deck(name, description, color)?;
        Ok(deck)
    }

    pub fn list_decks(&self) -> Result<Vec<Deck>> {
        Ok(self.store.list_decks()?)
    }

    pub fn delete_deck(&self, deck_id: Uuid) -> Result<()> {
        self.store.delete_deck(deck_id)?;
        self.invalidate_all();
        Ok(())
    }

    fn invalidate_learner(&self, learner_id: Uuid) {
        if let Ok(mut cache) = self.stats_cache.lock() {
            cache.invalidate_learner(learner_id);
        }
    }

    fn invalidate_all(&self) {
        if let Ok(mut cache) = self.stats_cache.lock() {
            cache.clear();
        }
    }
}
