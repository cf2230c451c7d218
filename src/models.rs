//! Data models for the review engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A deck is a collection of learnable items belonging to one course area
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub card_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deck {
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description: None,
            color: None,
            card_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A reviewable unit: a flashcard or vocabulary entry.
///
/// Content is owned by the authoring flow; the scheduler never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub front: String,
    pub back: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn new(deck_id: Uuid, front: String, back: String, hint: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            deck_id,
            front,
            back,
            hint,
            created_at: Utc::now(),
        }
    }
}

/// Coarse, display-facing mastery bucket for a (learner, item) pair.
///
/// `Mastered` is revocable: a failed review regresses it to `Learning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mastery {
    /// Never reviewed
    New,
    /// In initial learning phase
    Learning,
    /// Regular spaced review
    Review,
    /// Long, stable intervals
    Mastered,
}

impl Default for Mastery {
    fn default() -> Self {
        Self::New
    }
}

/// Per-learner scheduling state for one item.
///
/// Mutated exclusively by the scheduler transition; the store only moves
/// whole records in and out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub learner_id: Uuid,
    pub item_id: Uuid,
    /// SM-2 ease factor, never below 1.3
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f32,
    /// Days until the next exposure
    #[serde(default)]
    pub interval_days: i32,
    /// Consecutive successful reviews since the last failure
    #[serde(default)]
    pub repetitions: i32,
    /// When the item must next be shown
    pub due_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mastery: Mastery,
    #[serde(default)]
    pub correct_streak: i32,
    #[serde(default)]
    pub total_reviews: i32,
    #[serde(default)]
    pub correct_reviews: i32,
    /// Store-managed revision counter for optimistic concurrency
    #[serde(default)]
    pub version: u64,
}

fn default_ease_factor() -> f32 {
    2.5
}

impl ReviewRecord {
    pub fn new(learner_id: Uuid, item_id: Uuid) -> Self {
        Self {
            learner_id,
            item_id,
            ease_factor: default_ease_factor(),
            interval_days: 0,
            repetitions: 0,
            due_at: Utc::now(),
            last_reviewed_at: None,
            mastery: Mastery::New,
            correct_streak: 0,
            total_reviews: 0,
            correct_reviews: 0,
            version: 0,
        }
    }

    /// Check whether the record is due relative to `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}

/// An item joined with its scheduling record, as served to a review session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueCard {
    pub item: Item,
    pub record: ReviewRecord,
}

/// What `submit_review` hands back to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReceipt {
    pub item_id: Uuid,
    pub mastery: Mastery,
    pub due_at: DateTime<Utc>,
    pub interval_days: i32,
}

/// Mastery-bucket counts for a deck (or a learner's whole collection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeckStats {
    pub total: usize,
    pub new: usize,
    pub learning: usize,
    pub review: usize,
    pub mastered: usize,
    pub due_today: usize,
}
