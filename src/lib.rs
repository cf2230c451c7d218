//! Spaced-repetition scheduling engine
//!
//! Decides, per learner and per item, when a flashcard or vocabulary entry
//! must next be shown, tracks its mastery trajectory, and produces the
//! "due today" queue the review UI consumes.
//!
//! The pieces, leaves first:
//! - [`algorithm`] — the pure SM-2 transition from one scheduling record to
//!   the next.
//! - [`store`] — durable keyed storage for items and per-learner records,
//!   with optimistic concurrency on record saves.
//! - [`queue`] — the read-only due-queue projection.
//! - [`stats`] — mastery-bucket aggregation and its display cache.
//! - [`engine`] — the operations facade the surrounding portal calls.

pub mod algorithm;
pub mod engine;
pub mod models;
pub mod queue;
pub mod stats;
pub mod store;

pub use algorithm::{preview_intervals, review, ReviewQuality};
pub use engine::{Engine, EngineError};
pub use models::{Deck, DeckStats, DueCard, Item, Mastery, ReviewReceipt, ReviewRecord};
pub use store::{ItemStore, StoreError};
