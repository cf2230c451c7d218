//! Mastery aggregation for dashboards
//!
//! Pure read-side counting over scheduling records, plus a small display
//! cache. The cache holds no authoritative state: every write path through
//! the engine invalidates the affected learner's entries, and a miss simply
//! recomputes from the store snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{DeckStats, Item, Mastery, ReviewRecord};

/// Count mastery buckets and due items over a learner's snapshot.
///
/// Items without a record have never been shown: they count as `new` and as
/// due today, matching the due-queue's treatment of unseen items.
pub fn deck_stats(view: &[(Item, Option<ReviewRecord>)], now: DateTime<Utc>) -> DeckStats {
    let mut stats = DeckStats {
        total: view.len(),
        ..DeckStats::default()
    };

    for (_, record) in view {
        match record.as_ref().map(|r| r.mastery) {
            None | Some(Mastery::New) => stats.new += 1,
            Some(Mastery::Learning) => stats.learning += 1,
            Some(Mastery::Review) => stats.review += 1,
            Some(Mastery::Mastered) => stats.mastered += 1,
        }

        if record.as_ref().map_or(true, |r| r.is_due(now)) {
            stats.due_today += 1;
        }
    }

    stats
}

type CacheKey = (Uuid, Option<Uuid>);

/// Display cache keyed by (learner, deck filter).
///
/// Fills are computed outside the cache lock, so each fill carries the
/// generation it was computed against; an invalidation in between bumps the
/// generation and the stale fill is dropped instead of resurrecting
/// pre-review counts.
#[derive(Default)]
pub struct StatsCache {
    generation: u64,
    entries: HashMap<CacheKey, DeckStats>,
}

impl StatsCache {
    pub fn get(&self, learner_id: Uuid, deck_id: Option<Uuid>) -> Option<DeckStats> {
        self.entries.get(&(learner_id, deck_id)).copied()
    }

    /// The generation to sample before computing a fill
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Insert a computed entry, unless any invalidation ran since
    /// `generation` was sampled
    pub fn put(
        &mut self,
        learner_id: Uuid,
        deck_id: Option<Uuid>,
        stats: DeckStats,
        generation: u64,
    ) {
        if generation == self.generation {
            self.entries.insert((learner_id, deck_id), stats);
        }
    }

    /// Drop every cached entry for one learner
    pub fn invalidate_learner(&mut self, learner_id: Uuid) {
        self.generation += 1;
        self.entries.retain(|(learner, _), _| *learner != learner_id);
    }

    /// Drop everything. Used when item or deck content changes, which
    /// affects every learner's counts.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item() -> Item {
        Item::new(Uuid::new_v4(), "front".into(), "back".into(), None)
    }

    fn record_with(learner: Uuid, item_id: Uuid, mastery: Mastery, due_in_days: i64) -> ReviewRecord {
        let mut record = ReviewRecord::new(learner, item_id);
        record.mastery = mastery;
        record.due_at = Utc::now() + Duration::days(due_in_days);
        record
    }

    #[test]
    fn buckets_are_counted() {
        let learner = Uuid::new_v4();
        let now = Utc::now();
        let mut view = Vec::new();
        for (mastery, due_in) in [
            (Mastery::New, -1),
            (Mastery::Learning, -1),
            (Mastery::Learning, 3),
            (Mastery::Review, 10),
            (Mastery::Mastered, 30),
        ] {
            let it = item();
            let record = record_with(learner, it.id, mastery, due_in);
            view.push((it, Some(record)));
        }
        // One item never shown
        view.push((item(), None));

        let stats = deck_stats(&view, now);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.new, 2);
        assert_eq!(stats.learning, 2);
        assert_eq!(stats.review, 1);
        assert_eq!(stats.mastered, 1);
        // Two overdue records plus the unseen item
        assert_eq!(stats.due_today, 3);
    }

    #[test]
    fn empty_view_is_all_zero() {
        let stats = deck_stats(&[], Utc::now());
        assert_eq!(stats, DeckStats::default());
    }

    #[test]
    fn cache_invalidation_is_per_learner() {
        let mut cache = StatsCache::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let deck = Uuid::new_v4();

        let stats = DeckStats {
            total: 4,
            ..DeckStats::default()
        };
        cache.put(alice, Some(deck), stats, cache.generation());
        cache.put(alice, None, stats, cache.generation());
        cache.put(bob, None, stats, cache.generation());

        cache.invalidate_learner(alice);
        assert!(cache.get(alice, Some(deck)).is_none());
        assert!(cache.get(alice, None).is_none());
        assert!(cache.get(bob, None).is_some());
    }

    #[test]
    fn fill_computed_before_an_invalidation_is_dropped() {
        let mut cache = StatsCache::default();
        let learner = Uuid::new_v4();
        let stats = DeckStats {
            total: 1,
            ..DeckStats::default()
        };

        // A reader samples the generation, then a review lands and
        // invalidates before the reader gets to insert its result
        let sampled = cache.generation();
        cache.invalidate_learner(learner);
        cache.put(learner, None, stats, sampled);
        assert!(cache.get(learner, None).is_none());

        // A fill against the current generation sticks
        cache.put(learner, None, stats, cache.generation());
        assert_eq!(cache.get(learner, None), Some(stats));
    }
}
