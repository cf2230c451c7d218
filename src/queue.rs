//! Due-queue selection
//!
//! A read-only projection over a learner's store snapshot: which items must
//! be shown now, and in what order. Recomputed fresh on every call, so there
//! is no cursor to invalidate.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{DueCard, Item, ReviewRecord};

/// Select the due cards from a learner's snapshot.
///
/// Items the learner has never been shown count as due immediately: they get
/// a default record stamped with `now`, which also places them after the
/// overdue backlog. Ordering is ascending `due_at` (most overdue first),
/// ties broken by ascending ease factor so harder items surface first.
pub fn due_cards(
    view: Vec<(Item, Option<ReviewRecord>)>,
    learner_id: Uuid,
    now: DateTime<Utc>,
) -> Vec<DueCard> {
    let mut due: Vec<DueCard> = view
        .into_iter()
        .map(|(item, record)| {
            let record = record.unwrap_or_else(|| {
                let mut fresh = ReviewRecord::new(learner_id, item.id);
                fresh.due_at = now;
                fresh
            });
            DueCard { item, record }
        })
        .filter(|card| card.record.is_due(now))
        .collect();

    due.sort_by(|a, b| {
        a.record
            .due_at
            .cmp(&b.record.due_at)
            .then_with(|| {
                a.record
                    .ease_factor
                    .partial_cmp(&b.record.ease_factor)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item() -> Item {
        Item::new(Uuid::new_v4(), "front".into(), "back".into(), None)
    }

    fn record_due(learner: Uuid, item_id: Uuid, days_ago: i64, ease: f32) -> ReviewRecord {
        let mut record = ReviewRecord::new(learner, item_id);
        record.due_at = Utc::now() - Duration::days(days_ago);
        record.ease_factor = ease;
        record
    }

    #[test]
    fn future_records_are_excluded() {
        let learner = Uuid::new_v4();
        let now = Utc::now();
        let view: Vec<(Item, Option<ReviewRecord>)> = (0..3)
            .map(|i| {
                let it = item();
                let mut record = ReviewRecord::new(learner, it.id);
                record.due_at = now + Duration::days(i + 1);
                (it, Some(record))
            })
            .collect();

        assert!(due_cards(view, learner, now).is_empty());
    }

    #[test]
    fn most_overdue_comes_first() {
        let learner = Uuid::new_v4();
        let now = Utc::now();
        let a = item();
        let b = item();
        let c = item();
        let view = vec![
            (a.clone(), Some(record_due(learner, a.id, 1, 2.5))),
            (b.clone(), Some(record_due(learner, b.id, 7, 2.5))),
            (c.clone(), Some(record_due(learner, c.id, 3, 2.5))),
        ];

        let due = due_cards(view, learner, now);
        let order: Vec<Uuid> = due.iter().map(|d| d.item.id).collect();
        assert_eq!(order, vec![b.id, c.id, a.id]);
    }

    #[test]
    fn ties_break_toward_harder_items() {
        let learner = Uuid::new_v4();
        let now = Utc::now();
        let due_at = now - Duration::days(2);
        let easy = item();
        let hard = item();

        let mut easy_record = ReviewRecord::new(learner, easy.id);
        easy_record.due_at = due_at;
        easy_record.ease_factor = 2.7;
        let mut hard_record = ReviewRecord::new(learner, hard.id);
        hard_record.due_at = due_at;
        hard_record.ease_factor = 1.5;

        let view = vec![
            (easy.clone(), Some(easy_record)),
            (hard.clone(), Some(hard_record)),
        ];

        let due = due_cards(view, learner, now);
        assert_eq!(due[0].item.id, hard.id);
        assert_eq!(due[1].item.id, easy.id);
    }

    #[test]
    fn unseen_items_are_due_after_the_backlog() {
        let learner = Uuid::new_v4();
        let now = Utc::now();
        let overdue = item();
        let unseen = item();
        let view = vec![
            (overdue.clone(), Some(record_due(learner, overdue.id, 4, 2.5))),
            (unseen.clone(), None),
        ];

        let due = due_cards(view, learner, now);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].item.id, overdue.id);
        assert_eq!(due[1].item.id, unseen.id);
        assert_eq!(due[1].record.due_at, now);
    }
}
