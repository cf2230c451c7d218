//! SM-2 Spaced Repetition Algorithm
//!
//! Pure state transition for a scheduling record: given the current record
//! and a review grade, compute the next record. No I/O; persistence is the
//! store's job.
//!
//! Grades map to the four review buttons:
//! - 1: Again — failed recall
//! - 3: Hard — correct with serious difficulty
//! - 4: Good — correct after hesitation
//! - 5: Easy — perfect response

use chrono::{DateTime, Duration, Utc};

use crate::models::{Mastery, ReviewRecord};

/// Minimum ease factor allowed
pub const MIN_EASE_FACTOR: f32 = 1.3;

/// Upper bound on any scheduled interval (about a century). Geometric
/// growth crosses the representable date range after a few dozen passes
/// otherwise, and no review cadence is meaningful that far out.
pub const MAX_INTERVAL_DAYS: i32 = 36_500;

/// Repetition count required before a record can leave `Learning`
const REVIEW_MIN_REPETITIONS: i32 = 2;
/// Interval (days) required before a record can leave `Learning`
const REVIEW_MIN_INTERVAL: i32 = 6;
/// Repetition count required before a record can become `Mastered`
const MASTERED_MIN_REPETITIONS: i32 = 5;
/// Ease factor required before a record can become `Mastered`
const MASTERED_MIN_EASE: f32 = 2.5;

/// Discrete review grades. Anything outside the four buttons is rejected
/// at the boundary rather than clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewQuality {
    Again = 1,
    Hard = 3,
    Good = 4,
    Easy = 5,
}

impl ReviewQuality {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Again),
            3 => Some(Self::Hard),
            4 => Some(Self::Good),
            5 => Some(Self::Easy),
            _ => None,
        }
    }

    /// Whether this grade counts as a successful recall
    pub fn is_pass(self) -> bool {
        (self as i32) >= 3
    }
}

/// Apply one review to a record, returning the successor state.
///
/// `now` is passed in explicitly so the transition stays a pure function
/// of its inputs.
pub fn review(record: &ReviewRecord, quality: ReviewQuality, now: DateTime<Utc>) -> ReviewRecord {
    let mut next = record.clone();

    if quality.is_pass() {
        // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02)), floored at 1.3.
        // The updated ease drives this review's interval growth.
        let q = quality as i32;
        next.ease_factor = (record.ease_factor
            + (0.1 - (5 - q) as f32 * (0.08 + (5 - q) as f32 * 0.02)))
            .max(MIN_EASE_FACTOR);

        next.repetitions = record.repetitions + 1;
        next.interval_days = match next.repetitions {
            1 => 1,
            2 => 6,
            _ => ((record.interval_days as f32 * next.ease_factor).round() as i32)
                .min(MAX_INTERVAL_DAYS),
        };

        next.correct_streak = record.correct_streak + 1;
        next.correct_reviews = record.correct_reviews + 1;
        next.mastery = promote(&next);
    } else {
        // Failed recall: reset the repetition ladder. The ease factor is
        // left alone so one lapse does not permanently slow the card.
        next.repetitions = 0;
        next.interval_days = 1;
        next.correct_streak = 0;
        next.mastery = match record.mastery {
            // Nothing to regress if the card was never answered correctly
            Mastery::New => Mastery::New,
            Mastery::Learning | Mastery::Review | Mastery::Mastered => Mastery::Learning,
        };
    }

    next.total_reviews = record.total_reviews + 1;
    next.last_reviewed_at = Some(now);
    next.due_at = now + Duration::days(next.interval_days as i64);

    next
}

/// Walk the mastery ladder upward as far as the counters allow.
///
/// Thresholds are monotone in (repetitions, interval, ease), so a record
/// never skips a tier it has not earned.
fn promote(record: &ReviewRecord) -> Mastery {
    let mut mastery = record.mastery;

    if mastery == Mastery::New {
        mastery = Mastery::Learning;
    }
    if mastery == Mastery::Learning
        && record.repetitions >= REVIEW_MIN_REPETITIONS
        && record.interval_days >= REVIEW_MIN_INTERVAL
    {
        mastery = Mastery::Review;
    }
    if mastery == Mastery::Review
        && record.repetitions >= MASTERED_MIN_REPETITIONS
        && record.ease_factor >= MASTERED_MIN_EASE
    {
        mastery = Mastery::Mastered;
    }

    mastery
}

/// Intervals each grade would produce, in button order (Again, Hard, Good, Easy).
/// Shown to the learner before they answer.
pub fn preview_intervals(record: &ReviewRecord) -> [i32; 4] {
    let now = Utc::now();
    [
        review(record, ReviewQuality::Again, now).interval_days,
        review(record, ReviewQuality::Hard, now).interval_days,
        review(record, ReviewQuality::Good, now).interval_days,
        review(record, ReviewQuality::Easy, now).interval_days,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn new_record() -> ReviewRecord {
        ReviewRecord::new(Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn quality_parsing_rejects_off_scale_values() {
        assert_eq!(ReviewQuality::from_i32(4), Some(ReviewQuality::Good));
        assert_eq!(ReviewQuality::from_i32(0), None);
        assert_eq!(ReviewQuality::from_i32(2), None);
        assert_eq!(ReviewQuality::from_i32(6), None);
    }

    #[test]
    fn first_review_good() {
        let record = new_record();
        let now = Utc::now();
        let next = review(&record, ReviewQuality::Good, now);

        assert_eq!(next.repetitions, 1);
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.mastery, Mastery::Learning);
        assert_eq!(next.due_at, now + Duration::days(1));
        assert_eq!(next.total_reviews, 1);
        assert_eq!(next.correct_reviews, 1);
        assert_eq!(next.correct_streak, 1);
    }

    #[test]
    fn third_review_grows_geometrically() {
        let mut record = new_record();
        record.repetitions = 2;
        record.interval_days = 6;
        record.ease_factor = 2.5;
        record.mastery = Mastery::Review;

        let now = Utc::now();
        let next = review(&record, ReviewQuality::Easy, now);

        assert_eq!(next.repetitions, 3);
        // Easy lifts ease to 2.6 first, so the interval is round(6 * 2.6) = 16
        assert_eq!(next.interval_days, 16);
        assert!((next.ease_factor - 2.6).abs() < 1e-4);
        assert_eq!(next.due_at, now + Duration::days(16));
    }

    #[test]
    fn failure_resets_mastered_card() {
        // A well-learned card lapses
        let mut record = new_record();
        record.repetitions = 6;
        record.interval_days = 40;
        record.ease_factor = 2.6;
        record.mastery = Mastery::Mastered;
        record.correct_streak = 6;

        let now = Utc::now();
        let next = review(&record, ReviewQuality::Again, now);

        assert_eq!(next.repetitions, 0);
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.mastery, Mastery::Learning);
        assert_eq!(next.correct_streak, 0);
        assert_eq!(next.due_at, now + Duration::days(1));
        // EF unchanged on failure
        assert!((next.ease_factor - 2.6).abs() < 1e-4);
    }

    #[test]
    fn failure_on_fresh_card_stays_new() {
        let record = new_record();
        let next = review(&record, ReviewQuality::Again, Utc::now());

        assert_eq!(next.mastery, Mastery::New);
        assert_eq!(next.repetitions, 0);
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.total_reviews, 1);
        assert_eq!(next.correct_reviews, 0);
    }

    #[test]
    fn pass_streak_intervals_never_shrink() {
        let mut record = new_record();
        let now = Utc::now();
        let mut prev_interval = 0;

        for i in 0..12 {
            record = review(&record, ReviewQuality::Hard, now);
            assert!(
                record.interval_days >= prev_interval,
                "interval shrank at step {}: {} < {}",
                i,
                record.interval_days,
                prev_interval
            );
            prev_interval = record.interval_days;
        }
    }

    #[test]
    fn ease_factor_never_below_floor() {
        let mut record = new_record();
        let now = Utc::now();

        // Hard answers push the ease factor down each time
        for _ in 0..50 {
            record = review(&record, ReviewQuality::Hard, now);
            assert!(record.ease_factor >= MIN_EASE_FACTOR);
        }
        assert!((record.ease_factor - MIN_EASE_FACTOR).abs() < 1e-4);
    }

    #[test]
    fn long_easy_streak_caps_at_max_interval() {
        let mut record = new_record();
        let now = Utc::now();

        // Easy grades compound the interval fastest; without the cap this
        // walks past the representable date range
        for _ in 0..40 {
            record = review(&record, ReviewQuality::Easy, now);
            assert!(record.interval_days <= MAX_INTERVAL_DAYS);
            assert_eq!(record.due_at, now + Duration::days(record.interval_days as i64));
        }
        assert_eq!(record.interval_days, MAX_INTERVAL_DAYS);
    }

    #[test]
    fn mastery_ladder_requires_thresholds() {
        let mut record = new_record();
        let now = Utc::now();

        record = review(&record, ReviewQuality::Good, now);
        assert_eq!(record.mastery, Mastery::Learning);

        // Second pass: repetitions=2, interval=6 — promoted to Review
        record = review(&record, ReviewQuality::Good, now);
        assert_eq!(record.mastery, Mastery::Review);

        // Keep passing until repetitions reach 5; Good answers keep ease at 2.5
        record = review(&record, ReviewQuality::Good, now);
        record = review(&record, ReviewQuality::Good, now);
        assert_eq!(record.mastery, Mastery::Review);

        record = review(&record, ReviewQuality::Good, now);
        assert_eq!(record.repetitions, 5);
        assert_eq!(record.mastery, Mastery::Mastered);
    }

    #[test]
    fn hard_cards_do_not_master_on_low_ease() {
        let mut record = new_record();
        let now = Utc::now();

        for _ in 0..8 {
            record = review(&record, ReviewQuality::Hard, now);
        }
        // Plenty of repetitions, but ease has sunk below 2.5
        assert!(record.repetitions >= MASTERED_MIN_REPETITIONS);
        assert!(record.ease_factor < MASTERED_MIN_EASE);
        assert_ne!(record.mastery, Mastery::Mastered);
    }

    #[test]
    fn due_at_never_precedes_last_reviewed_at() {
        let mut record = new_record();
        let now = Utc::now();
        for quality in [
            ReviewQuality::Good,
            ReviewQuality::Again,
            ReviewQuality::Easy,
            ReviewQuality::Hard,
        ] {
            record = review(&record, quality, now);
            assert!(record.due_at >= record.last_reviewed_at.unwrap());
        }
    }

    #[test]
    fn preview_matches_transition() {
        let mut record = new_record();
        record.repetitions = 2;
        record.interval_days = 6;
        record.ease_factor = 2.5;

        let [again, hard, good, easy] = preview_intervals(&record);
        assert_eq!(again, 1);
        // Hard drops ease to 2.36, Good leaves it at 2.5, Easy lifts it to 2.6
        assert_eq!(hard, 14);
        assert_eq!(good, 15);
        assert_eq!(easy, 16);
    }
}
