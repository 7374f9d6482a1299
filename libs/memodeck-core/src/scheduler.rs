//! Pure answer-to-schedule planning. No side effects, no I/O.

use crate::intervals::RepetitionIntervals;
use crate::models::ScheduledCard;
use crate::types::{Level, Reply};

/// The outcome of one answer: what to record and where the schedule moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPlan {
    /// Level observed immediately before the answer.
    pub level_before: Level,
    /// Level to store on the ScheduledCard.
    pub new_level: Level,
    /// Wire code of the answer.
    pub reply: Reply,
    /// Next due time in epoch milliseconds.
    pub repeat_at: i64,
}

/// Compute the plan for answering `current` with a know/don't-know signal.
///
/// A known card climbs one level (saturating at the top); an unknown card
/// falls back to L0. Either way the next due time is
/// `now + interval(new level) + jitter`, with jitter seeded from `seed`
/// (derive it from the card key via [`crate::intervals::key_seed`]).
pub fn plan(
    current: &ScheduledCard,
    knows: bool,
    now_ms: i64,
    intervals: &RepetitionIntervals,
    seed: u64,
) -> ReviewPlan {
    let new_level = if knows {
        current.level.next()
    } else {
        Level::L0
    };
    ReviewPlan {
        level_before: current.level,
        new_level,
        reply: Reply::from_knows(knows),
        repeat_at: intervals.next_time_to_repeat(new_level, now_ms, seed),
    }
}
