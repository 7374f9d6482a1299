//! Level-to-delay mapping with deterministic jitter.
//!
//! The table is compiled in but configurable; any custom table must keep the
//! delays monotone non-decreasing across the ladder.

use crate::error::{ModelError, Result};
use crate::types::Level;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Review delays per level, in milliseconds.
#[derive(Debug, Clone)]
pub struct RepetitionIntervals {
    delays_ms: [i64; Level::ALL.len()],
}

impl Default for RepetitionIntervals {
    fn default() -> Self {
        Self {
            delays_ms: [
                4 * HOUR_MS,  // L0
                DAY_MS,       // L1
                2 * DAY_MS,   // L2
                5 * DAY_MS,   // L3
                10 * DAY_MS,  // L4
                21 * DAY_MS,  // L5
                35 * DAY_MS,  // L6
                56 * DAY_MS,  // L7
            ],
        }
    }
}

impl RepetitionIntervals {
    /// Build a custom table. The delays must be positive and monotone
    /// non-decreasing from L0 to L7.
    pub fn new(delays_ms: [i64; Level::ALL.len()]) -> Result<Self> {
        for window in delays_ms.windows(2) {
            if window[0] <= 0 || window[1] < window[0] {
                return Err(ModelError::InvalidIntervals {
                    detail: format!("delays must be positive and non-decreasing: {delays_ms:?}"),
                });
            }
        }
        Ok(Self { delays_ms })
    }

    /// Delay for `level`, in milliseconds.
    pub fn interval(&self, level: Level) -> i64 {
        self.delays_ms[level.index()]
    }

    /// Next due time: `now + interval(level) + jitter`.
    ///
    /// Jitter is a non-negative offset bounded by `interval / 4`, spreading
    /// clumps of cards created together. It is drawn from a PRNG seeded from
    /// `(level, now, seed)` only, so the result is reproducible.
    pub fn next_time_to_repeat(&self, level: Level, now_ms: i64, seed: u64) -> i64 {
        let interval = self.interval(level);
        now_ms + interval + jitter(interval / 4, level, now_ms, seed)
    }
}

fn jitter(max: i64, level: Level, now_ms: i64, seed: u64) -> i64 {
    if max <= 0 {
        return 0;
    }
    let mut rng = StdRng::seed_from_u64(mix(level, now_ms, seed));
    rng.gen_range(0..=max)
}

fn mix(level: Level, now_ms: i64, seed: u64) -> u64 {
    // splitmix64-style finalizer over the three inputs.
    let mut state = seed
        ^ (now_ms as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ (level.index() as u64) << 56;
    state ^= state >> 30;
    state = state.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    state ^= state >> 27;
    state = state.wrapping_mul(0x94d0_49bb_1331_11eb);
    state ^ (state >> 31)
}

/// Derive a jitter seed from a card key.
pub fn key_seed(key: &str) -> u64 {
    // FNV-1a.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
