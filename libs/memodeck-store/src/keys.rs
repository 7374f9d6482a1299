//! Time-ordered push-key generation.
//!
//! Keys are 20 characters: 8 encoding the millisecond timestamp, 12 of
//! entropy. The alphabet is URL-safe and ASCII-ordered, so keys allocated
//! at later timestamps always sort later. Within one millisecond the
//! entropy suffix is incremented instead of redrawn, keeping the order
//! strict and collisions impossible from a single generator.

use rand::Rng;

/// Length of a generated key.
pub const KEY_LEN: usize = 20;

const TIMESTAMP_CHARS: usize = 8;
const SUFFIX_CHARS: usize = 12;

// ASCII-ordered, URL-safe.
const ALPHABET: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Stateful push-key generator.
#[derive(Debug)]
pub struct KeyGen {
    last_ms: i64,
    suffix: [usize; SUFFIX_CHARS],
}

impl KeyGen {
    pub fn new() -> Self {
        Self {
            last_ms: -1,
            suffix: [0; SUFFIX_CHARS],
        }
    }

    /// Generate the next key for the given timestamp.
    pub fn next_key(&mut self, now_ms: i64) -> String {
        if now_ms == self.last_ms {
            self.bump_suffix();
        } else {
            self.last_ms = now_ms;
            let mut rng = rand::thread_rng();
            for slot in self.suffix.iter_mut() {
                *slot = rng.gen_range(0..ALPHABET.len());
            }
        }

        let mut key = Vec::with_capacity(KEY_LEN);
        let mut ms = now_ms;
        for _ in 0..TIMESTAMP_CHARS {
            key.push(ALPHABET[(ms % ALPHABET.len() as i64) as usize]);
            ms /= ALPHABET.len() as i64;
        }
        key.reverse();
        for slot in self.suffix {
            key.push(ALPHABET[slot]);
        }

        String::from_utf8(key).unwrap_or_default()
    }

    fn bump_suffix(&mut self) {
        for slot in self.suffix.iter_mut().rev() {
            if *slot + 1 < ALPHABET.len() {
                *slot += 1;
                return;
            }
            *slot = 0;
        }
    }
}

impl Default for KeyGen {
    fn default() -> Self {
        Self::new()
    }
}
