//! Wire-level value types shared by every entity.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A JSON-like tree store node.
pub type Node = serde_json::Value;

/// Key of the server-timestamp placeholder object.
pub const SERVER_VALUE_KEY: &str = ".sv";

/// Value of the server-timestamp placeholder object.
pub const SERVER_TIMESTAMP: &str = "timestamp";

/// Repetition level of a card, persisted as the literal strings `L0`..`L7`.
///
/// Higher levels mean the user knows the card better and the review delay
/// grows accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    L0,
    L1,
    L2,
    L3,
    L4,
    L5,
    L6,
    L7,
}

impl Level {
    /// All levels in ascending order.
    pub const ALL: [Level; 8] = [
        Level::L0,
        Level::L1,
        Level::L2,
        Level::L3,
        Level::L4,
        Level::L5,
        Level::L6,
        Level::L7,
    ];

    /// The level immediately after `self`; saturates at the top level.
    pub fn next(self) -> Self {
        let index = self.index();
        if index + 1 < Self::ALL.len() {
            Self::ALL[index + 1]
        } else {
            self
        }
    }

    /// Zero-based position in the ladder.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Wire code, `"L0"`..`"L7"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::L0 => "L0",
            Level::L1 => "L1",
            Level::L2 => "L2",
            Level::L3 => "L3",
            Level::L4 => "L4",
            Level::L5 => "L5",
            Level::L6 => "L6",
            Level::L7 => "L7",
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::L0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary recall answer, persisted as the literal strings `Y` and `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Y,
    N,
}

impl Reply {
    /// Map a know/don't-know answer to its wire code.
    pub fn from_knows(knows: bool) -> Self {
        if knows {
            Reply::Y
        } else {
            Reply::N
        }
    }
}

/// A creation timestamp that may not have been materialized yet.
///
/// `Server` serializes to the store's replace-with-server-clock token and
/// must not be compared for ordering until the store acknowledges the write
/// and the value is read back as `At`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// Placeholder substituted with the store clock at write time.
    Server,
    /// Materialized epoch milliseconds.
    At(i64),
}

impl Timestamp {
    /// The materialized value, if the store has substituted it already.
    pub fn materialized(self) -> Option<i64> {
        match self {
            Timestamp::Server => None,
            Timestamp::At(ms) => Some(ms),
        }
    }

    /// Whether this is still the unsubstituted server token.
    pub fn is_server(self) -> bool {
        matches!(self, Timestamp::Server)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::Server
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Timestamp::At(ms) => serializer.serialize_i64(*ms),
            Timestamp::Server => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(SERVER_VALUE_KEY, SERVER_TIMESTAMP)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimestampVisitor;

        impl<'de> Visitor<'de> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("epoch milliseconds or a server-timestamp token")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Timestamp, E> {
                Ok(Timestamp::At(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Timestamp, E> {
                Ok(Timestamp::At(value as i64))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Timestamp, A::Error> {
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    if key == SERVER_VALUE_KEY && value == SERVER_TIMESTAMP {
                        return Ok(Timestamp::Server);
                    }
                }
                Err(de::Error::custom("unrecognized server-value token"))
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}
