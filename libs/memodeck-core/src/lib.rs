//! Core spaced-repetition model shared by store drivers and frontends.
//!
//! Provides:
//! - The entity graph (User, Deck, DeckAccess, Card, ScheduledCard, View)
//!   with canonical tree-store paths and node serialization
//! - The level ladder and repetition interval table with deterministic jitter
//! - The pure answer scheduler
//!
//! Everything here is synchronous and allocation-light; persistence lives in
//! `memodeck-store`.

pub mod error;
pub mod intervals;
pub mod models;
pub mod path;
pub mod scheduler;
pub mod types;

pub use error::{ModelError, Result};
pub use intervals::{key_seed, RepetitionIntervals};
pub use models::{
    AccessLevel, Card, CardParent, CardRef, Deck, DeckAccess, DeckRef, DeckType, Entity,
    ScheduledCard, User, UserRef, View,
};
pub use path::TreePath;
pub use scheduler::{plan, ReviewPlan};
pub use types::{Level, Node, Reply, Timestamp};
