//! Persistence layer for the memodeck core.
//!
//! Provides:
//! - The [`TreeStore`] contract (atomic multi-path updates, push keys,
//!   filtered child subscriptions, server-timestamp materialization)
//! - An in-memory driver implementing the full contract
//! - The MultiWrite batcher and the deck/card transactions built on it
//! - The due-card queue view
//!
//! All mutations return typed completions; batches are idempotent and may
//! be reissued after a `WriteFailed`.

pub mod cards;
pub mod error;
pub mod keys;
pub mod memory;
pub mod multiwrite;
pub mod queue;
pub mod store;

pub use cards::DeckService;
pub use error::{Result, StoreError};
pub use keys::KeyGen;
pub use memory::MemoryStore;
pub use multiwrite::{MultiWrite, WriteBatch};
pub use queue::{subscribe_due, DueCard, DueQueue, QueueEvent};
pub use store::{Changes, ChildEvent, ChildEvents, ChildQuery, TreeStore};
