//! The tree store contract consumed by the persistence layer.

use crate::error::Result;
use async_trait::async_trait;
use memodeck_core::{Node, TreePath};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// One atomic multi-path update: `Some(node)` writes the subtree at the
/// path, `None` deletes it.
pub type Changes = BTreeMap<String, Option<Node>>;

/// Server-side filter and order applied to a child subscription.
///
/// `order_by` names an integer-valued child field; `end_at` is an inclusive
/// upper bound on that field. Children lacking the field are excluded when
/// an order is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildQuery {
    pub order_by: Option<String>,
    pub end_at: Option<i64>,
}

impl ChildQuery {
    /// Order by `field`, keeping children with `field <= bound`.
    pub fn at_most(field: impl Into<String>, bound: i64) -> Self {
        Self {
            order_by: Some(field.into()),
            end_at: Some(bound),
        }
    }
}

/// Incremental diff delivered to a child subscription.
///
/// Subscribers first receive the matching snapshot as a burst of `Added`
/// events, then live diffs. Delivery order within the initial burst is not
/// guaranteed; consumers dedupe by key.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildEvent {
    Added { key: String, node: Node },
    Changed { key: String, node: Node },
    /// Reorder without a value change. Drivers that cannot distinguish a
    /// reorder report `Changed` instead.
    Moved { key: String },
    Removed { key: String },
}

/// Stream of child diffs for one subscription.
pub type ChildEvents = mpsc::UnboundedReceiver<ChildEvent>;

/// Abstract key/value tree store.
///
/// The connection is shared process-wide and thread-safe by contract.
/// Dropping a pending future never cancels an in-flight update; timeouts
/// are the driver's responsibility and surface as `WriteFailed`.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Read the subtree at `path`, if present.
    async fn read(&self, path: &TreePath) -> Result<Option<Node>>;

    /// Apply all changes in one update. Atomic when [`atomic`](Self::atomic)
    /// is true; a `None` value deletes the subtree.
    async fn update(&self, changes: Changes) -> Result<()>;

    /// A fresh time-ordered key under `collection`, or `None` if the store
    /// has no push-key semantics (the caller then allocates locally).
    fn new_key(&self, collection: &TreePath) -> Option<String>;

    /// Subscribe to the children of `collection` under `query`.
    async fn subscribe(&self, collection: &TreePath, query: ChildQuery) -> Result<ChildEvents>;

    /// Whether `update` applies multi-path changes atomically.
    fn atomic(&self) -> bool {
        true
    }
}
