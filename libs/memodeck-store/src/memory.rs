//! In-memory tree store driver.
//!
//! Backs tests and single-process use with the full contract: atomic
//! multi-path updates, push keys, server-timestamp materialization, and
//! filtered child subscriptions. State is a nested JSON tree behind one
//! mutex; no lock is held across an await point.

use crate::error::{Result, StoreError};
use crate::keys::KeyGen;
use crate::store::{Changes, ChildEvent, ChildEvents, ChildQuery, TreeStore};
use async_trait::async_trait;
use memodeck_core::types::{SERVER_TIMESTAMP, SERVER_VALUE_KEY};
use memodeck_core::{Node, TreePath};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

struct Subscriber {
    segments: Vec<String>,
    query: ChildQuery,
    tx: mpsc::UnboundedSender<ChildEvent>,
    /// Last matched-children snapshot sent to this subscriber.
    snapshot: BTreeMap<String, Node>,
}

struct Inner {
    root: Node,
    subscribers: Vec<Subscriber>,
    keygen: KeyGen,
}

/// Tree store held entirely in memory.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                root: Value::Object(Map::new()),
                subscribers: Vec::new(),
                keygen: KeyGen::new(),
            }),
        }
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning only happens if a writer panicked; the tree is
        // still structurally sound, so keep serving.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TreeStore for MemoryStore {
    async fn read(&self, path: &TreePath) -> Result<Option<Node>> {
        let inner = self.lock();
        Ok(get(&inner.root, path.segments()).cloned())
    }

    async fn update(&self, changes: Changes) -> Result<()> {
        check_disjoint(&changes)?;
        let now = Self::now_ms();

        let mut inner = self.lock();
        for (path, change) in &changes {
            let segments: Vec<&str> = path.split('/').collect();
            match change {
                Some(node) => {
                    let mut node = node.clone();
                    materialize(&mut node, now);
                    set(&mut inner.root, &segments, node);
                }
                None => remove(&mut inner.root, &segments),
            }
        }
        tracing::debug!(paths = changes.len(), "applied update");
        notify(&mut inner);
        Ok(())
    }

    fn new_key(&self, _collection: &TreePath) -> Option<String> {
        let mut inner = self.lock();
        Some(inner.keygen.next_key(Self::now_ms()))
    }

    async fn subscribe(&self, collection: &TreePath, query: ChildQuery) -> Result<ChildEvents> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();

        let snapshot = matched_children(&inner.root, collection.segments(), &query);
        let mut initial: Vec<_> = snapshot.iter().collect();
        if let Some(field) = &query.order_by {
            initial.sort_by_key(|(key, node)| (order_value(node, field), key.to_string()));
        }
        for (key, node) in initial {
            let _ = tx.send(ChildEvent::Added {
                key: key.clone(),
                node: node.clone(),
            });
        }

        tracing::debug!(path = %collection, "subscription attached");
        inner.subscribers.push(Subscriber {
            segments: collection.segments().to_vec(),
            query,
            tx,
            snapshot,
        });
        Ok(rx)
    }
}

/// Reject batches where one path is an ancestor of another; applying both
/// in one update is ambiguous.
fn check_disjoint(changes: &Changes) -> Result<()> {
    fn is_strict_prefix(a: &[&str], b: &[&str]) -> bool {
        a.len() < b.len() && b[..a.len()] == *a
    }

    let paths: Vec<Vec<&str>> = changes.keys().map(|p| p.split('/').collect()).collect();
    for (i, a) in paths.iter().enumerate() {
        for b in paths.iter().skip(i + 1) {
            if is_strict_prefix(a, b) || is_strict_prefix(b, a) {
                return Err(StoreError::WriteFailed {
                    paths: changes.keys().cloned().collect(),
                });
            }
        }
    }
    Ok(())
}

fn get<'a>(root: &'a Node, segments: &[impl AsRef<str>]) -> Option<&'a Node> {
    let mut node = root;
    for segment in segments {
        node = node.as_object()?.get(segment.as_ref())?;
    }
    Some(node)
}

fn set(root: &mut Node, segments: &[&str], value: Node) {
    let mut node = root;
    let (last, parents) = segments.split_last().expect("empty path");
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = node
            .as_object_mut()
            .expect("just made an object")
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut()
        .expect("just made an object")
        .insert(last.to_string(), value);
}

fn remove(root: &mut Node, segments: &[&str]) {
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };
    if let Some(parent) = get_mut(root, parents) {
        if let Some(map) = parent.as_object_mut() {
            map.remove(*last);
        }
    }
    // Prune now-empty ancestors so absence reads as absence.
    for depth in (1..segments.len()).rev() {
        let empty = get(root, &segments[..depth])
            .and_then(Value::as_object)
            .map(Map::is_empty)
            .unwrap_or(false);
        if !empty {
            break;
        }
        let (leaf, ancestors) = segments[..depth].split_last().expect("non-empty");
        if let Some(parent) = get_mut(root, ancestors) {
            if let Some(map) = parent.as_object_mut() {
                map.remove(*leaf);
            }
        }
    }
}

fn get_mut<'a>(root: &'a mut Node, segments: &[&str]) -> Option<&'a mut Node> {
    let mut node = root;
    for segment in segments {
        node = node.as_object_mut()?.get_mut(*segment)?;
    }
    Some(node)
}

/// Substitute server-timestamp tokens with the store clock, recursively.
fn materialize(node: &mut Node, now_ms: i64) {
    if is_server_token(node) {
        *node = Value::from(now_ms);
        return;
    }
    if let Some(map) = node.as_object_mut() {
        for value in map.values_mut() {
            materialize(value, now_ms);
        }
    }
}

fn is_server_token(node: &Node) -> bool {
    node.as_object()
        .map(|map| {
            map.len() == 1
                && map.get(SERVER_VALUE_KEY).and_then(Value::as_str) == Some(SERVER_TIMESTAMP)
        })
        .unwrap_or(false)
}

fn order_value(node: &Node, field: &str) -> Option<i64> {
    node.as_object()?.get(field)?.as_i64()
}

/// Children of `segments` passing `query`, keyed by child name.
fn matched_children(
    root: &Node,
    segments: &[impl AsRef<str>],
    query: &ChildQuery,
) -> BTreeMap<String, Node> {
    let mut matched = BTreeMap::new();
    let children = match get(root, segments).and_then(Value::as_object) {
        Some(map) => map,
        None => return matched,
    };
    for (key, node) in children {
        if let Some(field) = &query.order_by {
            let value = match order_value(node, field) {
                Some(value) => value,
                None => continue,
            };
            if let Some(bound) = query.end_at {
                if value > bound {
                    continue;
                }
            }
        }
        matched.insert(key.clone(), node.clone());
    }
    matched
}

/// Re-evaluate every subscription and send the diffs since its last
/// snapshot. Dead subscribers are dropped.
fn notify(inner: &mut Inner) {
    let root = inner.root.clone();
    inner.subscribers.retain_mut(|sub| {
        let current = matched_children(&root, &sub.segments, &sub.query);
        let mut alive = true;

        for (key, node) in &current {
            let event = match sub.snapshot.get(key) {
                None => Some(ChildEvent::Added {
                    key: key.clone(),
                    node: node.clone(),
                }),
                Some(previous) if previous != node => Some(ChildEvent::Changed {
                    key: key.clone(),
                    node: node.clone(),
                }),
                Some(_) => None,
            };
            if let Some(event) = event {
                alive &= sub.tx.send(event).is_ok();
            }
        }
        for key in sub.snapshot.keys() {
            if !current.contains_key(key) {
                alive &= sub.tx.send(ChildEvent::Removed { key: key.clone() }).is_ok();
            }
        }

        sub.snapshot = current;
        alive
    });
}
