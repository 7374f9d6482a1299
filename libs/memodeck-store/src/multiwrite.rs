//! Atomic multi-entity write batching.
//!
//! A `MultiWrite` collects saves and deletions, flattening each entity into
//! its canonical path, and submits everything as one atomic update. The
//! batcher is single-use: `write` consumes it. For retry, `build` yields a
//! [`WriteBatch`] whose `commit` may be reissued; an identical batch always
//! converges to the same store state.

use crate::error::{Result, StoreError};
use crate::keys::KeyGen;
use crate::store::{Changes, TreeStore};
use memodeck_core::{Entity, TreePath};

const ALLOCATION_ATTEMPTS: u32 = 3;

/// Builder accumulating planned writes and deletions.
pub struct MultiWrite<'a, S: TreeStore + ?Sized> {
    store: &'a S,
    changes: Changes,
    keygen: KeyGen,
}

impl<S: TreeStore + ?Sized> std::fmt::Debug for MultiWrite<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiWrite")
            .field("changes", &self.changes)
            .finish_non_exhaustive()
    }
}

impl<'a, S: TreeStore + ?Sized> MultiWrite<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            changes: Changes::new(),
            keygen: KeyGen::new(),
        }
    }

    /// Plan a write of the entity at its canonical path, allocating a key
    /// first if it has none.
    pub fn save<E: Entity>(&mut self, entity: &mut E) -> Result<&mut Self> {
        if entity.key().is_none() {
            let collection = entity.collection()?;
            let key = self.allocate(&collection)?;
            entity.assign_key(key);
        }
        let path = entity.path()?.join();
        if matches!(self.changes.get(&path), Some(None)) {
            return Err(StoreError::ConflictingOps { path });
        }
        self.changes.insert(path, Some(entity.to_node()?));
        Ok(self)
    }

    /// Plan a deletion of the entity's subtree.
    pub fn delete<E: Entity>(&mut self, entity: &E) -> Result<&mut Self> {
        let path = entity.path()?;
        self.delete_at(&path)
    }

    /// Plan a deletion of an arbitrary subtree.
    pub fn delete_at(&mut self, path: &TreePath) -> Result<&mut Self> {
        let path = path.join();
        if matches!(self.changes.get(&path), Some(Some(_))) {
            return Err(StoreError::ConflictingOps { path });
        }
        self.changes.insert(path, None);
        Ok(self)
    }

    /// Freeze the plan into a reissuable batch.
    pub fn build(self) -> WriteBatch {
        WriteBatch {
            changes: self.changes,
        }
    }

    /// Build and commit once. The batcher is spent afterwards.
    pub async fn write(self) -> Result<()> {
        let store = self.store;
        let batch = WriteBatch {
            changes: self.changes,
        };
        batch.commit(store).await
    }

    fn allocate(&mut self, collection: &TreePath) -> Result<String> {
        if let Some(key) = self.store.new_key(collection) {
            return Ok(key);
        }
        for _ in 0..ALLOCATION_ATTEMPTS {
            let key = self.keygen.next_key(now_ms());
            let path = collection.child(key.as_str())?.join();
            if !self.changes.contains_key(&path) {
                return Ok(key);
            }
        }
        Err(StoreError::KeyCollision {
            collection: collection.join(),
            attempts: ALLOCATION_ATTEMPTS,
        })
    }
}

/// A frozen, reissuable batch of changes.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteBatch {
    changes: Changes,
}

impl WriteBatch {
    /// Planned paths, in store order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Submit the batch. Safe to call again after a `WriteFailed`: the
    /// effects converge to the same final state.
    pub async fn commit<S: TreeStore + ?Sized>(&self, store: &S) -> Result<()> {
        if self.changes.is_empty() {
            return Ok(());
        }
        if store.atomic() {
            tracing::debug!(paths = self.changes.len(), "committing batch");
            return store.update(self.changes.clone()).await;
        }
        self.commit_sequential(store).await
    }

    /// Fallback for stores without atomic multi-path updates: apply one
    /// path at a time, the most dependent entity (the Card) last, so a
    /// partial failure leaves only orphans a sweep can reconcile.
    async fn commit_sequential<S: TreeStore + ?Sized>(&self, store: &S) -> Result<()> {
        let mut ordered: Vec<(&String, &Option<memodeck_core::Node>)> = self.changes.iter().collect();
        ordered.sort_by_key(|(path, _)| is_card_path(path));

        let mut remaining: Vec<String> = ordered.iter().map(|(path, _)| (*path).clone()).collect();
        for (path, change) in ordered {
            let mut single = Changes::new();
            single.insert(path.clone(), change.clone());
            if store.update(single).await.is_err() {
                return Err(StoreError::WriteFailed { paths: remaining });
            }
            remaining.retain(|p| p != path);
        }
        Ok(())
    }
}

fn is_card_path(path: &str) -> bool {
    // Layout: users/{uid}/cards/{deckKey}/{cardKey}
    path.split('/').nth(2) == Some("cards")
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use memodeck_core::{Card, DeckRef, Level, ScheduledCard, UserRef};
    use pretty_assertions::assert_eq;

    fn deck_ref() -> DeckRef {
        DeckRef::new(UserRef::new("u1"), "d1")
    }

    #[tokio::test]
    async fn save_allocates_a_key_and_plans_the_write() {
        let store = MemoryStore::new();
        let mut card = Card::new(deck_ref(), "hola", "hello");
        let mut mw = MultiWrite::new(&store);
        mw.save(&mut card).unwrap();
        assert!(card.key().is_some());
        let batch = mw.build();
        assert_eq!(batch.paths().count(), 1);
    }

    #[tokio::test]
    async fn save_then_delete_same_path_is_rejected() {
        let store = MemoryStore::new();
        let mut card = Card::new(deck_ref(), "a", "b");
        let mut mw = MultiWrite::new(&store);
        mw.save(&mut card).unwrap();
        let path = card.path().unwrap();
        let err = mw.delete_at(&path).unwrap_err();
        assert!(matches!(err, StoreError::ConflictingOps { .. }));
    }

    #[tokio::test]
    async fn delete_then_save_same_path_is_rejected() {
        let store = MemoryStore::new();
        let mut scheduled = ScheduledCard::new(deck_ref(), Level::L0, 0);
        scheduled.assign_key("c1".into());
        let mut mw = MultiWrite::new(&store);
        mw.delete(&scheduled).unwrap();
        let err = mw.save(&mut scheduled).unwrap_err();
        assert!(matches!(err, StoreError::ConflictingOps { .. }));
    }

    #[tokio::test]
    async fn batch_interleaves_saves_and_deletes_of_different_entities() {
        let store = MemoryStore::new();
        let mut card = Card::new(deck_ref(), "a", "b");
        let mut gone = ScheduledCard::new(deck_ref(), Level::L3, 7);
        gone.assign_key("old".into());

        let mut mw = MultiWrite::new(&store);
        mw.save(&mut card).unwrap();
        mw.delete(&gone).unwrap();
        mw.write().await.unwrap();
    }
}
