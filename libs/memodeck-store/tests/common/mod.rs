//! Shared fixtures for store integration tests: a ready service over the
//! in-memory driver, plus store wrappers that inject failures or strip
//! push-key semantics.
#![allow(dead_code)]

use async_trait::async_trait;
use memodeck_core::{DeckRef, DeckType, TreePath, UserRef};
use memodeck_store::{
    Changes, ChildEvents, ChildQuery, DeckService, MemoryStore, StoreError, TreeStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct Ctx {
    pub store: Arc<MemoryStore>,
    pub service: DeckService<MemoryStore>,
    pub user: UserRef,
}

pub fn ctx() -> Ctx {
    let store = Arc::new(MemoryStore::new());
    let service = DeckService::new(store.clone());
    Ctx {
        store,
        service,
        user: UserRef::new("u1"),
    }
}

pub async fn make_deck(ctx: &Ctx, name: &str) -> DeckRef {
    ctx.service
        .create_deck(&ctx.user, name, DeckType::Basic)
        .await
        .expect("deck creation failed")
        .deck_ref()
        .expect("fresh deck has a key")
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Wrapper that fails the first `n` updates without applying them.
pub struct FlakyStore {
    inner: MemoryStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    pub fn failing(n: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures: AtomicUsize::new(n),
        }
    }

    /// Arm the wrapper to fail the next `n` updates.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl TreeStore for FlakyStore {
    async fn read(&self, path: &TreePath) -> Result<Option<memodeck_core::Node>, StoreError> {
        self.inner.read(path).await
    }

    async fn update(&self, changes: Changes) -> Result<(), StoreError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::WriteFailed {
                paths: changes.keys().cloned().collect(),
            });
        }
        self.inner.update(changes).await
    }

    fn new_key(&self, collection: &TreePath) -> Option<String> {
        self.inner.new_key(collection)
    }

    async fn subscribe(
        &self,
        collection: &TreePath,
        query: ChildQuery,
    ) -> Result<ChildEvents, StoreError> {
        self.inner.subscribe(collection, query).await
    }
}

/// Wrapper without push-key semantics, forcing local key allocation.
pub struct NoPushKeys {
    inner: MemoryStore,
}

impl NoPushKeys {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
        }
    }
}

#[async_trait]
impl TreeStore for NoPushKeys {
    async fn read(&self, path: &TreePath) -> Result<Option<memodeck_core::Node>, StoreError> {
        self.inner.read(path).await
    }

    async fn update(&self, changes: Changes) -> Result<(), StoreError> {
        self.inner.update(changes).await
    }

    fn new_key(&self, _collection: &TreePath) -> Option<String> {
        None
    }

    async fn subscribe(
        &self,
        collection: &TreePath,
        query: ChildQuery,
    ) -> Result<ChildEvents, StoreError> {
        self.inner.subscribe(collection, query).await
    }
}

/// Wrapper reporting no atomic multi-path support, forcing the batcher's
/// sequential fallback. Records the paths of every applied update.
pub struct NonAtomicStore {
    inner: MemoryStore,
    applied: Mutex<Vec<String>>,
}

impl NonAtomicStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Paths in the order they were applied.
    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl TreeStore for NonAtomicStore {
    async fn read(&self, path: &TreePath) -> Result<Option<memodeck_core::Node>, StoreError> {
        self.inner.read(path).await
    }

    async fn update(&self, changes: Changes) -> Result<(), StoreError> {
        self.applied.lock().unwrap().extend(changes.keys().cloned());
        self.inner.update(changes).await
    }

    fn new_key(&self, collection: &TreePath) -> Option<String> {
        self.inner.new_key(collection)
    }

    async fn subscribe(
        &self,
        collection: &TreePath,
        query: ChildQuery,
    ) -> Result<ChildEvents, StoreError> {
        self.inner.subscribe(collection, query).await
    }

    fn atomic(&self) -> bool {
        false
    }
}
