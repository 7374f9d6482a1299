//! Deck and card transactions against the tree store.
//!
//! Each operation issues exactly one MultiWrite (reverse creation issues
//! two independent ones), so its effects are observed atomically or not at
//! all. Failed operations may be reissued; batches are idempotent.

use crate::error::{Result, StoreError};
use crate::multiwrite::MultiWrite;
use crate::store::TreeStore;
use memodeck_core::{
    key_seed, scheduler, AccessLevel, Card, Deck, DeckAccess, DeckRef, DeckType, Entity, Level,
    RepetitionIntervals, ScheduledCard, UserRef, View,
};
use std::sync::Arc;

/// High-level study operations bound to one store connection.
///
/// Holds no mutable state; the interval table is fixed at construction.
pub struct DeckService<S: TreeStore + ?Sized> {
    store: Arc<S>,
    intervals: RepetitionIntervals,
}

impl<S: TreeStore + ?Sized> DeckService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_intervals(store, RepetitionIntervals::default())
    }

    pub fn with_intervals(store: Arc<S>, intervals: RepetitionIntervals) -> Self {
        Self { store, intervals }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn intervals(&self) -> &RepetitionIntervals {
        &self.intervals
    }

    /// Create a deck and its owner access record in one batch.
    pub async fn create_deck(
        &self,
        owner: &UserRef,
        name: &str,
        deck_type: DeckType,
    ) -> Result<Deck> {
        let mut deck = Deck::new(owner.clone(), name, deck_type);
        let mut mw = MultiWrite::new(&*self.store);
        mw.save(&mut deck)?;
        let mut access = DeckAccess::new(deck.deck_ref()?, owner.uid.clone(), AccessLevel::Owner);
        mw.save(&mut access)?;
        mw.write().await?;
        deck.mark_persisted();
        Ok(deck)
    }

    /// Delete a deck with everything under it: access records, cards,
    /// schedules, and views, in one batch.
    pub async fn delete_deck(&self, deck: &Deck) -> Result<()> {
        let deck_ref = deck.deck_ref()?;
        let mut mw = MultiWrite::new(&*self.store);
        mw.delete(deck)?;
        mw.delete_at(&deck_ref.access()?)?;
        mw.delete_at(&deck_ref.cards()?)?;
        mw.delete_at(&deck_ref.learning()?)?;
        mw.delete_at(&deck_ref.views()?)?;
        mw.write().await
    }

    /// Create a card paired with a ScheduledCard at L0 due immediately.
    ///
    /// The card's freshly allocated key is propagated to the ScheduledCard
    /// before the batch is flushed, and the card's parent is re-tagged to
    /// the schedule.
    pub async fn create_card(&self, deck: &DeckRef, front: &str, back: &str) -> Result<Card> {
        let mut card = Card::new(deck.clone(), front, back);
        let mut scheduled = ScheduledCard::new(deck.clone(), Level::L0, now_ms());

        let mut mw = MultiWrite::new(&*self.store);
        mw.save(&mut card)?;
        let key = card
            .key()
            .ok_or_else(|| StoreError::InvariantViolation {
                detail: "card key not allocated by save".into(),
            })?
            .to_string();
        scheduled.assign_key(key.clone());
        card.link_scheduled(key.clone())?;
        mw.save(&mut scheduled)?;
        mw.write().await?;

        card.mark_persisted();
        scheduled.mark_persisted();

        // Pick up the materialized createdAt so later saves carry the value
        // instead of a fresh server token.
        if let Some(node) = self.store.read(&card.path()?).await? {
            let loaded = Card::from_node(deck.clone(), key, node)?;
            card.created_at = loaded.created_at;
        }
        Ok(card)
    }

    /// Create a card and its reversed twin. The two creations are
    /// independent: the second is attempted even if the first fails, and
    /// the first error (if any) is reported.
    pub async fn create_card_with_reverse(
        &self,
        deck: &DeckRef,
        front: &str,
        back: &str,
    ) -> Result<(Card, Card)> {
        let forward = self.create_card(deck, front, back).await;
        let reversed = self.create_card(deck, back, front).await;
        match (forward, reversed) {
            (Ok(forward), Ok(reversed)) => Ok((forward, reversed)),
            (Err(err), _) | (_, Err(err)) => Err(err),
        }
    }

    /// Persist edited card faces at the existing path. `createdAt` is
    /// carried as already stored, never regenerated.
    pub async fn save_card(&self, card: &mut Card) -> Result<()> {
        let mut mw = MultiWrite::new(&*self.store);
        mw.save(card)?;
        mw.write().await?;
        card.mark_persisted();
        Ok(())
    }

    /// Resolve the card's paired ScheduledCard.
    pub async fn scheduled_card(&self, card: &Card) -> Result<ScheduledCard> {
        let path = card.scheduled_path()?;
        let node = self
            .store
            .read(&path)
            .await?
            .ok_or_else(|| StoreError::InvariantViolation {
                detail: format!("no scheduled card at {path}"),
            })?;
        let key = card.key().ok_or_else(|| StoreError::InvariantViolation {
            detail: "card has no key".into(),
        })?;
        Ok(ScheduledCard::from_node(card.deck()?.clone(), key, node)?)
    }

    /// Record one review: append a View, advance the schedule, and touch
    /// the card, all in one batch.
    ///
    /// The card write carries unchanged attributes; it refreshes the store's
    /// last-modified metadata on the card path as a change signal for sync
    /// observers.
    pub async fn answer(&self, card: &Card, knows: bool) -> Result<View> {
        let mut scheduled = self.scheduled_card(card).await?;
        let key = card.key().ok_or_else(|| StoreError::InvariantViolation {
            detail: "card has no key".into(),
        })?;

        let plan = scheduler::plan(&scheduled, knows, now_ms(), &self.intervals, key_seed(key));

        let mut view = View::new(card.card_ref()?, plan.level_before, plan.reply);
        scheduled.level = plan.new_level;
        scheduled.repeat_at = plan.repeat_at;

        let mut touched = card.clone();
        let mut mw = MultiWrite::new(&*self.store);
        mw.save(&mut touched)?;
        mw.save(&mut view)?;
        mw.save(&mut scheduled)?;
        mw.write().await?;

        view.mark_persisted();
        Ok(view)
    }

    /// Remove the card, its ScheduledCard, and its Views subtree in one
    /// batch.
    pub async fn delete_card(&self, card: &Card) -> Result<()> {
        let mut mw = MultiWrite::new(&*self.store);
        mw.delete(card)?;
        mw.delete_at(&card.scheduled_path()?)?;
        mw.delete_at(&card.views_path()?)?;
        mw.write().await
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
