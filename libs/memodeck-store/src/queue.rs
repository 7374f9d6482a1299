//! Due-card queue view.
//!
//! Subscribes to a deck's schedule collection filtered to cards due by a
//! given time, joins each entry with its Card record, and presents the
//! result as a lazy, restartable stream: an initial snapshot followed by
//! incremental diffs. Consumers dedupe by key and must tolerate
//! out-of-order initial delivery.

use crate::error::Result;
use crate::store::{ChildEvent, ChildQuery, TreeStore};
use futures::Stream;
use memodeck_core::{Card, DeckRef, Level, Node, ScheduledCard};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Field the schedule collection is ordered and filtered by.
const REPEAT_AT: &str = "repeatAt";

/// A due schedule entry joined with its card.
#[derive(Debug, Clone)]
pub struct DueCard {
    pub key: String,
    pub level: Level,
    pub repeat_at: i64,
    pub card: Card,
}

/// Incremental change to the due set.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// A card entered the due window (or was part of the initial snapshot).
    Insert(DueCard),
    /// A due card's schedule changed but it stays in the window.
    Update(DueCard),
    /// A card left the due window or was deleted.
    Remove(String),
}

/// Ordered stream of due cards for one deck.
pub struct DueQueue {
    rx: mpsc::UnboundedReceiver<QueueEvent>,
}

impl DueQueue {
    /// Next event, or `None` once the subscription ends.
    pub async fn next_event(&mut self) -> Option<QueueEvent> {
        self.rx.recv().await
    }
}

impl Stream for DueQueue {
    type Item = QueueEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<QueueEvent>> {
        self.rx.poll_recv(cx)
    }
}

/// Subscribe to the cards of `deck` due at or before `due_by`, ordered by
/// repeatAt with the key as tiebreak.
pub async fn subscribe_due<S>(store: Arc<S>, deck: &DeckRef, due_by: i64) -> Result<DueQueue>
where
    S: TreeStore + ?Sized + 'static,
{
    let learning = deck.learning()?;
    let mut events = store
        .subscribe(&learning, ChildQuery::at_most(REPEAT_AT, due_by))
        .await?;

    let (tx, rx) = mpsc::unbounded_channel();
    let deck = deck.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let out = match event {
                ChildEvent::Added { key, node } => {
                    resolve(&*store, &deck, key, node).await.map(QueueEvent::Insert)
                }
                ChildEvent::Changed { key, node } => {
                    resolve(&*store, &deck, key, node).await.map(QueueEvent::Update)
                }
                // A pure reorder carries no new value; the consumer already
                // orders by repeatAt.
                ChildEvent::Moved { .. } => None,
                ChildEvent::Removed { key } => Some(QueueEvent::Remove(key)),
            };
            match out {
                Some(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                None => continue,
            }
        }
    });

    Ok(DueQueue { rx })
}

/// Join a schedule node with its Card. Entries whose card cannot be
/// resolved are dropped from the stream; an orphan sweep reconciles them.
async fn resolve<S: TreeStore + ?Sized>(
    store: &S,
    deck: &DeckRef,
    key: String,
    node: Node,
) -> Option<DueCard> {
    let scheduled = match ScheduledCard::from_node(deck.clone(), key.as_str(), node) {
        Ok(scheduled) => scheduled,
        Err(err) => {
            tracing::warn!(%key, %err, "undecodable schedule entry dropped");
            return None;
        }
    };

    let card_path = deck.cards().ok()?.child(key.as_str()).ok()?;
    let card_node = match store.read(&card_path).await {
        Ok(Some(card_node)) => card_node,
        Ok(None) => {
            tracing::warn!(%key, "schedule entry without card dropped");
            return None;
        }
        Err(err) => {
            tracing::warn!(%key, %err, "card read failed; entry dropped");
            return None;
        }
    };
    let card = Card::from_node(deck.clone(), key.as_str(), card_node).ok()?;

    Some(DueCard {
        key,
        level: scheduled.level,
        repeat_at: scheduled.repeat_at,
        card,
    })
}
