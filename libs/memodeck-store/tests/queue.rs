//! Due-queue view over a live deck.

mod common;

use common::{ctx, make_deck, now_ms};
use futures::StreamExt;
use memodeck_core::{Entity, Level};
use memodeck_store::{subscribe_due, MultiWrite, QueueEvent};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::time::timeout;

const EVENT_WAIT: Duration = Duration::from_secs(2);

async fn next_event(queue: &mut memodeck_store::DueQueue) -> QueueEvent {
    timeout(EVENT_WAIT, queue.next_event())
        .await
        .expect("no queue event arrived")
        .expect("queue closed")
}

#[tokio::test]
async fn fresh_card_is_due_immediately() {
    let ctx = ctx();
    let deck = make_deck(&ctx, "Spanish").await;

    let t0 = now_ms();
    let card = ctx.service.create_card(&deck, "hola", "hello").await.unwrap();

    let mut queue = subscribe_due(ctx.store.clone(), &deck, now_ms() + 1_000)
        .await
        .unwrap();

    match next_event(&mut queue).await {
        QueueEvent::Insert(due) => {
            assert_eq!(Some(due.key.as_str()), card.key());
            assert_eq!(due.level, Level::L0);
            assert!(due.repeat_at >= t0 && due.repeat_at <= t0 + 1_000);
            assert_eq!(due.card.front, "hola");
            assert_eq!(due.card.back, "hello");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn card_created_while_subscribed_arrives_as_a_diff() {
    let ctx = ctx();
    let deck = make_deck(&ctx, "Spanish").await;

    let mut queue = subscribe_due(ctx.store.clone(), &deck, now_ms() + 60_000)
        .await
        .unwrap();

    let card = ctx.service.create_card(&deck, "uno", "one").await.unwrap();

    match next_event(&mut queue).await {
        QueueEvent::Insert(due) => assert_eq!(Some(due.key.as_str()), card.key()),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn answered_card_leaves_the_window() {
    let ctx = ctx();
    let deck = make_deck(&ctx, "Spanish").await;
    let card = ctx.service.create_card(&deck, "dos", "two").await.unwrap();

    let mut queue = subscribe_due(ctx.store.clone(), &deck, now_ms() + 1_000)
        .await
        .unwrap();
    match next_event(&mut queue).await {
        QueueEvent::Insert(_) => {}
        other => panic!("unexpected event {other:?}"),
    }

    // A correct answer pushes repeatAt hours out, past the window.
    ctx.service.answer(&card, true).await.unwrap();

    match next_event(&mut queue).await {
        QueueEvent::Remove(key) => assert_eq!(Some(key.as_str()), card.key()),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn rescheduling_inside_the_window_arrives_as_an_update() {
    let ctx = ctx();
    let deck = make_deck(&ctx, "Spanish").await;
    let card = ctx.service.create_card(&deck, "seis", "six").await.unwrap();

    let mut queue = subscribe_due(ctx.store.clone(), &deck, now_ms() + 60_000)
        .await
        .unwrap();
    match next_event(&mut queue).await {
        QueueEvent::Insert(_) => {}
        other => panic!("unexpected event {other:?}"),
    }

    // Push repeatAt forward, but not past the window bound.
    let mut scheduled = ctx.service.scheduled_card(&card).await.unwrap();
    let rescheduled_at = scheduled.repeat_at + 30_000;
    scheduled.repeat_at = rescheduled_at;
    let mut mw = MultiWrite::new(&*ctx.store);
    mw.save(&mut scheduled).unwrap();
    mw.write().await.unwrap();

    match next_event(&mut queue).await {
        QueueEvent::Update(due) => {
            assert_eq!(Some(due.key.as_str()), card.key());
            assert_eq!(due.repeat_at, rescheduled_at);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn snapshot_is_ordered_by_repeat_at() {
    let ctx = ctx();
    let deck = make_deck(&ctx, "Spanish").await;
    // Created in sequence, so repeatAt (and the key tiebreak) is ascending.
    for (front, back) in [("a", "1"), ("b", "2"), ("c", "3")] {
        ctx.service.create_card(&deck, front, back).await.unwrap();
    }

    let mut queue = subscribe_due(ctx.store.clone(), &deck, now_ms() + 1_000)
        .await
        .unwrap();

    let mut previous = i64::MIN;
    for _ in 0..3 {
        match next_event(&mut queue).await {
            QueueEvent::Insert(due) => {
                assert!(due.repeat_at >= previous);
                previous = due.repeat_at;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn subscription_is_restartable() {
    let ctx = ctx();
    let deck = make_deck(&ctx, "Spanish").await;
    let card = ctx.service.create_card(&deck, "tres", "three").await.unwrap();

    let mut first = subscribe_due(ctx.store.clone(), &deck, now_ms() + 1_000)
        .await
        .unwrap();
    match next_event(&mut first).await {
        QueueEvent::Insert(due) => assert_eq!(Some(due.key.as_str()), card.key()),
        other => panic!("unexpected event {other:?}"),
    }
    drop(first);

    // A fresh subscriber gets the snapshot again.
    let mut second = subscribe_due(ctx.store.clone(), &deck, now_ms() + 1_000)
        .await
        .unwrap();
    match next_event(&mut second).await {
        QueueEvent::Insert(due) => assert_eq!(Some(due.key.as_str()), card.key()),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn queue_works_as_a_futures_stream() {
    let ctx = ctx();
    let deck = make_deck(&ctx, "Spanish").await;
    ctx.service.create_card(&deck, "cuatro", "four").await.unwrap();

    let queue = subscribe_due(ctx.store.clone(), &deck, now_ms() + 1_000)
        .await
        .unwrap();
    let event = timeout(EVENT_WAIT, queue.into_future())
        .await
        .expect("no stream item")
        .0
        .expect("stream closed");
    assert!(matches!(event, QueueEvent::Insert(_)));
}
