//! Racing writers against the in-memory store: duplicate checkouts,
//! duplicate webhook deliveries, and a user cancel crossing a gateway cancel.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use creator_subscriptions::application::handlers::subscription::{
    CancelSubscriptionCommand, ReconcileOutcome, StartCheckoutCommand, StartCheckoutResult,
};
use creator_subscriptions::domain::foundation::{SubscriptionId, Timestamp};
use creator_subscriptions::domain::subscription::{SubscriptionError, SubscriptionStatus};

use common::{external_id, gateway_cancel, payment, World};

async fn active_subscription(world: &World) -> (StartCheckoutResult, String) {
    let started = world
        .checkout()
        .handle(StartCheckoutCommand {
            subscriber_id: world.subscriber.id,
            creator_id: world.creator.id,
        })
        .await
        .unwrap();
    let ext = external_id(started.subscription_id);
    world
        .reconciler()
        .handle(payment("evt_first", &ext, world.correlation(), 999, Timestamp::now()))
        .await
        .unwrap();
    (started, ext)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_for_one_pair_admit_exactly_one() {
    let world = World::new();
    // Every attempt passes the pair check before any of them inserts
    world.gateway.set_delay(Duration::from_millis(25));
    let handler = Arc::new(world.checkout());

    let attempts = (0..8).map(|_| {
        let handler = Arc::clone(&handler);
        let cmd = StartCheckoutCommand {
            subscriber_id: world.subscriber.id,
            creator_id: world.creator.id,
        };
        tokio::spawn(async move { handler.handle(cmd).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(SubscriptionError::Conflict { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);

    let stored = world.store.all_subscriptions().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, SubscriptionStatus::Pending);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn losing_checkout_cannot_capture_the_winners_row() {
    let world = World::new();
    world.gateway.set_delay(Duration::from_millis(25));
    let handler = Arc::new(world.checkout());

    let attempts = (0..2).map(|_| {
        let handler = Arc::clone(&handler);
        let cmd = StartCheckoutCommand {
            subscriber_id: world.subscriber.id,
            creator_id: world.creator.id,
        };
        tokio::spawn(async move { handler.handle(cmd).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    let winner = results
        .iter()
        .find_map(|r| r.as_ref().ok())
        .cloned()
        .unwrap();

    // Both sessions were opened; only the loser's was expired.
    let opened: Vec<SubscriptionId> = world
        .gateway
        .calls()
        .into_iter()
        .filter(|c| c.method == "create_checkout_session")
        .map(|c| c.args[3].parse().unwrap())
        .collect();
    assert_eq!(opened.len(), 2);
    let loser = opened
        .into_iter()
        .find(|id| *id != winner.subscription_id)
        .unwrap();
    let expired = world.gateway.expired_sessions();
    assert_eq!(expired.len(), 1);
    assert_ne!(expired[0], winner.session.session_id);

    // Had the loser's session been paid anyway, it stays unmatched.
    let reconciler = world.reconciler();
    let stray = reconciler
        .handle(payment(
            "evt_loser",
            "sub_loser",
            world.correlation_for(loser),
            999,
            Timestamp::now(),
        ))
        .await;
    assert!(matches!(stray, Err(SubscriptionError::OrphanEvent { .. })));

    let paid = reconciler
        .handle(payment(
            "evt_winner",
            "sub_winner",
            world.correlation_for(winner.subscription_id),
            999,
            Timestamp::now(),
        ))
        .await
        .unwrap();
    assert_eq!(
        paid,
        ReconcileOutcome::Applied {
            subscription_id: winner.subscription_id,
            status: SubscriptionStatus::Active
        }
    );
    let payments = world.store.all_payments().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].subscription_id, winner.subscription_id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redeliveries_write_one_ledger_row() {
    let world = World::new();
    let started = world
        .checkout()
        .handle(StartCheckoutCommand {
            subscriber_id: world.subscriber.id,
            creator_id: world.creator.id,
        })
        .await
        .unwrap();
    let ext = external_id(started.subscription_id);
    let reconciler = Arc::new(world.reconciler());
    let event = payment("evt_dup", &ext, world.correlation(), 1_500, Timestamp::now());

    let deliveries = (0..10).map(|_| {
        let reconciler = Arc::clone(&reconciler);
        let event = event.clone();
        tokio::spawn(async move { reconciler.handle(event).await })
    });
    let outcomes: Vec<ReconcileOutcome> = join_all(deliveries)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let applied = outcomes
        .iter()
        .filter(|o| matches!(o, ReconcileOutcome::Applied { .. }))
        .count();
    assert_eq!(applied, 1);
    assert_eq!(world.store.all_payments().unwrap().len(), 1);

    let stored = world.store.all_subscriptions().unwrap();
    assert_eq!(stored[0].status, SubscriptionStatus::Active);
    assert_eq!(stored[0].external_subscription_id.as_deref(), Some(ext.as_str()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_payments_racing_on_one_row_all_land() {
    let world = World::new();
    let (started, ext) = active_subscription(&world).await;
    let reconciler = Arc::new(world.reconciler());

    let deliveries = (0..4).map(|i| {
        let reconciler = Arc::clone(&reconciler);
        let event = payment(
            &format!("evt_renewal_{}", i),
            &ext,
            Default::default(),
            999,
            Timestamp::now().plus_days(30 * (i + 1)),
        );
        tokio::spawn(async move { reconciler.handle(event).await })
    });
    let results: Vec<_> = join_all(deliveries)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    // Four writers fit within the retry budget
    assert!(results.iter().all(|r| r.is_ok()));
    let ledger = world.store.all_payments().unwrap();
    assert_eq!(ledger.len(), 5);
    assert!(ledger.iter().all(|p| p.subscription_id == started.subscription_id));
}

#[tokio::test]
async fn user_cancel_crossing_gateway_cancel_succeeds() {
    let world = World::new();
    let (started, ext) = active_subscription(&world).await;

    // The remote call stalls long enough for the webhook to land first
    world.gateway.set_delay(Duration::from_millis(50));
    let cancel = world.cancel();
    let reconciler = world.reconciler();

    let user_side = cancel.handle(CancelSubscriptionCommand {
        subscriber_id: world.subscriber.id,
        subscription_id: started.subscription_id,
    });
    let gateway_side = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        reconciler
            .handle(gateway_cancel("evt_remote_cancel", &ext, Timestamp::now(), None))
            .await
    };
    let (user_result, gateway_result) = tokio::join!(user_side, gateway_side);

    let canceled = user_result.unwrap();
    assert_eq!(canceled.subscription.status, SubscriptionStatus::Canceled);
    assert!(matches!(
        gateway_result.unwrap(),
        ReconcileOutcome::Applied {
            status: SubscriptionStatus::Canceled,
            ..
        }
    ));

    let stored = world.store.all_subscriptions().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, SubscriptionStatus::Canceled);
}
