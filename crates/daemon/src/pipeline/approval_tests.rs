// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;

#[tokio::test]
async fn pre_granted_approval_is_consumed_immediately() {
    let store = ApprovalStore::new();
    store.grant("corr-1");
    assert!(store.wait_and_consume("corr-1", Duration::from_millis(50)).await);
    // Single use: a second attempt with the same id times out.
    assert!(!store.wait_and_consume("corr-1", Duration::from_millis(10)).await);
}

#[tokio::test]
async fn waiting_request_is_released_by_a_late_grant() {
    let store = ApprovalStore::new();
    let waiter = store.clone();
    let task = tokio::spawn(async move {
        waiter.wait_and_consume("corr-2", Duration::from_secs(5)).await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    store.grant("corr-2");
    assert!(task.await.unwrap());
}

#[tokio::test]
async fn wait_times_out_without_a_grant() {
    let store = ApprovalStore::new();
    let start = tokio::time::Instant::now();
    assert!(!store.wait_and_consume("corr-3", Duration::from_millis(50)).await);
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn grant_for_another_correlation_does_not_release() {
    let store = ApprovalStore::new();
    let waiter = store.clone();
    let task = tokio::spawn(async move {
        waiter.wait_and_consume("corr-want", Duration::from_millis(80)).await
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    store.grant("corr-other");
    assert!(!task.await.unwrap());
    // The unrelated grant is still there for its own request.
    assert!(store.consume("corr-other"));
}

#[tokio::test]
async fn concurrent_waiters_for_one_grant_produce_exactly_one_winner() {
    let store = ApprovalStore::new();
    let mut tasks = Vec::new();
    for _ in 0..4 {
        let waiter = store.clone();
        tasks.push(tokio::spawn(async move {
            waiter.wait_and_consume("corr-race", Duration::from_millis(200)).await
        }));
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    store.grant("corr-race");

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}
