// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for the operation lifecycle against a real database.

mod common;

use common::TestContext;

use reachway_core::error::CoreError;
use reachway_core::operation::{
    ConflictGuard, EVENT_ERROR, Operation, OperationKind, OperationStatus,
};

#[tokio::test]
async fn test_start_creates_row_and_start_entry() {
    let ctx = TestContext::new().await;

    let op = Operation::start(
        ctx.persistence(),
        OperationKind::ScenarioCreate,
        1,
        1,
        ConflictGuard::Strict,
    )
    .await
    .unwrap();

    assert!(op.is_started());
    assert!(!op.is_completed());
    assert_eq!(op.status(), OperationStatus::Running);
    assert_eq!(op.project_id(), 1);
    assert_eq!(op.scenario_id(), 1);

    assert_eq!(ctx.log_events(op.id()).await, vec!["start"]);
    assert_eq!(
        ctx.count_operations_for_triple("scenario-create", 1, 1).await,
        1
    );
}

#[tokio::test]
async fn test_finish_closes_operation() {
    let ctx = TestContext::new().await;

    let mut op = Operation::start(
        ctx.persistence(),
        OperationKind::GenerateAnalysis,
        1,
        2,
        ConflictGuard::Strict,
    )
    .await
    .unwrap();

    op.log("road-network-import", Some(serde_json::json!({"edges": 12000})))
        .await
        .unwrap();
    assert!(op.is_started());

    op.finish(None).await.unwrap();

    assert!(op.is_completed());
    assert!(!op.is_started());
    assert_eq!(op.status(), OperationStatus::Complete);
    assert_eq!(
        ctx.log_events(op.id()).await,
        vec!["start", "road-network-import", "finish"]
    );
}

#[tokio::test]
async fn test_error_entry_closes_operation() {
    let ctx = TestContext::new().await;

    let mut op = Operation::start(
        ctx.persistence(),
        OperationKind::GenerateAnalysis,
        3,
        4,
        ConflictGuard::Strict,
    )
    .await
    .unwrap();

    op.log(EVENT_ERROR, Some(serde_json::json!({"error": "boom"})))
        .await
        .unwrap();

    assert!(op.is_completed());
    assert_eq!(op.status(), OperationStatus::Error);

    let last = op.log_entries().last().unwrap();
    assert_eq!(last.event, "error");
    assert_eq!(
        last.data_json().unwrap(),
        Some(serde_json::json!({"error": "boom"}))
    );
}

#[tokio::test]
async fn test_load_by_id() {
    let ctx = TestContext::new().await;

    let op = Operation::start(
        ctx.persistence(),
        OperationKind::ScenarioCreate,
        5,
        6,
        ConflictGuard::Strict,
    )
    .await
    .unwrap();

    let loaded = Operation::load_by_id(ctx.persistence(), op.id())
        .await
        .unwrap();
    assert_eq!(loaded.id(), op.id());
    assert_eq!(loaded.kind(), OperationKind::ScenarioCreate);
    assert!(loaded.is_started());
}

#[tokio::test]
async fn test_load_by_id_miss() {
    let ctx = TestContext::new().await;

    let err = Operation::load_by_id(ctx.persistence(), 999)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::OperationNotFound { .. }));
    assert_eq!(err.error_code(), "OPERATION_NOT_FOUND");
}

#[tokio::test]
async fn test_load_by_data_miss() {
    let ctx = TestContext::new().await;

    let err = Operation::load_by_data(ctx.persistence(), OperationKind::GenerateAnalysis, 1, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::OperationNotFound { .. }));
}

#[tokio::test]
async fn test_load_by_data_returns_most_recent() {
    let ctx = TestContext::new().await;

    // Legacy guard permits two operations for the same triple.
    let mut first = Operation::start(
        ctx.persistence(),
        OperationKind::GenerateAnalysis,
        7,
        8,
        ConflictGuard::Legacy,
    )
    .await
    .unwrap();
    first.finish(None).await.unwrap();

    let second = Operation::start(
        ctx.persistence(),
        OperationKind::GenerateAnalysis,
        7,
        8,
        ConflictGuard::Legacy,
    )
    .await
    .unwrap();

    let latest = Operation::load_by_data(ctx.persistence(), OperationKind::GenerateAnalysis, 7, 8)
        .await
        .unwrap();
    assert_eq!(latest.id(), second.id());
    assert!(latest.is_started());
}

#[tokio::test]
async fn test_triples_do_not_interfere() {
    let ctx = TestContext::new().await;

    // Same project/scenario, different kinds: both strict starts succeed.
    Operation::start(
        ctx.persistence(),
        OperationKind::GenerateAnalysis,
        1,
        1,
        ConflictGuard::Strict,
    )
    .await
    .unwrap();

    Operation::start(
        ctx.persistence(),
        OperationKind::GenerateVectorTiles,
        1,
        1,
        ConflictGuard::Strict,
    )
    .await
    .unwrap();

    // Same kind, different scenario: also fine.
    Operation::start(
        ctx.persistence(),
        OperationKind::GenerateAnalysis,
        1,
        2,
        ConflictGuard::Strict,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_strict_double_start_conflicts() {
    let ctx = TestContext::new().await;

    let mut first = Operation::start(
        ctx.persistence(),
        OperationKind::GenerateAnalysis,
        1,
        1,
        ConflictGuard::Strict,
    )
    .await
    .unwrap();

    let err = Operation::start(
        ctx.persistence(),
        OperationKind::GenerateAnalysis,
        1,
        1,
        ConflictGuard::Strict,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CoreError::OperationConflict { .. }));
    assert_eq!(err.error_code(), "OPERATION_CONFLICT");

    // Closing the first operation releases the triple.
    first.finish(None).await.unwrap();
    Operation::start(
        ctx.persistence(),
        OperationKind::GenerateAnalysis,
        1,
        1,
        ConflictGuard::Strict,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_legacy_double_start_is_not_blocked() {
    let ctx = TestContext::new().await;

    // The legacy guard reproduces the original unguarded window: both
    // starts win and two operations exist for the triple.
    for _ in 0..2 {
        Operation::start(
            ctx.persistence(),
            OperationKind::GenerateAnalysis,
            2,
            2,
            ConflictGuard::Legacy,
        )
        .await
        .unwrap();
    }

    assert_eq!(
        ctx.count_operations_for_triple("generate-analysis", 2, 2).await,
        2
    );
}

#[tokio::test]
async fn test_concurrent_strict_starts_one_winner() {
    let ctx = TestContext::new().await;

    let (a, b) = futures::join!(
        Operation::start(
            ctx.persistence(),
            OperationKind::ScenarioCreate,
            9,
            9,
            ConflictGuard::Strict,
        ),
        Operation::start(
            ctx.persistence(),
            OperationKind::ScenarioCreate,
            9,
            9,
            ConflictGuard::Strict,
        )
    );

    let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1, "exactly one concurrent start must win");
}

#[tokio::test]
async fn test_log_rejects_empty_event() {
    let ctx = TestContext::new().await;

    let mut op = Operation::start(
        ctx.persistence(),
        OperationKind::ScenarioCreate,
        1,
        1,
        ConflictGuard::Strict,
    )
    .await
    .unwrap();

    let err = op.log("", None).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationError { .. }));
}

#[tokio::test]
async fn test_reload_sees_external_writes() {
    let ctx = TestContext::new().await;

    let mut handle = Operation::start(
        ctx.persistence(),
        OperationKind::GenerateAnalysis,
        1,
        1,
        ConflictGuard::Strict,
    )
    .await
    .unwrap();

    // A second handle (e.g. a completion callback) closes the operation.
    let mut other = Operation::load_by_id(ctx.persistence(), handle.id())
        .await
        .unwrap();
    other
        .log(EVENT_ERROR, Some(serde_json::json!({"error": "spawn failed"})))
        .await
        .unwrap();

    assert!(!handle.is_completed(), "stale cache before reload");
    handle.reload().await.unwrap();
    assert!(handle.is_completed());
    assert_eq!(handle.status(), OperationStatus::Error);
}

#[tokio::test]
async fn test_list_operations_and_log_pagination() {
    let ctx = TestContext::new().await;
    let persistence = ctx.persistence();

    for scenario_id in 1..=3 {
        Operation::start(
            persistence.clone(),
            OperationKind::GenerateAnalysis,
            10,
            scenario_id,
            ConflictGuard::Strict,
        )
        .await
        .unwrap();
    }

    let all = persistence.list_operations(10, None, 10, 0).await.unwrap();
    assert_eq!(all.len(), 3);
    // Newest first
    assert!(all[0].id > all[1].id || all[0].created_at >= all[1].created_at);

    let page = persistence.list_operations(10, None, 2, 0).await.unwrap();
    assert_eq!(page.len(), 2);

    let one = persistence
        .list_operations(10, Some(2), 10, 0)
        .await
        .unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].scenario_id, 2);

    assert_eq!(persistence.count_operations(10, None).await.unwrap(), 3);
    assert_eq!(persistence.count_operations(10, Some(2)).await.unwrap(), 1);

    // Log pagination on one operation
    let mut op = Operation::load_by_data(persistence.clone(), OperationKind::GenerateAnalysis, 10, 1)
        .await
        .unwrap();
    op.log("step-one", None).await.unwrap();
    op.log("step-two", None).await.unwrap();

    let entries = persistence.list_log_entries(op.id(), 2, 1).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event, "step-one");
    assert_eq!(entries[1].event, "step-two");
    assert_eq!(persistence.count_log_entries(op.id()).await.unwrap(), 3);
}
