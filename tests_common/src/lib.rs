//! Common integration testing utilities and generic batch scenarios reusable across backends.

use async_trait::async_trait;
use std::sync::Arc;
use txbatch_core::{write_op, BatchError, BatchOutcome, BatchResult, WriteOperation};

/// Row shape of the demo `users` table.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub user_id: Option<i64>,
    pub user_name: String,
}

/// Expose migration SQL via constants for harnesses.
pub mod migrations {
    pub const LIBSQL_USERS_SQL: &str = include_str!("../migrations/libsql/001_users.sql");
    pub const LIBSQL_POSTS_SQL: &str = include_str!("../migrations/libsql/002_posts.sql");
}

/// Backend harness: a batch runner plus the out-of-band collaborators the
/// scenarios need (operation supply, row counting, table clearing).
#[async_trait]
pub trait BatchHarness: Sync {
    type Handle: Send + Sync + 'static;

    /// Run a batch through the backend's runner.
    async fn run(
        &self,
        operations: Vec<Arc<dyn WriteOperation<Self::Handle>>>,
    ) -> BatchResult<BatchOutcome>;

    /// An operation inserting one user with the given name.
    fn insert_user_op(&self, name: &str) -> Arc<dyn WriteOperation<Self::Handle>>;

    /// Count of committed user rows, observed outside any batch.
    async fn count_users(&self) -> BatchResult<i64>;

    /// Committed user rows, observed outside any batch.
    async fn users(&self) -> BatchResult<Vec<User>>;

    /// Remove all user rows. Must be idempotent.
    async fn clear_users(&self) -> BatchResult<u64>;
}

/// An operation that always fails without touching the store.
pub fn always_failing_op<H>() -> Arc<dyn WriteOperation<H>>
where
    H: Send + Sync + 'static,
{
    Arc::new(write_op(|_tx: H| async {
        Err::<u64, _>(BatchError::store(std::io::Error::new(
            std::io::ErrorKind::Other,
            "task failed",
        )))
    }))
}

/// Five distinct users inserted concurrently all succeed; the batch commits
/// and exactly those users become visible, each with an assigned key.
pub async fn scenario_all_success<H: BatchHarness>(h: &H) -> BatchResult<()> {
    let before = h.count_users().await?;
    let ops: Vec<_> = (0..5)
        .map(|i| h.insert_user_op(&format!("User {}", i)))
        .collect();
    let out = h.run(ops).await?;
    assert_eq!(out.rows_affected, 5);
    assert_eq!(h.count_users().await?, before + 5);
    let users = h.users().await?;
    for u in &users {
        assert!(u.user_id.is_some(), "committed user without a key: {:?}", u);
    }
    let names: Vec<&str> = users.iter().map(|u| u.user_name.as_str()).collect();
    for i in 0..5 {
        let expected = format!("User {}", i);
        assert!(names.contains(&expected.as_str()), "missing {}", expected);
    }
    Ok(())
}

/// Five inserts plus an always-failing sixth operation: nothing persists and
/// every failure is reported with its batch index.
pub async fn scenario_rollback_on_failure<H: BatchHarness>(h: &H) -> BatchResult<()> {
    let before = h.count_users().await?;
    let mut ops: Vec<_> = (0..5)
        .map(|i| h.insert_user_op(&format!("User {}", i)))
        .collect();
    ops.push(always_failing_op());
    let err = h
        .run(ops)
        .await
        .expect_err("a batch with a failing operation must not commit");
    match err {
        BatchError::Operations(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 5);
        }
        other => panic!("expected operation failures, got {:?}", other),
    }
    assert_eq!(h.count_users().await?, before);
    Ok(())
}

/// An empty batch commits trivially with zero rows affected.
pub async fn scenario_empty_batch<H: BatchHarness>(h: &H) -> BatchResult<()> {
    let out = h.run(Vec::new()).await?;
    assert_eq!(out.rows_affected, 0);
    Ok(())
}

/// Clearing all users twice leaves the table empty both times; the second
/// clear is a no-op rather than an error.
pub async fn scenario_idempotent_clear<H: BatchHarness>(h: &H) -> BatchResult<()> {
    let _ = h.run(vec![h.insert_user_op("to be cleared")]).await?;
    let first = h.clear_users().await?;
    assert!(first >= 1);
    assert_eq!(h.count_users().await?, 0);
    let second = h.clear_users().await?;
    assert_eq!(second, 0);
    assert_eq!(h.count_users().await?, 0);
    Ok(())
}
