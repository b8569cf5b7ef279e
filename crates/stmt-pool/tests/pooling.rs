//! End-to-end tests for the pooling connection: prepare overloads,
//! handle reuse, close interception, and teardown behavior.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use stmt_pool::{
    DriverError, Error, MaxWait, PoolConfig, PoolingConnection, RawStatement, StatementDriver,
    StatementKey, StatementKind,
};
use tokio_util::sync::CancellationToken;

/// Counters shared between the driver and its statements.
#[derive(Debug, Default)]
struct Counters {
    prepares: AtomicUsize,
    destroys: AtomicUsize,
}

/// A raw statement that records the request it was prepared from.
#[derive(Debug)]
struct RecordedStatement {
    key: StatementKey,
    serial: usize,
    counters: Arc<Counters>,
}

#[async_trait::async_trait]
impl RawStatement for RecordedStatement {
    async fn destroy(&mut self) -> Result<(), DriverError> {
        self.counters.destroys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Driver that hands out recording statements instead of talking to a
/// real server.
#[derive(Debug, Default)]
struct RecordingDriver {
    counters: Arc<Counters>,
    fail_prepare: AtomicBool,
    reject_validation: AtomicBool,
}

impl RecordingDriver {
    fn prepares(&self) -> usize {
        self.counters.prepares.load(Ordering::SeqCst)
    }

    fn destroys(&self) -> usize {
        self.counters.destroys.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StatementDriver for RecordingDriver {
    type Statement = RecordedStatement;

    async fn prepare(&self, key: &StatementKey) -> Result<RecordedStatement, DriverError> {
        if self.fail_prepare.load(Ordering::SeqCst) {
            return Err("server rejected prepare".into());
        }
        let serial = self.counters.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(RecordedStatement {
            key: key.clone(),
            serial,
            counters: Arc::clone(&self.counters),
        })
    }

    async fn validate(&self, _statement: &RecordedStatement) -> bool {
        !self.reject_validation.load(Ordering::SeqCst)
    }
}

fn connection(config: PoolConfig) -> PoolingConnection<RecordingDriver> {
    PoolingConnection::new(RecordingDriver::default(), config).expect("valid config")
}

/// The configuration the reuse and exhaustion tests run under: one
/// live handle globally, one idle slot per key, fail-fast borrows.
fn strict_config() -> PoolConfig {
    PoolConfig::new()
        .max_total(1)
        .max_idle_per_key(1)
        .max_total_per_key(None)
        .block_when_exhausted(false)
        .max_wait(MaxWait::Immediate)
}

#[tokio::test]
async fn test_prepare_records_sql() {
    let conn = connection(strict_config());
    let sql = "select 'a' from dual";

    let stmt = conn.prepare(sql).await.unwrap();
    let raw = stmt.raw().unwrap();
    assert_eq!(raw.key.sql(), sql);
    assert_eq!(raw.key.kind(), StatementKind::Prepared);
    assert_eq!(raw.key.result_set_type(), None);
}

#[tokio::test]
async fn test_prepare_with_generated_keys() {
    let conn = connection(strict_config());
    let sql = "select 'a' from dual";

    let stmt = conn.prepare_with_generated_keys(sql, 0).await.unwrap();
    let raw = stmt.raw().unwrap();
    assert_eq!(raw.key.sql(), sql);
    assert_eq!(raw.key.auto_generated_keys(), Some(0));
}

#[tokio::test]
async fn test_prepare_with_result_set_zero_values() {
    let conn = connection(strict_config());
    let sql = "select 'a' from dual";

    let stmt = conn.prepare_with_result_set(sql, 0, 0).await.unwrap();
    let raw = stmt.raw().unwrap();
    assert_eq!(raw.key.sql(), sql);
    // Explicit zeros, not "unset".
    assert_eq!(raw.key.result_set_type(), Some(0));
    assert_eq!(raw.key.result_set_concurrency(), Some(0));
    assert_eq!(raw.key.result_set_holdability(), None);
}

#[tokio::test]
async fn test_prepare_with_holdability_zero_values() {
    let conn = connection(strict_config());
    let sql = "select 'a' from dual";

    let stmt = conn.prepare_with_holdability(sql, 0, 0, 0).await.unwrap();
    let raw = stmt.raw().unwrap();
    assert_eq!(raw.key.result_set_type(), Some(0));
    assert_eq!(raw.key.result_set_concurrency(), Some(0));
    assert_eq!(raw.key.result_set_holdability(), Some(0));
}

#[tokio::test]
async fn test_prepare_with_column_indexes() {
    let conn = connection(strict_config());
    let sql = "select 'a' from dual";

    let stmt = conn
        .prepare_with_column_indexes(sql, vec![1])
        .await
        .unwrap();
    let raw = stmt.raw().unwrap();
    assert_eq!(raw.key.sql(), sql);
    assert_eq!(raw.key.column_indexes(), Some(&[1][..]));
}

#[tokio::test]
async fn test_prepare_with_column_names() {
    let conn = connection(strict_config());
    let sql = "select 'a' from dual";

    let stmt = conn
        .prepare_with_column_names(sql, vec!["columnName1".to_string()])
        .await
        .unwrap();
    let raw = stmt.raw().unwrap();
    assert_eq!(raw.key.sql(), sql);
    assert_eq!(raw.key.column_names(), Some(&["columnName1".to_string()][..]));
}

#[tokio::test]
async fn test_prepare_call() {
    let conn = connection(strict_config());
    let sql = "select 'a' from dual";

    let stmt = conn.prepare_call(sql).await.unwrap();
    let raw = stmt.raw().unwrap();
    assert_eq!(raw.key.sql(), sql);
    assert_eq!(raw.key.kind(), StatementKind::Callable);
}

#[tokio::test]
async fn test_prepare_call_with_result_set_and_holdability() {
    let conn = connection(strict_config());
    let sql = "select 'a' from dual";

    let mut stmt = conn.prepare_call_with_result_set(sql, 0, 0).await.unwrap();
    {
        let raw = stmt.raw().unwrap();
        assert_eq!(raw.key.result_set_type(), Some(0));
        assert_eq!(raw.key.result_set_concurrency(), Some(0));
    }
    stmt.close().await.unwrap();

    let stmt = conn
        .prepare_call_with_holdability(sql, 0, 0, 0)
        .await
        .unwrap();
    let raw = stmt.raw().unwrap();
    assert_eq!(raw.key.kind(), StatementKind::Callable);
    assert_eq!(raw.key.result_set_holdability(), Some(0));
}

#[tokio::test]
async fn test_close_returns_handle_for_reuse() {
    let conn = connection(strict_config());
    let sql = "select name from users where id = ?";

    let mut stmt = conn.prepare(sql).await.unwrap();
    let serial = stmt.raw().unwrap().serial;
    assert_eq!(conn.stats().active, 1);

    stmt.close().await.unwrap();
    assert_eq!(conn.stats().active, 0);
    assert_eq!(conn.stats().idle, 1);

    // Same SQL again: the pooled handle comes back, no new prepare.
    let reused = conn.prepare(sql).await.unwrap();
    assert_eq!(reused.raw().unwrap().serial, serial);
    assert_eq!(conn.driver().prepares(), 1);
    assert_eq!(conn.stats().active, 1);
    assert_eq!(conn.stats().idle, 0);
}

#[tokio::test]
async fn test_same_sql_different_options_do_not_share_handles() {
    let conn = connection(PoolConfig::new().block_when_exhausted(false));
    let sql = "select 1";

    let mut plain = conn.prepare(sql).await.unwrap();
    plain.close().await.unwrap();

    // Explicit zero options are a different key from unset options, so
    // the pooled handle must not be reused for this request.
    let zeroed = conn.prepare_with_result_set(sql, 0, 0).await.unwrap();
    assert_eq!(zeroed.raw().unwrap().serial, 1);
    assert_eq!(conn.driver().prepares(), 2);
}

#[tokio::test]
async fn test_exhausted_pool_fails_fast() {
    let conn = connection(strict_config());

    // max_total = 1: while the first statement is checked out, a
    // borrow for any key is denied immediately.
    let _held = conn.prepare("select 'a' from dual").await.unwrap();
    let denied = conn.prepare("select 'b' from dual").await;
    assert!(matches!(denied, Err(Error::PoolExhausted)));
}

#[tokio::test]
async fn test_new_statement_reclaims_idle_slot_of_other_sql() {
    let conn = connection(strict_config());

    let mut first = conn.prepare("select 'a' from dual").await.unwrap();
    first.close().await.unwrap();
    assert_eq!(conn.stats().idle, 1);

    // One live handle allowed globally: preparing different SQL evicts
    // the idle handle instead of failing.
    let second = conn.prepare("select 'b' from dual").await.unwrap();
    assert_eq!(second.raw().unwrap().key.sql(), "select 'b' from dual");
    assert_eq!(conn.driver().prepares(), 2);
    assert_eq!(conn.driver().destroys(), 1);
}

#[tokio::test]
async fn test_statement_close_is_idempotent() {
    let conn = connection(strict_config());

    let mut stmt = conn.prepare("select 1").await.unwrap();
    stmt.close().await.unwrap();
    assert!(stmt.is_closed());
    stmt.close().await.unwrap();

    // The handle went back to the pool exactly once.
    assert_eq!(conn.stats().idle, 1);
}

#[tokio::test]
async fn test_raw_access_after_close_is_illegal() {
    let conn = connection(strict_config());

    let mut stmt = conn.prepare("select 1").await.unwrap();
    stmt.close().await.unwrap();

    assert!(matches!(stmt.raw(), Err(Error::IllegalState(_))));
    assert!(matches!(stmt.raw_mut(), Err(Error::IllegalState(_))));
}

#[tokio::test]
async fn test_invalidate_destroys_instead_of_pooling() {
    let conn = connection(strict_config());

    let mut stmt = conn.prepare("select 1").await.unwrap();
    stmt.invalidate().await.unwrap();
    assert!(stmt.is_closed());
    assert_eq!(conn.driver().destroys(), 1);
    assert_eq!(conn.stats().idle, 0);

    // A later close is a no-op, not a double return.
    stmt.close().await.unwrap();
    assert_eq!(conn.stats().idle, 0);

    // The next prepare compiles a fresh handle.
    let fresh = conn.prepare("select 1").await.unwrap();
    assert_eq!(fresh.raw().unwrap().serial, 1);
}

#[tokio::test]
async fn test_prepare_failure_propagates() {
    let conn = connection(strict_config());
    conn.driver().fail_prepare.store(true, Ordering::SeqCst);

    let result = conn.prepare("select 1").await;
    assert!(matches!(result, Err(Error::InvalidHandle(_))));
    assert_eq!(conn.stats().active, 0);
}

#[tokio::test]
async fn test_stale_idle_handle_is_replaced() {
    let conn = connection(strict_config());

    let mut stmt = conn.prepare("select 1").await.unwrap();
    stmt.close().await.unwrap();

    conn.driver().reject_validation.store(true, Ordering::SeqCst);
    let fresh = conn.prepare("select 1").await.unwrap();
    assert_eq!(fresh.raw().unwrap().serial, 1);
    assert_eq!(conn.driver().destroys(), 1);
}

#[tokio::test]
async fn test_connection_close_is_idempotent() {
    let conn = connection(strict_config());

    let mut stmt = conn.prepare("select 1").await.unwrap();
    stmt.close().await.unwrap();
    assert_eq!(conn.stats().idle, 1);

    conn.close().await.unwrap();
    assert!(conn.is_closed());
    assert_eq!(conn.driver().destroys(), 1);

    // Second close does not fail and destroys nothing further.
    conn.close().await.unwrap();
    assert_eq!(conn.driver().destroys(), 1);
}

#[tokio::test]
async fn test_prepare_after_close_is_illegal() {
    let conn = connection(strict_config());
    conn.close().await.unwrap();

    let result = conn.prepare("select 1").await;
    assert!(matches!(result, Err(Error::IllegalState(_))));
}

#[tokio::test]
async fn test_outstanding_statement_destroyed_on_return_after_close() {
    let conn = connection(strict_config());

    let mut outstanding = conn.prepare("select 1").await.unwrap();
    conn.close().await.unwrap();
    assert_eq!(conn.driver().destroys(), 0);

    // The pool no longer accepts enqueues: the close destroys the
    // handle rather than pooling it.
    outstanding.close().await.unwrap();
    assert_eq!(conn.driver().destroys(), 1);
    assert_eq!(conn.stats().idle, 0);
}

#[tokio::test]
async fn test_dropping_statement_returns_it_to_pool() {
    let conn = connection(strict_config());

    let stmt = conn.prepare("select 1").await.unwrap();
    drop(stmt);
    // The implicit return lands on a spawned task.
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(conn.stats().active, 0);
    assert_eq!(conn.stats().idle, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_aborts_waiting_prepare() {
    let conn = Arc::new(connection(
        PoolConfig::new().max_total(1).max_wait(MaxWait::Unbounded),
    ));

    let _held = conn.prepare("select 1").await.unwrap();

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        })
    };

    let result = conn
        .prepare_key_with_cancel(StatementKey::prepared("select 1"), &token)
        .await;
    assert!(matches!(result, Err(Error::Cancelled)));
    canceller.await.unwrap();
}

#[tokio::test]
async fn test_waiting_prepare_woken_by_statement_close() {
    let conn = Arc::new(connection(
        PoolConfig::new().max_total(1).max_wait(MaxWait::Unbounded),
    ));

    let mut held = conn.prepare("select 1").await.unwrap();
    let waiter = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move { conn.prepare("select 1").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    held.close().await.unwrap();
    let reused = waiter.await.unwrap().unwrap();
    assert_eq!(reused.raw().unwrap().serial, 0);
    assert_eq!(conn.driver().prepares(), 1);
}
