#![forbid(unsafe_code)]
#![cfg_attr(
    not(feature = "libsql-backend"),
    doc = "Enable feature `libsql-backend` to use this adapter."
)]

#[cfg(feature = "libsql-backend")]
mod backend {
    use std::sync::Arc;
    use std::time::Instant;

    use libsql::Database;
    use tokio::sync::Mutex;
    use txbatch_core::{
        BatchError, BatchOutcome, BatchPhase, BatchResult, BatchRunner, OperationError,
        WriteOperation,
    };

    #[cfg(feature = "tracing")]
    use tracing::{error, info};

    #[inline]
    #[allow(unused_variables)]
    fn obs_record(phase: BatchPhase, ops: usize, rows: u64, start: Instant, success: bool) {
        let elapsed = start.elapsed().as_millis() as u64;
        #[cfg(feature = "tracing")]
        {
            info!(
                phase = phase.as_str(),
                ops = ops,
                rows = rows,
                elapsed_ms = elapsed,
                success = success,
                "batch phase"
            );
        }
        #[cfg(feature = "metrics")]
        {
            metrics::counter!("batch_phases_total", 1, "phase" => phase.as_str());
            metrics::histogram!("batch_phase_elapsed_ms", elapsed as f64, "phase" => phase.as_str());
            if !success {
                metrics::counter!("batch_failures_total", 1, "phase" => phase.as_str());
            }
        }
    }

    /// Transaction-scoped handle shared by every operation in a batch.
    ///
    /// Clones are cheap and all refer to the same underlying connection and
    /// transaction. The libsql connection multiplexes a single SQLite handle,
    /// so statement submission from concurrent tasks is serialized behind an
    /// internal async mutex; transaction control goes through the same gate.
    /// Commit and rollback are the runner's exclusive privilege; the handle
    /// exposes no transaction-control surface.
    #[derive(Clone)]
    pub struct TxHandle {
        conn: libsql::Connection,
        gate: Arc<Mutex<()>>,
    }

    impl TxHandle {
        fn new(conn: libsql::Connection) -> Self {
            Self {
                conn,
                gate: Arc::new(Mutex::new(())),
            }
        }

        /// Run a single write statement inside the shared transaction.
        /// Returns the number of rows affected.
        pub async fn execute<P>(&self, sql: &str, params: P) -> BatchResult<u64>
        where
            P: libsql::params::IntoParams,
        {
            let _gate = self.gate.lock().await;
            self.conn
                .execute(sql, params)
                .await
                .map_err(BatchError::store)
        }

        /// Run a single-value query inside the shared transaction. Uncommitted
        /// writes issued through this handle are visible here.
        pub async fn query_i64(&self, sql: &str) -> BatchResult<i64> {
            let _gate = self.gate.lock().await;
            let mut rows = self
                .conn
                .query(sql, ())
                .await
                .map_err(BatchError::store)?;
            let row = rows
                .next()
                .await
                .map_err(BatchError::store)?
                .ok_or_else(|| {
                    BatchError::store(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "query returned no rows",
                    ))
                })?;
            row.get(0).map_err(BatchError::store)
        }

        // Transaction control shares the gate with data writes so BEGIN/COMMIT/
        // ROLLBACK never interleaves with an operation's statement.
        async fn control(&self, action: &'static str, sql: &'static str) -> BatchResult<()> {
            let _gate = self.gate.lock().await;
            self.conn
                .execute(sql, ())
                .await
                .map(|_| ())
                .map_err(|e| BatchError::transaction(action, e))
        }
    }

    /// A concrete [`BatchRunner`] for libsql/SQLite.
    ///
    /// Runs a set of independent write operations concurrently over one shared
    /// connection/transaction, committing only if every operation succeeds and
    /// rolling the whole batch back otherwise.
    #[derive(Clone)]
    pub struct LibsqlBatchRunner {
        db: Arc<Database>,
    }

    impl LibsqlBatchRunner {
        /// The database value acts as the connection factory for batches; the
        /// runner opens exactly one connection per `run` call.
        pub fn new(db: Arc<Database>) -> Self {
            Self { db }
        }
        pub fn from_arc(db: Arc<Database>) -> Self {
            Self { db }
        }

        async fn run_batch(
            &self,
            operations: Vec<Arc<dyn WriteOperation<TxHandle>>>,
            start: Instant,
        ) -> BatchResult<BatchOutcome> {
            let total = operations.len();

            let conn = self.db.connect().map_err(BatchError::connection)?;
            // Reduce spurious SQLITE_BUSY while another writer holds the file.
            conn.execute("PRAGMA busy_timeout = 1000", ()).await.ok();
            let handle = TxHandle::new(conn);
            obs_record(BatchPhase::ConnectionOpen, total, 0, start, true);

            handle.control("begin", "BEGIN DEFERRED").await?;
            obs_record(BatchPhase::TransactionBegun, total, 0, start, true);

            // All join handles are created up front and awaited as one group;
            // the transaction's fate is not decided while any operation is
            // still in flight.
            let mut tasks = Vec::with_capacity(total);
            for (index, op) in operations.into_iter().enumerate() {
                let tx = handle.clone();
                tasks.push((index, tokio::spawn(async move { op.execute(tx).await })));
            }
            obs_record(BatchPhase::OperationsInFlight, total, 0, start, true);

            let mut rows_affected = 0u64;
            let mut failures = Vec::new();
            for (index, task) in tasks {
                match task.await {
                    Ok(Ok(rows)) => rows_affected += rows,
                    Ok(Err(e)) => failures.push(OperationError::new(index, e)),
                    // A panicked operation fails the batch like any other error.
                    Err(join_err) => failures.push(OperationError::new(index, join_err)),
                }
            }

            if failures.is_empty() {
                handle.control("commit", "COMMIT").await?;
                obs_record(BatchPhase::Committed, total, rows_affected, start, true);
                Ok(BatchOutcome { rows_affected })
            } else {
                if let Err(tx_err) = handle.control("rollback", "ROLLBACK").await {
                    // The operation errors would otherwise be lost; log them
                    // before surfacing the rollback failure.
                    #[cfg(feature = "tracing")]
                    for f in &failures {
                        error!(index = f.index, error = %f.source, "operation failed, rollback also failed");
                    }
                    obs_record(BatchPhase::RolledBack, total, 0, start, false);
                    return Err(tx_err);
                }
                obs_record(BatchPhase::RolledBack, total, 0, start, false);
                Err(BatchError::Operations(failures))
            }
        }
    }

    #[async_trait::async_trait]
    impl BatchRunner for LibsqlBatchRunner {
        type Handle = TxHandle;

        async fn run(
            &self,
            operations: Vec<Arc<dyn WriteOperation<TxHandle>>>,
        ) -> BatchResult<BatchOutcome> {
            let start = Instant::now();
            let total = operations.len();
            let result = self.run_batch(operations, start).await;
            // The connection is scoped to run_batch and has been dropped on
            // every path by this point.
            obs_record(BatchPhase::Closed, total, 0, start, result.is_ok());
            result
        }
    }
}

#[cfg(feature = "libsql-backend")]
pub use backend::{LibsqlBatchRunner, TxHandle};
