#![forbid(unsafe_code)]
//! Facade crate re-exporting the public API of the `txbatch-rs` workspace.
//!
//! The core idea: a batch of independent write operations runs concurrently
//! over exactly one shared connection/transaction, and the batch commits only
//! if every operation succeeds; otherwise the whole batch is rolled back.
//!
//! ```ignore
//! // Non-runnable snippet; see the runnable example under `txbatch/examples/`.
//! use std::sync::Arc;
//! use txbatch::{write_op, BatchRunner, LibsqlBatchRunner, TxHandle, WriteOperation};
//!
//! let runner = LibsqlBatchRunner::new(db);
//! let ops: Vec<Arc<dyn WriteOperation<TxHandle>>> = (0..5)
//!     .map(|i| {
//!         let name = format!("User {}", i);
//!         Arc::new(write_op(move |tx: TxHandle| {
//!             let name = name.clone();
//!             async move {
//!                 tx.execute("INSERT INTO users (user_name) VALUES (?1)", libsql::params!(name))
//!                     .await
//!             }
//!         })) as Arc<dyn WriteOperation<TxHandle>>
//!     })
//!     .collect();
//! let outcome = runner.run(ops).await?;
//! assert_eq!(outcome.rows_affected, 5);
//! ```

// Re-export all core types.
pub use txbatch_core::{
    write_op, BatchError, BatchOutcome, BatchPhase, BatchResult, BatchRunner, FnWriteOperation,
    OperationError, WriteOperation,
};

// Backend adapter, pulled in via the `libsql-backend` feature.
#[cfg(feature = "libsql-backend")]
pub use txbatch_libsql::{LibsqlBatchRunner, TxHandle};
