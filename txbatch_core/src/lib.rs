#![forbid(unsafe_code)]
//! Core traits for the txbatch concurrent-write batch runner.
//! This crate is store-agnostic and should not contain any backend-specific logic.

use std::future::Future;
use std::sync::Arc;

/// Lightweight, backend-agnostic error type for batch runs.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The store connection for the batch could not be acquired.
    #[error("connection failure")]
    Connection {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// BEGIN/COMMIT/ROLLBACK itself failed. Fatal for the batch; never retried.
    #[error("transaction {action} failed")]
    Transaction {
        action: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Opaque driver error raised by a statement issued through a transaction handle.
    #[error("store error")]
    Store {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// One or more write operations failed and the whole batch was rolled back.
    /// Every failure is collected; none are swallowed.
    #[error("{} operation(s) failed in batch", .0.len())]
    Operations(Vec<OperationError>),
}

impl BatchError {
    /// Wrap a connection-acquisition failure.
    pub fn connection<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BatchError::Connection {
            source: Box::new(e),
        }
    }

    /// Wrap a transaction-control failure. `action` names the statement that
    /// failed ("begin", "commit" or "rollback").
    pub fn transaction<E>(action: &'static str, e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BatchError::Transaction {
            action,
            source: Box::new(e),
        }
    }

    /// Wrap a driver/statement error.
    pub fn store<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BatchError::Store {
            source: Box::new(e),
        }
    }
}

/// A single failed write operation, tagged with its position in the batch.
#[derive(Debug, thiserror::Error)]
#[error("operation {index} failed")]
pub struct OperationError {
    /// Zero-based index of the operation in the submitted batch.
    pub index: usize,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl OperationError {
    pub fn new<E>(index: usize, e: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            index,
            source: e.into(),
        }
    }
}

/// Convenience alias for results returned by batch runners and operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// The committed result of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    /// Sum of rows affected across every operation in the batch.
    pub rows_affected: u64,
}

/// Lifecycle of a single batch run, recorded by runners for observability.
/// `Committed` and `RolledBack` are the terminal fates; `Closed` always
/// follows once the connection has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    ConnectionOpen,
    TransactionBegun,
    OperationsInFlight,
    Committed,
    RolledBack,
    Closed,
}

impl BatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchPhase::Idle => "idle",
            BatchPhase::ConnectionOpen => "connection_open",
            BatchPhase::TransactionBegun => "transaction_begun",
            BatchPhase::OperationsInFlight => "operations_in_flight",
            BatchPhase::Committed => "committed",
            BatchPhase::RolledBack => "rolled_back",
            BatchPhase::Closed => "closed",
        }
    }
}

/// A unit of work performing one or more writes through the shared transaction
/// handle `H`. Operations in a batch are independent of each other (none
/// depends on another's result) but not of the transaction: a failure in any
/// one of them invalidates the batch for all.
#[async_trait::async_trait]
pub trait WriteOperation<H>: Send + Sync
where
    H: Send + Sync + 'static,
{
    /// Execute against the shared transaction. `tx` is a cheap clone of the
    /// batch's single transaction context; implementations must never commit,
    /// roll back, or open their own transaction through it.
    ///
    /// Returns the number of rows affected on success.
    async fn execute(&self, tx: H) -> BatchResult<u64>;
}

/// Backend-implemented batch runner: executes a set of write operations
/// concurrently over exactly one shared connection/transaction, committing
/// only if every operation succeeds and rolling back otherwise.
#[async_trait::async_trait]
pub trait BatchRunner: Send + Sync {
    /// The transaction handle type vended to operations.
    type Handle: Send + Sync + 'static;

    /// Run the batch to its all-or-nothing outcome. Implementations must join
    /// every operation before deciding the transaction's fate, and must
    /// release the connection on every exit path.
    async fn run(
        &self,
        operations: Vec<Arc<dyn WriteOperation<Self::Handle>>>,
    ) -> BatchResult<BatchOutcome>;
}

/// Adapter turning an async closure into a [`WriteOperation`].
pub struct FnWriteOperation<F> {
    f: F,
}

/// Wrap an async closure as a write operation.
pub fn write_op<H, F, Fut>(f: F) -> FnWriteOperation<F>
where
    H: Send + Sync + 'static,
    F: Fn(H) -> Fut + Send + Sync,
    Fut: Future<Output = BatchResult<u64>> + Send + 'static,
{
    FnWriteOperation { f }
}

#[async_trait::async_trait]
impl<H, F, Fut> WriteOperation<H> for FnWriteOperation<F>
where
    H: Send + Sync + 'static,
    F: Fn(H) -> Fut + Send + Sync,
    Fut: Future<Output = BatchResult<u64>> + Send + 'static,
{
    async fn execute(&self, tx: H) -> BatchResult<u64> {
        (self.f)(tx).await
    }
}
