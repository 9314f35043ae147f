// Scenario drivers from tests_common exercised against a real libsql database.
// Requires the backend:
//   cargo test -p txbatch_libsql --features libsql-backend --test integration_libsql

#[cfg(feature = "libsql-backend")]
mod libsql_harness {
    use async_trait::async_trait;
    use std::sync::Arc;
    use tests_common::{migrations, BatchHarness, User};
    use txbatch_core::{
        write_op, BatchError, BatchOutcome, BatchResult, BatchRunner, WriteOperation,
    };
    use txbatch_libsql::{LibsqlBatchRunner, TxHandle};

    struct LibsqlHarness {
        db: Arc<libsql::Database>,
        runner: LibsqlBatchRunner,
    }

    impl LibsqlHarness {
        async fn new(dir: &tempfile::TempDir) -> Self {
            let path = dir.path().join("harness.sqlite3");
            #[allow(deprecated)]
            let db = libsql::Database::open(format!("file:{}?mode=rwc", path.display()))
                .expect("open db");
            let conn = db.connect().expect("connect");
            conn.execute(migrations::LIBSQL_USERS_SQL, ())
                .await
                .expect("users schema");
            conn.execute(migrations::LIBSQL_POSTS_SQL, ())
                .await
                .expect("posts schema");
            let db = Arc::new(db);
            let runner = LibsqlBatchRunner::from_arc(db.clone());
            Self { db, runner }
        }

        fn connect(&self) -> libsql::Connection {
            self.db.connect().expect("connect")
        }
    }

    #[async_trait]
    impl BatchHarness for LibsqlHarness {
        type Handle = TxHandle;

        async fn run(
            &self,
            operations: Vec<Arc<dyn WriteOperation<TxHandle>>>,
        ) -> BatchResult<BatchOutcome> {
            self.runner.run(operations).await
        }

        fn insert_user_op(&self, name: &str) -> Arc<dyn WriteOperation<TxHandle>> {
            let name = name.to_string();
            Arc::new(write_op(move |tx: TxHandle| {
                let name = name.clone();
                async move {
                    tx.execute(
                        "INSERT INTO users (user_name) VALUES (?1)",
                        libsql::params!(name),
                    )
                    .await
                }
            }))
        }

        async fn count_users(&self) -> BatchResult<i64> {
            let conn = self.connect();
            let mut rows = conn
                .query("SELECT COUNT(*) FROM users", ())
                .await
                .map_err(BatchError::store)?;
            let row = rows
                .next()
                .await
                .map_err(BatchError::store)?
                .expect("count row");
            row.get(0).map_err(BatchError::store)
        }

        async fn users(&self) -> BatchResult<Vec<User>> {
            let conn = self.connect();
            let mut rows = conn
                .query("SELECT user_id, user_name FROM users ORDER BY user_id", ())
                .await
                .map_err(BatchError::store)?;
            let mut users = Vec::new();
            while let Some(row) = rows.next().await.map_err(BatchError::store)? {
                users.push(User {
                    user_id: Some(row.get(0).map_err(BatchError::store)?),
                    user_name: row.get(1).map_err(BatchError::store)?,
                });
            }
            Ok(users)
        }

        async fn clear_users(&self) -> BatchResult<u64> {
            let conn = self.connect();
            conn.execute("DELETE FROM users", ())
                .await
                .map_err(BatchError::store)
        }
    }

    // Failing batch first, then the empty and successful ones, then the clear.
    #[tokio::test(flavor = "multi_thread")]
    async fn scenarios_against_libsql() -> BatchResult<()> {
        let dir = tempfile::tempdir().expect("temp dir");
        let harness = LibsqlHarness::new(&dir).await;
        tests_common::scenario_empty_batch(&harness).await?;
        tests_common::scenario_rollback_on_failure(&harness).await?;
        tests_common::scenario_all_success(&harness).await?;
        tests_common::scenario_idempotent_clear(&harness).await?;
        Ok(())
    }
}
