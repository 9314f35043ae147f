// Run with:
//   cargo run -p txbatch --features libsql-backend --example libsql_batch
// Demonstrates concurrent writes sharing one transaction: a failing batch that
// rolls back, an empty batch, a successful batch, then a query and a clear.

use std::sync::Arc;
use txbatch::{write_op, BatchError, BatchRunner, LibsqlBatchRunner, TxHandle, WriteOperation};

fn insert_user_op(name: String) -> Arc<dyn WriteOperation<TxHandle>> {
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("blog.db");
    #[allow(deprecated)]
    let db = Arc::new(libsql::Database::open(format!(
        "file:{}?mode=rwc",
        path.display()
    ))?);

    // Schema lifecycle: ensure-created, once, before any batch runs.
    let conn = db.connect()?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (\n  user_id INTEGER PRIMARY KEY AUTOINCREMENT,\n  user_name TEXT NOT NULL\n);",
        (),
    )
    .await?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS posts (\n  post_id INTEGER PRIMARY KEY AUTOINCREMENT,\n  title TEXT NOT NULL,\n  content TEXT NOT NULL,\n  user_id INTEGER NOT NULL REFERENCES users(user_id)\n);",
        (),
    )
    .await?;

    let runner = LibsqlBatchRunner::new(db.clone());

    // 1) A batch with a failing member rolls everything back.
    let mut ops: Vec<_> = (0..5)
        .map(|i| insert_user_op(format!("User {}", i)))
        .collect();
    ops.push(Arc::new(write_op(|_tx: TxHandle| async {
        Err::<u64, _>(BatchError::store(std::io::Error::new(
            std::io::ErrorKind::Other,
            "task failed",
        )))
    })));
    match runner.run(ops).await {
        Err(BatchError::Operations(failures)) => {
            println!("Transaction failed, rolled back:");
            for f in &failures {
                println!("  operation {}: {}", f.index, f.source);
            }
        }
        other => return Err(format!("expected the batch to roll back, got {:?}", other).into()),
    }

    // 2) An empty batch commits trivially.
    let outcome = runner.run(Vec::new()).await?;
    println!("empty batch committed, rows affected: {}", outcome.rows_affected);

    // 3) Five concurrent inserts commit together.
    let ops: Vec<_> = (0..5)
        .map(|i| insert_user_op(format!("User {}", i)))
        .collect();
    let outcome = runner.run(ops).await?;
    println!("batch committed, rows affected: {}", outcome.rows_affected);

    // Query and print all users, then clear the table.
    let conn = db.connect()?;
    let mut rows = conn.query("SELECT user_id, user_name FROM users", ()).await?;
    let mut total = 0;
    while let Some(row) = rows.next().await? {
        let id: i64 = row.get(0)?;
        let name: String = row.get(1)?;
        println!("User ID: {}, User Name: {}", id, name);
        total += 1;
    }
    println!("Users: {}", total);

    let removed = conn.execute("DELETE FROM users", ()).await?;
    println!("cleared {} users", removed);

    Ok(())
}
