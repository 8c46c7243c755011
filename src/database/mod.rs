pub mod pool;
pub mod schema;

use crate::error::Result;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell, OwnedMutexGuard};

/// Shared handle over the SQLite pool.
///
/// Writers inside this process take `write_lock` before opening their
/// transaction, so a mutating call waits behind another instead of racing it
/// for the database lock. Other processes are covered by the busy timeout.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
    schema_ready: Arc<OnceCell<schema::SchemaReport>>,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs the schema manager the first time it is called on this handle.
    pub async fn ensure_schema(&self) -> Result<&schema::SchemaReport> {
        self.schema_ready
            .get_or_try_init(|| async {
                let _guard = self.write_lock.lock().await;
                schema::ensure_schema(&self.pool).await
            })
            .await
    }

    pub async fn begin_write(&self) -> Result<WriteTx> {
        let guard = self.write_lock.clone().lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(WriteTx { _guard: guard, tx })
    }
}

/// A write transaction holding the in-process writer lock until it ends.
/// Dropping it without `commit` rolls back.
pub struct WriteTx {
    _guard: OwnedMutexGuard<()>,
    tx: Transaction<'static, Sqlite>,
}

impl WriteTx {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
