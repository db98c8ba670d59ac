use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use log::{debug, error, trace};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rocket::{
    request::{self, FromRequest, Request},
    tokio::task,
    State,
};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::{Error, Result};

use super::schema::ensure_schema_exists;

/// A handle on the relational store: a bounded pool of SQLite connections.
///
/// All access goes through [`Store::read`] or [`Store::write`], which run the
/// given closure inside a transaction on the blocking thread pool. The
/// transaction never outlives the closure: it is committed when the closure
/// succeeds and rolled back in every other case, including a panic.
#[derive(Clone)]
pub struct Store {
    pool: Pool<SqliteConnectionManager>,
    #[cfg(test)]
    path: PathBuf,
}

impl Store {
    /// Open (creating if necessary) the database at `path`, then make sure
    /// the schema exists.
    ///
    /// Every pooled connection enforces foreign keys and waits up to
    /// `busy_timeout` for the write lock. The database runs in WAL mode so
    /// readers see a consistent snapshot without blocking the writer.
    pub fn open(path: impl AsRef<Path>, pool_size: u32, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let manager = SqliteConnectionManager::file(&path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update(None, "foreign_keys", true)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            Ok(())
        });
        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        ensure_schema_exists(&*pool.get()?)?;
        debug!("Opened store at {}", path.display());

        Ok(Self {
            pool,
            #[cfg(test)]
            path,
        })
    }

    /// Run `f` on a pooled connection, off the async workers.
    async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }

    /// Run `f` in a read-only transaction. Every query inside sees the same
    /// committed snapshot.
    pub async fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_connection(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
            let out = f(&tx)?;
            tx.finish()?;
            Ok(out)
        })
        .await
    }

    /// Run `f` in a write transaction.
    ///
    /// The transaction begins `IMMEDIATE`: it takes the database write lock
    /// before `f` reads anything, so rows read by `f` cannot change under it
    /// and concurrent writers queue for up to the busy timeout. If `f` fails
    /// the transaction is rolled back before the error is returned.
    ///
    /// If the returned future is dropped before it completes (the request
    /// was cancelled or timed out), the transaction is rolled back instead of
    /// committed, even though the blocking task runs on to completion.
    pub async fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let guard = AbandonOnDrop::default();
        let flag = guard.flag();
        self.with_connection(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let abandoned = || flag.load(Ordering::SeqCst);
            let outcome = if abandoned() {
                Err(Error::Abandoned)
            } else {
                f(&tx).and_then(|out| if abandoned() { Err(Error::Abandoned) } else { Ok(out) })
            };
            match outcome {
                Ok(out) => {
                    tx.commit()?;
                    Ok(out)
                }
                Err(e) => {
                    trace!("Rolling back write transaction: {e}");
                    if let Err(rollback_err) = tx.rollback() {
                        // SQLite rolls back by itself when the connection is reused or closed.
                        error!("Explicit rollback failed: {rollback_err}");
                    }
                    Err(e)
                }
            }
        })
        .await
    }

    /// Delete the database files. Only used to clean up after tests.
    #[cfg(test)]
    pub fn destroy(self) {
        let Self { pool, path } = self;
        drop(pool);
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// Raises a shared flag when dropped.
///
/// Held by the async side of [`Store::write`] across the await. Once the write
/// has completed, raising the flag has no effect.
#[derive(Default)]
struct AbandonOnDrop(Arc<AtomicBool>);

impl AbandonOnDrop {
    fn flag(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }
}

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Store {
    type Error = ();

    /// Hand out a clone of the managed store.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        req.guard::<&State<Store>>()
            .await
            .map(|store| store.inner().clone())
    }
}
