//! Transaction wrapper for composite, multi-step database handlers.
//!
//! Per the concurrency model's transaction requirement: database handlers
//! that perform multi-step mutations (e.g. a catch-all webhook that may
//! `CREATE TABLE` then `INSERT`) begin/commit/rollback around the whole
//! composite operation, rolling back all steps on failure.

use sqlx::{Database, Pool, Transaction};
use std::future::Future;
use std::ops::{Deref, DerefMut};

/// Trait for application states that contain a database pool.
pub trait HasPool<DB: Database> {
    fn pool(&self) -> &Pool<DB>;
}

/// A wrapper around an SQLx [`Transaction`].
///
/// Dropping a `Tx` without calling [`Tx::commit`] rolls the transaction back
/// (sqlx's own `Drop` behavior) — callers that want an explicit rollback
/// without waiting for drop can call [`Tx::rollback`].
pub struct Tx<'a, DB: Database>(pub Transaction<'a, DB>);

impl<'a, DB: Database> Deref for Tx<'a, DB> {
    type Target = Transaction<'a, DB>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a, DB: Database> DerefMut for Tx<'a, DB> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'a, DB: Database> Tx<'a, DB> {
    pub fn into_inner(self) -> Transaction<'a, DB> {
        self.0
    }

    /// Returns a mutable reference to the underlying connection, suitable
    /// for passing directly to `sqlx::query(...).execute(tx.as_mut())`.
    pub fn as_mut(&mut self) -> &mut <DB as Database>::Connection {
        &mut *self.0
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.0.commit().await
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.0.rollback().await
    }
}

/// Run `body` inside a freshly-begun transaction against `pool`, committing
/// on `Ok` and rolling back on `Err`.
///
/// Used by the route synthesizer's catch-all/dynamic handlers (§4.E) for
/// composite operations such as `CREATE TABLE IF NOT EXISTS` followed by an
/// `INSERT`, and by rule-engine actions that perform synchronous
/// multi-statement mutations.
pub async fn run_in_transaction<DB, F, Fut, T, E>(pool: &Pool<DB>, body: F) -> Result<T, E>
where
    DB: Database,
    F: FnOnce(Tx<'static, DB>) -> Fut,
    Fut: Future<Output = Result<(T, Tx<'static, DB>), E>>,
    E: From<sqlx::Error>,
{
    let tx = pool.begin().await.map_err(E::from)?;
    let (value, tx) = body(Tx(tx)).await?;
    tx.commit().await.map_err(E::from)?;
    Ok(value)
}
