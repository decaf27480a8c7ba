//! # conduit-data-sqlx — SQLx backend for CONDUIT data layer
//!
//! This crate provides the [SQLx](https://github.com/launchbadge/sqlx)-specific
//! implementations for CONDUIT's data access layer. It depends on [`conduit-data`] for
//! the abstract traits and types, and adds the repository wrapper, transaction
//! utilities, and error bridging needed to talk to a real database.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqlxRepository`] | Generic repository wrapper holding an `sqlx::Pool<DB>` |
//! | [`Tx`] / [`run_in_transaction`] | Transaction wrapper for composite, multi-step mutations |
//! | [`HasPool`] | Trait for application states that contain a database pool |
//! | [`SqlxErrorExt`] | Extension trait to convert `sqlx::Error` → `DataError` (`.into_data_error()`) |
//! | [`SqlxResult<T>`] | Type alias for `Result<T, DataError>` |
//! | [`migration`] | Documentation module with guidance on using `sqlx::migrate!()` |
//!
//! # Feature flags
//!
//! Enable exactly one database driver:
//!
//! | Feature    | Driver |
//! |------------|--------|
//! | `sqlite`   | SQLite via `sqlx/sqlite` |
//! | `postgres` | PostgreSQL via `sqlx/postgres` |
//! | `mysql`    | MySQL via `sqlx/mysql` |
//!
//! # Quick start
//!
//! ```toml
//! [dependencies]
//! conduit-data-sqlx = { version = "0.1", features = ["sqlite"] }
//! ```
//!
//! ```ignore
//! use conduit_data_sqlx::{SqlxRepository, Tx, HasPool, run_in_transaction};
//! use sqlx::Sqlite;
//!
//! // Use SqlxRepository as a convenience pool wrapper
//! let repo = SqlxRepository::<UserEntity, Sqlite>::new(pool.clone());
//!
//! // Run a composite, multi-step mutation atomically
//! run_in_transaction(repo.pool(), |mut tx| async move {
//!     sqlx::query("CREATE TABLE IF NOT EXISTS widgets (id INTEGER PRIMARY KEY)")
//!         .execute(tx.as_mut())
//!         .await?;
//!     sqlx::query("INSERT INTO widgets DEFAULT VALUES")
//!         .execute(tx.as_mut())
//!         .await?;
//!     Ok(((), tx))
//! }).await?;
//! ```
//!
//! # Transaction management
//!
//! [`run_in_transaction`] begins a transaction, runs the closure, and commits
//! on success or rolls back (by dropping the transaction) on failure.
//!
//! Your application state must implement [`HasPool<DB>`] for the database type
//! you're using:
//!
//! ```ignore
//! impl HasPool<Sqlite> for MyState {
//!     fn pool(&self) -> &Pool<Sqlite> {
//!         &self.pool
//!     }
//! }
//! ```
//!
//! # Error bridging
//!
//! Due to Rust's orphan rules, `From<sqlx::Error> for DataError` can't be
//! implemented here. Use the [`SqlxErrorExt`] trait instead:
//!
//! ```ignore
//! use conduit_data_sqlx::SqlxErrorExt;
//!
//! let user = sqlx::query_as("SELECT ...")
//!     .fetch_one(&pool)
//!     .await
//!     .map_err(|e| e.into_data_error())?;
//! ```

pub mod error;
pub mod migration;
pub mod repository;
pub mod tx;

pub use error::{SqlxErrorExt, SqlxResult};
pub use repository::SqlxRepository;
pub use tx::{run_in_transaction, HasPool, Tx};

/// Re-exports of the most commonly used types from both `conduit-data` and this crate.
pub mod prelude {
    pub use crate::{run_in_transaction, HasPool, SqlxErrorExt, SqlxRepository, Tx};
    pub use conduit_data::prelude::*;
}
