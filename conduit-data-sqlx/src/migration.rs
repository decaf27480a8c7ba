//! Guidance for schema migrations.
//!
//! `conduit-data-sqlx` doesn't embed a migration runner — operators running
//! SQLx directly should use `sqlx::migrate!()` against a `migrations/`
//! directory per the [sqlx migration docs](https://docs.rs/sqlx/latest/sqlx/migrate/index.html).
//!
//! The DB facade's `create_table` operation (config-model §4.B "build from
//! database" path and the catch-all/dynamic route kind) issues
//! `CREATE TABLE IF NOT EXISTS` directly via the pool rather than through a
//! migration file, since the table shape is only known at config-load time
//! from an operator-supplied `columnDefinitions` map.
