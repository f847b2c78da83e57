//! Persistence layer: PostgreSQL project records, snapshot slots, users,
//! and refresh tokens.
//!
//! Provides [`postgres::PostgresStore`], the concrete implementation of the
//! scheduler's catalog/store interfaces and the auth user store, backed by
//! `sqlx::PgPool`.

pub mod models;
pub mod postgres;

pub use postgres::PostgresStore;
