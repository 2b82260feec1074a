//! Storage backend. The core targets a single concrete engine, SQLite via
//! `rusqlite`/`tokio_rusqlite`; see `DESIGN.md` for why the original
//! `SqlDialect::Postgres` backend was dropped rather than kept.

pub mod sqlite;

pub use sqlite::SqliteStorage;
