//! The collection engine: a SQL-backed implementation over a
//! `SqliteStorage` shard, a storage-less in-memory implementation with
//! identical semantics, and a manager that caches collections by name.

pub mod manager;
pub mod memory;
pub mod sql;

pub use crate::db::SqliteStorage;
pub use manager::{CollectionManager, CollectionStats};
pub use memory::MemoryCollection;
pub use sql::SqlCollection;
