//! Owns the single SQLite connection backing a storage shard: schema
//! bootstrap (idempotent, once per handle) and the custom `REGEXP`
//! scalar function the filter compiler depends on.
//!
//! Grounded on `db::sqlite::SqliteBackend` (`PRAGMAS`, `SCHEMA`,
//! `tokio_rusqlite::Connection` wrapping), trimmed of the CDC triggers,
//! token table, and S3/rate-limit surface that belong to the transport
//! layer, not the core.

use crate::error::{CoreError, CoreResult};
use rusqlite::functions::FunctionFlags;
use tokio::sync::OnceCell;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = -64000;
PRAGMA temp_store = MEMORY;
"#;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS _collections (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
) WITHOUT ROWID;
CREATE INDEX IF NOT EXISTS idx_collections_name ON _collections(collection);
CREATE INDEX IF NOT EXISTS idx_collections_name_updated ON _collections(collection, updated_at);

CREATE TABLE IF NOT EXISTS _do_metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

fn register_regexp(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    "REGEXP",
    2,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    move |ctx| {
      let pattern: String = ctx.get(0)?;
      let value: Option<String> = ctx.get(1)?;
      let Some(value) = value else {
        return Ok(false);
      };
      // Pattern safety is enforced by `validate::validate_regex_pattern`
      // before a `$regex` filter ever reaches this function.
      let re = regex::Regex::new(&pattern)
        .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
      Ok(re.is_match(&value))
    },
  )
}

/// One storage shard: a single SQLite file (or `:memory:` database) with
/// its schema bootstrapped at most once.
pub struct SqliteStorage {
  conn: Connection,
  schema_ready: OnceCell<()>,
}

impl SqliteStorage {
  pub async fn open(path: &str) -> CoreResult<Self> {
    let conn = Connection::open(path)
      .await
      .map_err(|e| CoreError::Internal(e.into()))?;
    conn
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        register_regexp(conn)?;
        Ok(())
      })
      .await
      .map_err(|e: tokio_rusqlite::Error| CoreError::Internal(e.into()))?;
    Ok(Self {
      conn,
      schema_ready: OnceCell::new(),
    })
  }

  pub async fn in_memory() -> CoreResult<Self> {
    Self::open(":memory:").await
  }

  pub fn conn(&self) -> &Connection {
    &self.conn
  }

  /// Bootstraps the schema. Safe to call repeatedly: the DDL itself is
  /// idempotent, but the first call is also the only one that pays for
  /// the round trip, since a handle only ever initializes once.
  pub async fn ensure_schema(&self) -> CoreResult<()> {
    self
      .schema_ready
      .get_or_try_init(|| async {
        self
          .conn
          .call(|conn| conn.execute_batch(SCHEMA).map_err(Into::into))
          .await
          .map_err(|e: tokio_rusqlite::Error| CoreError::Internal(e.into()))?;
        tracing::info!("sqlite schema initialized");
        Ok::<(), CoreError>(())
      })
      .await?;
    Ok(())
  }
}
