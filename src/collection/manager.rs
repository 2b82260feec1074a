//! Caches `SqlCollection` instances by name over one storage shard, and
//! answers cross-collection questions (`names`, `drop`, `stats`).
//!
//! Grounded on `query::engine::QueryEnginePool`'s cache-by-key pattern
//! guarded by `parking_lot::Mutex`.

use crate::config::LimitsConfig;
use crate::db::SqliteStorage;
use crate::error::CoreResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::sql::SqlCollection;

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionStats {
  pub name: String,
  pub count: usize,
  pub size: usize,
}

pub struct CollectionManager {
  storage: Arc<SqliteStorage>,
  collections: Mutex<HashMap<String, Arc<SqlCollection>>>,
  limits: LimitsConfig,
}

impl CollectionManager {
  pub fn new(storage: Arc<SqliteStorage>) -> Self {
    Self::with_limits(storage, LimitsConfig::default())
  }

  pub fn with_limits(storage: Arc<SqliteStorage>, limits: LimitsConfig) -> Self {
    Self {
      storage,
      collections: Mutex::new(HashMap::new()),
      limits,
    }
  }

  /// Returns the cached collection instance for `name`, constructing it
  /// on first request. The same name always yields the same instance.
  pub async fn collection(&self, name: &str) -> CoreResult<Arc<SqlCollection>> {
    if let Some(existing) = self.collections.lock().get(name) {
      return Ok(existing.clone());
    }
    let created = Arc::new(
      SqlCollection::with_limits(self.storage.clone(), name, self.limits.clone()).await?,
    );
    let mut collections = self.collections.lock();
    let entry = collections
      .entry(name.to_string())
      .or_insert_with(|| created.clone());
    Ok(entry.clone())
  }

  /// Distinct collection names currently holding at least one row.
  pub async fn names(&self) -> CoreResult<Vec<String>> {
    self.storage.ensure_schema().await?;
    let names = self
      .storage
      .conn()
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT DISTINCT collection FROM _collections ORDER BY collection ASC")?;
        let names = stmt
          .query_map([], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
      })
      .await
      .map_err(|e: tokio_rusqlite::Error| crate::error::CoreError::Internal(e.into()))?;
    Ok(names)
  }

  pub async fn drop(&self, name: &str) -> CoreResult<usize> {
    self.storage.ensure_schema().await?;
    let name_owned = name.to_string();
    let affected = self
      .storage
      .conn()
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM _collections WHERE collection = ?1",
          rusqlite::params![name_owned],
        )?;
        Ok(n)
      })
      .await
      .map_err(|e: tokio_rusqlite::Error| crate::error::CoreError::Internal(e.into()))?;
    self.collections.lock().remove(name);
    Ok(affected)
  }

  pub async fn stats(&self) -> CoreResult<Vec<CollectionStats>> {
    self.storage.ensure_schema().await?;
    let rows = self
      .storage
      .conn()
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT collection, COUNT(*), COALESCE(SUM(LENGTH(data)), 0)
           FROM _collections GROUP BY collection ORDER BY collection ASC",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(CollectionStats {
              name: row.get(0)?,
              count: row.get::<_, i64>(1)? as usize,
              size: row.get::<_, i64>(2)? as usize,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(|e: tokio_rusqlite::Error| crate::error::CoreError::Internal(e.into()))?;
    Ok(rows)
  }
}
