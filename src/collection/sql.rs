//! The SQL-backed collection engine: validates inputs, compiles filters,
//! and issues parameterized SQL against a `SqliteStorage` shard.
//!
//! Grounded on `db::sqlite::SqliteBackend`'s CRUD/list methods, generalized
//! from UUID ids and RFC3339 timestamps to arbitrary string ids and
//! millisecond integer timestamps, and from a single global `documents`
//! table to the `_collections` table keyed by `(collection, id)`.

use crate::config::LimitsConfig;
use crate::document::{QueryOptions, SortDirection, StoredDocument};
use crate::error::{CoreError, CoreResult};
use crate::filter::{compile, Param};
use crate::validate::{validate_document, validate_document_id, validate_field_name, validate_query_options};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use std::sync::Arc;

use super::SqliteStorage;

fn now_ms() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

fn params_to_sql(params: Vec<Param>) -> Vec<SqlValue> {
  params
    .into_iter()
    .map(|p| match p {
      Param::Null => SqlValue::Null,
      Param::Bool(b) => SqlValue::Integer(if b { 1 } else { 0 }),
      Param::Int(i) => SqlValue::Integer(i),
      Param::Float(f) => SqlValue::Real(f),
      Param::Text(s) => SqlValue::Text(s),
    })
    .collect()
}

fn row_to_doc(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredDocument> {
  let id: String = row.get("id")?;
  let data_text: String = row.get("data")?;
  let created_at: i64 = row.get("created_at")?;
  let updated_at: i64 = row.get("updated_at")?;
  let data: Value = serde_json::from_str(&data_text).unwrap_or(Value::Null);
  Ok(StoredDocument {
    id,
    data,
    created_at,
    updated_at,
  })
}

/// One named collection bound to one storage shard.
pub struct SqlCollection {
  storage: Arc<SqliteStorage>,
  collection: String,
  limits: LimitsConfig,
}

impl SqlCollection {
  pub async fn new(storage: Arc<SqliteStorage>, collection: impl Into<String>) -> CoreResult<Self> {
    Self::with_limits(storage, collection, LimitsConfig::default()).await
  }

  pub async fn with_limits(
    storage: Arc<SqliteStorage>,
    collection: impl Into<String>,
    limits: LimitsConfig,
  ) -> CoreResult<Self> {
    storage.ensure_schema().await?;
    Ok(Self {
      storage,
      collection: collection.into(),
      limits,
    })
  }

  pub fn name(&self) -> &str {
    &self.collection
  }

  pub async fn get(&self, id: &str) -> CoreResult<Option<StoredDocument>> {
    validate_document_id(id)?;
    let collection = self.collection.clone();
    let id = id.to_string();
    let doc = self
      .storage
      .conn()
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, data, created_at, updated_at FROM _collections WHERE collection = ?1 AND id = ?2",
        )?;
        let mut rows = stmt.query(rusqlite::params![collection, id])?;
        if let Some(row) = rows.next()? {
          Ok(Some(row_to_doc(row)?))
        } else {
          Ok(None)
        }
      })
      .await?;
    Ok(doc)
  }

  pub async fn get_many(&self, ids: &[String]) -> CoreResult<Vec<Option<StoredDocument>>> {
    for id in ids {
      validate_document_id(id)?;
    }
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let collection = self.collection.clone();
    let ids_owned = ids.to_vec();
    let rows = self
      .storage
      .conn()
      .call(move |conn| {
        let placeholders = vec!["?"; ids_owned.len()].join(", ");
        let sql = format!(
          "SELECT id, data, created_at, updated_at FROM _collections WHERE collection = ? AND id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut bind: Vec<SqlValue> = Vec::with_capacity(1 + ids_owned.len());
        bind.push(SqlValue::Text(collection));
        bind.extend(ids_owned.into_iter().map(SqlValue::Text));
        let docs = stmt
          .query_map(rusqlite::params_from_iter(bind), row_to_doc)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(docs)
      })
      .await?;
    let mut by_id: std::collections::HashMap<String, StoredDocument> =
      rows.into_iter().map(|d| (d.id.clone(), d)).collect();
    Ok(ids.iter().map(|id| by_id.remove(id)).collect())
  }

  pub async fn has(&self, id: &str) -> CoreResult<bool> {
    Ok(self.get(id).await?.is_some())
  }

  pub async fn put(&self, id: &str, doc: Value) -> CoreResult<StoredDocument> {
    validate_document_id(id)?;
    validate_document(&doc)?;
    let collection = self.collection.clone();
    let id = id.to_string();
    let data_text = serde_json::to_string(&doc).map_err(|e| CoreError::Internal(e.into()))?;
    let now = now_ms();
    self
      .storage
      .conn()
      .call(move |conn| {
        conn.execute(
          "INSERT INTO _collections (collection, id, data, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)
           ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
          rusqlite::params![collection, id, data_text, now],
        )?;
        Ok(())
      })
      .await
      .map_err(|e: tokio_rusqlite::Error| CoreError::Internal(e.into()))?;
    // ON CONFLICT DO UPDATE intentionally never touches created_at; the
    // row is re-read so the caller sees the persisted pair, not `now`
    // twice.
    self
      .get(&id)
      .await?
      .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("row vanished immediately after put")))
  }

  pub async fn put_many(&self, items: Vec<(String, Value)>) -> CoreResult<usize> {
    for (id, doc) in &items {
      validate_document_id(id)?;
      validate_document(doc)?;
    }
    let collection = self.collection.clone();
    let now = now_ms();
    let encoded = items
      .into_iter()
      .map(|(id, doc)| {
        let text = serde_json::to_string(&doc).map_err(|e| CoreError::Internal(e.into()))?;
        Ok((id, text))
      })
      .collect::<CoreResult<Vec<_>>>()?;
    let count = encoded.len();
    self
      .storage
      .conn()
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO _collections (collection, id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
          )?;
          for (id, text) in &encoded {
            stmt.execute(rusqlite::params![collection, id, text, now])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(|e: tokio_rusqlite::Error| CoreError::Internal(e.into()))?;
    Ok(count)
  }

  pub async fn delete(&self, id: &str) -> CoreResult<bool> {
    validate_document_id(id)?;
    let collection = self.collection.clone();
    let id = id.to_string();
    let affected = self
      .storage
      .conn()
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM _collections WHERE collection = ?1 AND id = ?2",
          rusqlite::params![collection, id],
        )?;
        Ok(n)
      })
      .await
      .map_err(|e: tokio_rusqlite::Error| CoreError::Internal(e.into()))?;
    Ok(affected > 0)
  }

  pub async fn delete_many(&self, ids: &[String]) -> CoreResult<usize> {
    for id in ids {
      validate_document_id(id)?;
    }
    if ids.is_empty() {
      return Ok(0);
    }
    let collection = self.collection.clone();
    let ids_owned = ids.to_vec();
    let affected = self
      .storage
      .conn()
      .call(move |conn| {
        let placeholders = vec!["?"; ids_owned.len()].join(", ");
        let sql =
          format!("DELETE FROM _collections WHERE collection = ? AND id IN ({placeholders})");
        let mut bind: Vec<SqlValue> = Vec::with_capacity(1 + ids_owned.len());
        bind.push(SqlValue::Text(collection));
        bind.extend(ids_owned.into_iter().map(SqlValue::Text));
        let n = conn.execute(&sql, rusqlite::params_from_iter(bind))?;
        Ok(n)
      })
      .await
      .map_err(|e: tokio_rusqlite::Error| CoreError::Internal(e.into()))?;
    Ok(affected)
  }

  pub async fn clear(&self) -> CoreResult<usize> {
    let collection = self.collection.clone();
    let affected = self
      .storage
      .conn()
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM _collections WHERE collection = ?1",
          rusqlite::params![collection],
        )?;
        Ok(n)
      })
      .await
      .map_err(|e: tokio_rusqlite::Error| CoreError::Internal(e.into()))?;
    Ok(affected)
  }

  /// Direct `SELECT COUNT(*)`, never `find(filter).len()` — see
  /// `DESIGN.md`'s Open Question decision.
  pub async fn count(&self, filter: Option<&Value>) -> CoreResult<usize> {
    let mut params = Vec::new();
    let predicate = match filter {
      Some(f) => compile(f, &mut params, &self.limits)?,
      None => "1=1".to_string(),
    };
    let collection = self.collection.clone();
    let sql_params = params_to_sql(params);
    let count = self
      .storage
      .conn()
      .call(move |conn| {
        let sql = format!(
          "SELECT COUNT(*) FROM _collections WHERE collection = ? AND {predicate}"
        );
        let mut bind = vec![SqlValue::Text(collection)];
        bind.extend(sql_params);
        let n: i64 = conn.query_row(&sql, rusqlite::params_from_iter(bind), |row| row.get(0))?;
        Ok(n)
      })
      .await
      .map_err(|e: tokio_rusqlite::Error| CoreError::Internal(e.into()))?;
    Ok(count as usize)
  }

  pub async fn has_any(&self, filter: Option<&Value>) -> CoreResult<bool> {
    Ok(self.count(filter).await? > 0)
  }

  pub async fn list(&self, options: &QueryOptions) -> CoreResult<Vec<StoredDocument>> {
    self.find(None, options).await
  }

  pub async fn find(
    &self,
    filter: Option<&Value>,
    options: &QueryOptions,
  ) -> CoreResult<Vec<StoredDocument>> {
    validate_query_options(options.limit, options.offset, &self.limits)?;
    let mut params = Vec::new();
    let predicate = match filter {
      Some(f) => compile(f, &mut params, &self.limits)?,
      None => "1=1".to_string(),
    };
    let order_by = match &options.sort {
      Some(sort) => {
        validate_field_name(&sort.field)?;
        let dir = match sort.direction {
          SortDirection::Asc => "ASC",
          SortDirection::Desc => "DESC",
        };
        format!("json_extract(data,'$.{}') {dir}", sort.field)
      }
      None => "updated_at DESC".to_string(),
    };
    let limit_clause = match options.limit {
      Some(limit) => format!(" LIMIT {} OFFSET {}", limit, options.offset.unwrap_or(0)),
      None => String::new(),
    };
    let collection = self.collection.clone();
    let sql_params = params_to_sql(params);
    let docs = self
      .storage
      .conn()
      .call(move |conn| {
        let sql = format!(
          "SELECT id, data, created_at, updated_at FROM _collections WHERE collection = ? AND {predicate} ORDER BY {order_by}{limit_clause}"
        );
        let mut bind = vec![SqlValue::Text(collection)];
        bind.extend(sql_params);
        let mut stmt = conn.prepare(&sql)?;
        let docs = stmt
          .query_map(rusqlite::params_from_iter(bind), row_to_doc)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(docs)
      })
      .await
      .map_err(|e: tokio_rusqlite::Error| CoreError::Internal(e.into()))?;
    Ok(docs)
  }

  pub async fn query(
    &self,
    filter: &Value,
    options: &QueryOptions,
  ) -> CoreResult<Vec<StoredDocument>> {
    self.find(Some(filter), options).await
  }

  pub async fn keys(&self) -> CoreResult<Vec<String>> {
    let collection = self.collection.clone();
    let ids = self
      .storage
      .conn()
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id FROM _collections WHERE collection = ?1 ORDER BY id ASC",
        )?;
        let ids = stmt
          .query_map(rusqlite::params![collection], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
      })
      .await
      .map_err(|e: tokio_rusqlite::Error| CoreError::Internal(e.into()))?;
    Ok(ids)
  }
}
