//! Multi-tenant façade: maps `(user_id, namespace)` to an isolated
//! storage shard and records every namespace a user has written to in a
//! reserved `_namespaces` collection on a per-user index shard.
//!
//! No direct prior analog for the façade itself; grounded loosely on
//! the `project_id`-keyed `Document` in the alternate `crates/types`
//! layout (tenancy-as-a-field) and on the `Arc<dyn DatabaseBackend>`
//! multi-handle pattern used to swap storage engines in
//! `src/bin/sqrld.rs` — here generalized to one handle per shard
//! instead of one handle per process.

use crate::collection::{CollectionManager, SqlCollection};
use crate::config::LimitsConfig;
use crate::document::{QueryOptions, StoredDocument};
use crate::error::CoreResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_NAMESPACE: &str = "default";
const NAMESPACES_COLLECTION: &str = "_namespaces";

/// Resolves a `(user_id, namespace)` pair to a storage shard identity.
/// Implementations decide how shards are physically laid out (one file
/// per pair, one file per user, all in-memory, ...).
#[async_trait]
pub trait ShardFactory: Send + Sync {
  async fn shard_for(&self, user_id: &str, namespace: &str) -> CoreResult<Arc<crate::db::SqliteStorage>>;
}

/// One SQLite file per `(user_id, namespace)` pair under a base
/// directory.
pub struct FileShardFactory {
  base_dir: PathBuf,
}

impl FileShardFactory {
  pub fn new(base_dir: impl Into<PathBuf>) -> Self {
    Self {
      base_dir: base_dir.into(),
    }
  }

  fn path_for(&self, user_id: &str, namespace: &str) -> PathBuf {
    let safe_user = sanitize_path_segment(user_id);
    let safe_ns = sanitize_path_segment(namespace);
    self.base_dir.join(format!("{safe_user}__{safe_ns}.sqlite3"))
  }
}

fn sanitize_path_segment(s: &str) -> String {
  s.chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
    .collect()
}

#[async_trait]
impl ShardFactory for FileShardFactory {
  async fn shard_for(&self, user_id: &str, namespace: &str) -> CoreResult<Arc<crate::db::SqliteStorage>> {
    std::fs::create_dir_all(&self.base_dir).map_err(|e| crate::error::CoreError::Internal(e.into()))?;
    let path = self.path_for(user_id, namespace);
    let storage = crate::db::SqliteStorage::open(&path.to_string_lossy()).await?;
    Ok(Arc::new(storage))
  }
}

/// An in-memory shard factory: every distinct `(user_id, namespace)` pair
/// gets its own `:memory:` SQLite database, cached for the lifetime of
/// the factory. Useful for tests and embedding without a filesystem.
#[derive(Default)]
pub struct InMemoryShardFactory {
  shards: Mutex<HashMap<(String, String), Arc<crate::db::SqliteStorage>>>,
}

impl InMemoryShardFactory {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ShardFactory for InMemoryShardFactory {
  async fn shard_for(&self, user_id: &str, namespace: &str) -> CoreResult<Arc<crate::db::SqliteStorage>> {
    let key = (user_id.to_string(), namespace.to_string());
    if let Some(existing) = self.shards.lock().get(&key) {
      return Ok(existing.clone());
    }
    let storage = Arc::new(crate::db::SqliteStorage::in_memory().await?);
    self.shards.lock().entry(key).or_insert_with(|| storage.clone());
    Ok(storage)
  }
}

/// The tenant/shard façade: one `CollectionManager` per `(user_id,
/// namespace)` pair, and a dedicated index shard per user recording the
/// namespaces that user has written to.
pub struct TenantStore<F: ShardFactory> {
  factory: F,
  managers: Mutex<HashMap<(String, String), Arc<CollectionManager>>>,
  limits: LimitsConfig,
}

impl<F: ShardFactory> TenantStore<F> {
  pub fn new(factory: F) -> Self {
    Self::with_limits(factory, LimitsConfig::default())
  }

  pub fn with_limits(factory: F, limits: LimitsConfig) -> Self {
    Self {
      factory,
      managers: Mutex::new(HashMap::new()),
      limits,
    }
  }

  async fn manager_for(&self, user_id: &str, namespace: &str) -> CoreResult<Arc<CollectionManager>> {
    let key = (user_id.to_string(), namespace.to_string());
    if let Some(existing) = self.managers.lock().get(&key) {
      return Ok(existing.clone());
    }
    let storage = self.factory.shard_for(user_id, namespace).await?;
    let created = Arc::new(CollectionManager::with_limits(storage, self.limits.clone()));
    let mut managers = self.managers.lock();
    let entry = managers.entry(key).or_insert_with(|| created.clone());
    Ok(entry.clone())
  }

  fn index_namespace(user_id: &str) -> String {
    format!("index:{user_id}")
  }

  async fn record_namespace(&self, user_id: &str, namespace: &str) -> CoreResult<()> {
    let index_ns = Self::index_namespace(user_id);
    let manager = self.manager_for(user_id, &index_ns).await?;
    let index: Arc<SqlCollection> = manager.collection(NAMESPACES_COLLECTION).await?;
    if !index.has(namespace).await? {
      index.put(namespace, json!({"namespace": namespace})).await?;
      tracing::debug!(user_id, namespace, "recorded new namespace");
    }
    Ok(())
  }

  pub async fn list_namespaces(&self, user_id: &str) -> CoreResult<Vec<String>> {
    let index_ns = Self::index_namespace(user_id);
    let manager = self.manager_for(user_id, &index_ns).await?;
    let index = manager.collection(NAMESPACES_COLLECTION).await?;
    index.keys().await
  }

  pub async fn get(
    &self,
    user_id: &str,
    collection: &str,
    id: &str,
    namespace: Option<&str>,
  ) -> CoreResult<Option<StoredDocument>> {
    let manager = self
      .manager_for(user_id, namespace.unwrap_or(DEFAULT_NAMESPACE))
      .await?;
    manager.collection(collection).await?.get(id).await
  }

  pub async fn put(
    &self,
    user_id: &str,
    collection: &str,
    id: &str,
    doc: Value,
    namespace: Option<&str>,
  ) -> CoreResult<StoredDocument> {
    let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
    let manager = self.manager_for(user_id, namespace).await?;
    let result = manager.collection(collection).await?.put(id, doc).await?;
    self.record_namespace(user_id, namespace).await?;
    Ok(result)
  }

  pub async fn delete(
    &self,
    user_id: &str,
    collection: &str,
    id: &str,
    namespace: Option<&str>,
  ) -> CoreResult<bool> {
    let manager = self
      .manager_for(user_id, namespace.unwrap_or(DEFAULT_NAMESPACE))
      .await?;
    manager.collection(collection).await?.delete(id).await
  }

  pub async fn list(
    &self,
    user_id: &str,
    collection: &str,
    options: &QueryOptions,
    namespace: Option<&str>,
  ) -> CoreResult<Vec<StoredDocument>> {
    let manager = self
      .manager_for(user_id, namespace.unwrap_or(DEFAULT_NAMESPACE))
      .await?;
    manager.collection(collection).await?.list(options).await
  }

  pub async fn find(
    &self,
    user_id: &str,
    collection: &str,
    filter: Option<&Value>,
    options: &QueryOptions,
    namespace: Option<&str>,
  ) -> CoreResult<Vec<StoredDocument>> {
    let manager = self
      .manager_for(user_id, namespace.unwrap_or(DEFAULT_NAMESPACE))
      .await?;
    manager.collection(collection).await?.find(filter, options).await
  }

  pub async fn count(
    &self,
    user_id: &str,
    collection: &str,
    filter: Option<&Value>,
    namespace: Option<&str>,
  ) -> CoreResult<usize> {
    let manager = self
      .manager_for(user_id, namespace.unwrap_or(DEFAULT_NAMESPACE))
      .await?;
    manager.collection(collection).await?.count(filter).await
  }
}
