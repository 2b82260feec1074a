//! A storage-less collection backend with the same operation contract as
//! `SqlCollection`, used for tests and lightweight embedding. No prior
//! analog; authored fresh, reusing `filter::eval` so both backends agree
//! on matching semantics.

use crate::config::LimitsConfig;
use crate::document::{QueryOptions, SortDirection, StoredDocument};
use crate::error::CoreResult;
use crate::filter::eval::matches;
use crate::validate::{validate_document, validate_field_name, validate_query_options};
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Clone)]
struct Row {
  data: Value,
  created_at: i64,
  updated_at: i64,
}

/// In-memory collection. Ids may be empty strings (unlike the SQL
/// backend), and every read/write deep-copies through `serde_json::Value`
/// clones so callers cannot mutate stored state through returned values.
pub struct MemoryCollection {
  rows: Mutex<HashMap<String, Row>>,
  clock: Mutex<i64>,
  limits: LimitsConfig,
}

impl Default for MemoryCollection {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryCollection {
  pub fn new() -> Self {
    Self::with_limits(LimitsConfig::default())
  }

  pub fn with_limits(limits: LimitsConfig) -> Self {
    Self {
      rows: Mutex::new(HashMap::new()),
      clock: Mutex::new(0),
      limits,
    }
  }

  fn tick(&self) -> i64 {
    let mut clock = self.clock.lock();
    *clock += 1;
    *clock
  }

  pub fn get(&self, id: &str) -> Option<StoredDocument> {
    self.rows.lock().get(id).map(|row| StoredDocument {
      id: id.to_string(),
      data: row.data.clone(),
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }

  pub fn get_many(&self, ids: &[String]) -> Vec<Option<StoredDocument>> {
    ids.iter().map(|id| self.get(id)).collect()
  }

  pub fn has(&self, id: &str) -> bool {
    self.rows.lock().contains_key(id)
  }

  pub fn put(&self, id: &str, doc: Value) -> CoreResult<StoredDocument> {
    validate_document(&doc)?;
    let now = self.tick();
    let mut rows = self.rows.lock();
    let created_at = rows.get(id).map(|r| r.created_at).unwrap_or(now);
    let row = Row {
      data: doc.clone(),
      created_at,
      updated_at: now,
    };
    rows.insert(id.to_string(), row);
    Ok(StoredDocument {
      id: id.to_string(),
      data: doc,
      created_at,
      updated_at: now,
    })
  }

  pub fn put_many(&self, items: Vec<(String, Value)>) -> CoreResult<usize> {
    for (_, doc) in &items {
      validate_document(doc)?;
    }
    let count = items.len();
    for (id, doc) in items {
      self.put(&id, doc)?;
    }
    Ok(count)
  }

  pub fn delete(&self, id: &str) -> bool {
    self.rows.lock().remove(id).is_some()
  }

  pub fn delete_many(&self, ids: &[String]) -> usize {
    let mut rows = self.rows.lock();
    ids.iter().filter(|id| rows.remove(id.as_str()).is_some()).count()
  }

  pub fn clear(&self) -> usize {
    let mut rows = self.rows.lock();
    let n = rows.len();
    rows.clear();
    n
  }

  pub fn count(&self, filter: Option<&Value>) -> CoreResult<usize> {
    let rows = self.rows.lock();
    let mut n = 0;
    for row in rows.values() {
      if match filter {
        Some(f) => matches(f, &row.data, &self.limits)?,
        None => true,
      } {
        n += 1;
      }
    }
    Ok(n)
  }

  pub fn has_any(&self, filter: Option<&Value>) -> CoreResult<bool> {
    Ok(self.count(filter)? > 0)
  }

  pub fn list(&self, options: &QueryOptions) -> CoreResult<Vec<StoredDocument>> {
    self.find(None, options)
  }

  pub fn find(
    &self,
    filter: Option<&Value>,
    options: &QueryOptions,
  ) -> CoreResult<Vec<StoredDocument>> {
    validate_query_options(options.limit, options.offset, &self.limits)?;
    if let Some(sort) = &options.sort {
      validate_field_name(&sort.field)?;
    }
    let rows = self.rows.lock();
    let mut matched: Vec<StoredDocument> = Vec::new();
    for (id, row) in rows.iter() {
      let is_match = match filter {
        Some(f) => matches(f, &row.data, &self.limits)?,
        None => true,
      };
      if is_match {
        matched.push(StoredDocument {
          id: id.clone(),
          data: row.data.clone(),
          created_at: row.created_at,
          updated_at: row.updated_at,
        });
      }
    }
    drop(rows);

    match &options.sort {
      Some(sort) => {
        let field = sort.field.clone();
        let desc = sort.direction == SortDirection::Desc;
        matched.sort_by(|a, b| compare_by_path(a, b, &field, desc));
      }
      None => matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
    }

    let offset = options.offset.unwrap_or(0);
    let matched = if offset > 0 {
      matched.into_iter().skip(offset).collect()
    } else {
      matched
    };
    let matched = match options.limit {
      Some(limit) => matched.into_iter().take(limit).collect(),
      None => matched,
    };
    Ok(matched)
  }

  pub fn query(&self, filter: &Value, options: &QueryOptions) -> CoreResult<Vec<StoredDocument>> {
    self.find(Some(filter), options)
  }

  pub fn keys(&self) -> Vec<String> {
    let mut ids: Vec<String> = self.rows.lock().keys().cloned().collect();
    ids.sort();
    ids
  }
}

fn resolve_sort_value<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
  let mut current = doc;
  for segment in field.split('.') {
    current = current.as_object()?.get(segment)?;
  }
  Some(current)
}

/// Undefined/null fields always sort last, regardless of `desc` — only
/// the ordering between two present values is reversed for descending
/// sorts, matching the compiler's `ORDER BY` semantics.
fn compare_by_path(a: &StoredDocument, b: &StoredDocument, field: &str, desc: bool) -> Ordering {
  let av = resolve_sort_value(&a.data, field);
  let bv = resolve_sort_value(&b.data, field);
  match (av, bv) {
    (None, None) => Ordering::Equal,
    (None, Some(_)) => Ordering::Greater,
    (Some(_), None) => Ordering::Less,
    (Some(x), Some(y)) => {
      let ordering = compare_values(x, y);
      if desc {
        ordering.reverse()
      } else {
        ordering
      }
    }
  }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
  match (a, b) {
    (Value::Null, Value::Null) => Ordering::Equal,
    (Value::Null, _) => Ordering::Greater,
    (_, Value::Null) => Ordering::Less,
    (Value::Number(x), Value::Number(y)) => x
      .as_f64()
      .unwrap_or(0.0)
      .partial_cmp(&y.as_f64().unwrap_or(0.0))
      .unwrap_or(Ordering::Equal),
    (Value::String(x), Value::String(y)) => x.cmp(y),
    (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
    _ => Ordering::Equal,
  }
}
