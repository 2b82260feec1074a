//! The document type returned by collection reads.

use serde::{Deserialize, Serialize};

/// A single stored document: the caller-supplied JSON object plus the
/// bookkeeping timestamps the engine maintains. `created_at` is fixed at
/// first `put`; `updated_at` advances on every `put`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
  pub id: String,
  pub data: serde_json::Value,
  pub created_at: i64,
  pub updated_at: i64,
}

/// Options shared by `list`/`find`/`query`.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
  pub limit: Option<usize>,
  pub offset: Option<usize>,
  pub sort: Option<SortSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
  Asc,
  Desc,
}

#[derive(Debug, Clone)]
pub struct SortSpec {
  pub field: String,
  pub direction: SortDirection,
}

impl SortSpec {
  /// Parses the wire form `"field"` (ascending) or `"-field"` (descending).
  pub fn parse(raw: &str) -> Self {
    if let Some(field) = raw.strip_prefix('-') {
      Self {
        field: field.to_string(),
        direction: SortDirection::Desc,
      }
    } else {
      Self {
        field: raw.to_string(),
        direction: SortDirection::Asc,
      }
    }
  }
}
