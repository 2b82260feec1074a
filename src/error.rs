//! Error types returned by the core document-collection engine.

use thiserror::Error;

/// The error surface exposed by every operation in this crate.
#[derive(Debug, Error)]
pub enum CoreError {
  /// A caller-supplied argument failed validation (bad id, bad document,
  /// bad query options, bad field name, bad regex pattern, filter too deep).
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  /// The requested collection, namespace, or document does not exist.
  #[error("not found: {0}")]
  NotFound(String),

  /// Reserved for future use: a write conflicted with an existing row
  /// under a stricter-than-upsert write mode. The current write paths are
  /// upsert-only and never produce this variant.
  #[error("conflict: {0}")]
  Conflict(String),

  /// The storage engine (or another internal dependency) failed.
  #[error(transparent)]
  Internal(#[from] anyhow::Error),
}

impl CoreError {
  pub fn invalid(msg: impl Into<String>) -> Self {
    Self::InvalidArgument(msg.into())
  }

  pub fn not_found(msg: impl Into<String>) -> Self {
    Self::NotFound(msg.into())
  }
}

impl From<rusqlite::Error> for CoreError {
  fn from(e: rusqlite::Error) -> Self {
    Self::Internal(anyhow::Error::new(e))
  }
}

impl From<tokio_rusqlite::Error> for CoreError {
  fn from(e: tokio_rusqlite::Error) -> Self {
    Self::Internal(anyhow::Error::new(e))
  }
}

pub type CoreResult<T> = Result<T, CoreError>;
