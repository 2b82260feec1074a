//! Runtime configuration for the collection engine.
//!
//! Mirrors the section-struct, `#[serde(default)]`, env-override shape of
//! the server's own config loading, scaled down to what the core needs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn expand_env_vars(input: &str) -> String {
  let mut out = String::with_capacity(input.len());
  let mut chars = input.chars().peekable();
  while let Some(c) = chars.next() {
    if c != '$' {
      out.push(c);
      continue;
    }
    match chars.peek() {
      Some('{') => {
        chars.next();
        let name: String = chars.by_ref().take_while(|&c| c != '}').collect();
        out.push_str(&std::env::var(&name).unwrap_or_default());
      }
      Some(c2) if c2.is_ascii_alphabetic() || *c2 == '_' => {
        let mut name = String::new();
        while let Some(&c2) = chars.peek() {
          if c2.is_ascii_alphanumeric() || c2 == '_' {
            name.push(c2);
            chars.next();
          } else {
            break;
          }
        }
        out.push_str(&std::env::var(&name).unwrap_or_default());
      }
      _ => out.push('$'),
    }
  }
  out
}

/// Limits enforced by shared validation (`crate::validate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
  pub max_limit: usize,
  pub max_regex_pattern_length: usize,
  pub max_filter_depth: usize,
  pub max_body_size: usize,
}

impl Default for LimitsConfig {
  fn default() -> Self {
    Self {
      max_limit: crate::validate::MAX_LIMIT,
      max_regex_pattern_length: crate::validate::MAX_REGEX_PATTERN_LENGTH,
      max_filter_depth: crate::validate::MAX_FILTER_DEPTH,
      max_body_size: 1_048_576,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteSectionConfig {
  pub path: String,
}

impl Default for SqliteSectionConfig {
  fn default() -> Self {
    Self {
      path: "docstore.sqlite3".to_string(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  pub level: String,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
  pub sqlite: SqliteSectionConfig,
  pub limits: LimitsConfig,
  pub logging: LoggingConfig,
}

impl CoreConfig {
  pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let expanded = expand_env_vars(&raw);
    let config: Self = serde_yaml::from_str(&expanded)?;
    Ok(config)
  }

  /// Searches the current directory for `docstore.yaml` / `docstore.yml`,
  /// following the "explicit path > auto-detect > defaults" precedence
  /// used by the server's own config loader.
  pub fn find_and_load() -> anyhow::Result<Option<Self>> {
    for name in ["docstore.yaml", "docstore.yml"] {
      let candidate = PathBuf::from(name);
      if candidate.exists() {
        return Ok(Some(Self::from_file(candidate)?));
      }
    }
    Ok(None)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn expand_env_vars_braced_and_bare() {
    std::env::set_var("CRATES_TEST_VAR", "value");
    assert_eq!(expand_env_vars("${CRATES_TEST_VAR}/db"), "value/db");
    assert_eq!(expand_env_vars("$CRATES_TEST_VAR/db"), "value/db");
    std::env::remove_var("CRATES_TEST_VAR");
  }

  #[test]
  fn default_limits_match_reserved_constants() {
    let limits = LimitsConfig::default();
    assert_eq!(limits.max_limit, 10_000);
    assert_eq!(limits.max_regex_pattern_length, 1000);
    assert_eq!(limits.max_filter_depth, 10);
  }
}
