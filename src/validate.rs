//! Shared validation predicates used by the collection engine, the filter
//! compiler, and the in-memory evaluator.
//!
//! Collection names are deliberately NOT validated here: they are always
//! bound as SQL parameters, never interpolated, so restricting their
//! charset would add no safety and would only reject legitimate names.
//!
//! The numeric bounds below are the *defaults* for `config::LimitsConfig`,
//! not hardcoded ceilings: every function that enforces one of them takes
//! a `&LimitsConfig` and checks its field, so a loaded config genuinely
//! overrides the reserved constants instead of merely documenting them.

use crate::config::LimitsConfig;
use crate::error::{CoreError, CoreResult};
use serde_json::Value;

pub const MAX_LIMIT: usize = 10_000;
pub const MAX_REGEX_PATTERN_LENGTH: usize = 1000;
pub const MAX_FILTER_DEPTH: usize = 10;

pub fn validate_document_id(id: &str) -> CoreResult<()> {
  if id.is_empty() {
    return Err(CoreError::invalid("document id must not be empty"));
  }
  Ok(())
}

pub fn validate_document(doc: &Value) -> CoreResult<()> {
  match doc {
    Value::Object(_) => Ok(()),
    _ => Err(CoreError::invalid("document must be a JSON object")),
  }
}

/// Field names may contain letters, digits, underscores, and dots (for
/// nested access). Keywords are not rejected: unlike a bare identifier,
/// a field name is only ever interpolated inside a `json_extract(...,
/// '$.path')` string literal, never as a bare SQL token.
pub fn validate_field_name(field: &str) -> CoreResult<()> {
  if field.is_empty() {
    return Err(CoreError::invalid("field name must not be empty"));
  }
  let valid = field
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
  if !valid {
    return Err(CoreError::invalid(format!(
      "invalid field name: {field:?}"
    )));
  }
  if field.starts_with('.') || field.ends_with('.') || field.contains("..") {
    return Err(CoreError::invalid(format!(
      "invalid field path: {field:?}"
    )));
  }
  Ok(())
}

/// Coarse, deliberately over-approximating rejection of regex shapes that
/// are prone to catastrophic backtracking: a quantified group immediately
/// followed by another quantifier (`(a+)+`, `(a*)+`, `(a+)*`), or a group
/// nesting another quantified group (`((a+)b)+`).
fn has_nested_quantifier(pattern: &str) -> bool {
  static OUTER_QUANTIFIED: &str = r"(\([^)]*[+*][^)]*\))[+*]";
  static NESTED_GROUP: &str = r"\([^)]*\([^)]*[+*]";
  let outer = regex::Regex::new(OUTER_QUANTIFIED).expect("valid static pattern");
  let nested = regex::Regex::new(NESTED_GROUP).expect("valid static pattern");
  outer.is_match(pattern) || nested.is_match(pattern)
}

pub fn validate_regex_pattern(pattern: &str, limits: &LimitsConfig) -> CoreResult<()> {
  if pattern.len() > limits.max_regex_pattern_length {
    return Err(CoreError::invalid(format!(
      "regex pattern exceeds maximum length of {}",
      limits.max_regex_pattern_length
    )));
  }
  if has_nested_quantifier(pattern) {
    return Err(CoreError::invalid(
      "regex pattern rejected: nested quantifiers can cause catastrophic backtracking",
    ));
  }
  Ok(())
}

pub fn validate_query_options(
  limit: Option<usize>,
  offset: Option<usize>,
  limits: &LimitsConfig,
) -> CoreResult<()> {
  if let Some(limit) = limit {
    if limit == 0 || limit > limits.max_limit {
      return Err(CoreError::invalid(format!(
        "limit must be between 1 and {}, got {limit}",
        limits.max_limit
      )));
    }
  }
  if offset.is_some() && limit.is_none() {
    return Err(CoreError::invalid("offset requires limit to be set"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn field_name_accepts_paths() {
    assert!(validate_field_name("name").is_ok());
    assert!(validate_field_name("user_id").is_ok());
    assert!(validate_field_name("a.b.c").is_ok());
    assert!(validate_field_name("a123").is_ok());
  }

  #[test]
  fn field_name_rejects_unsafe_chars() {
    assert!(validate_field_name("").is_err());
    assert!(validate_field_name("field-with-dash").is_err());
    assert!(validate_field_name("field with space").is_err());
    assert!(validate_field_name("a';drop").is_err());
    assert!(validate_field_name(".leading").is_err());
    assert!(validate_field_name("trailing.").is_err());
    assert!(validate_field_name("a..b").is_err());
  }

  #[test]
  fn regex_length_limit() {
    let limits = LimitsConfig::default();
    let long = "a".repeat(MAX_REGEX_PATTERN_LENGTH + 1);
    assert!(validate_regex_pattern(&long, &limits).is_err());
    let ok = "a".repeat(MAX_REGEX_PATTERN_LENGTH);
    assert!(validate_regex_pattern(&ok, &limits).is_ok());
  }

  #[test]
  fn regex_length_limit_follows_config_override() {
    let mut limits = LimitsConfig::default();
    limits.max_regex_pattern_length = 4;
    assert!(validate_regex_pattern("abcd", &limits).is_ok());
    assert!(validate_regex_pattern("abcde", &limits).is_err());
  }

  #[test]
  fn regex_rejects_nested_quantifiers() {
    let limits = LimitsConfig::default();
    assert!(validate_regex_pattern("(a+)+$", &limits).is_err());
    assert!(validate_regex_pattern("(a*)+", &limits).is_err());
    assert!(validate_regex_pattern("(a+)*", &limits).is_err());
    assert!(validate_regex_pattern("((a+)b)+", &limits).is_err());
  }

  #[test]
  fn regex_accepts_ordinary_patterns() {
    let limits = LimitsConfig::default();
    assert!(validate_regex_pattern("^[a-z]+$", &limits).is_ok());
    assert!(validate_regex_pattern("\\d{3}-\\d{4}", &limits).is_ok());
    assert!(validate_regex_pattern("foo|bar", &limits).is_ok());
  }

  #[test]
  fn query_options_limit_bounds() {
    let limits = LimitsConfig::default();
    assert!(validate_query_options(Some(0), None, &limits).is_err());
    assert!(validate_query_options(Some(MAX_LIMIT + 1), None, &limits).is_err());
    assert!(validate_query_options(Some(MAX_LIMIT), None, &limits).is_ok());
    assert!(validate_query_options(None, Some(5), &limits).is_err());
    assert!(validate_query_options(Some(5), Some(5), &limits).is_ok());
  }

  #[test]
  fn query_options_limit_follows_config_override() {
    let mut limits = LimitsConfig::default();
    limits.max_limit = 2;
    assert!(validate_query_options(Some(2), None, &limits).is_ok());
    assert!(validate_query_options(Some(3), None, &limits).is_err());
  }
}
