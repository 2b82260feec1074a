//! Evaluates the same filter tree directly against an in-memory JSON
//! document, for the in-memory collection backend. No prior analog;
//! authored fresh against `filter::compiler`'s dispatch order so both
//! backends agree on every documented edge case.

use crate::config::LimitsConfig;
use crate::error::{CoreError, CoreResult};
use crate::filter::compiler::OPERATOR_DISPATCH_ORDER;
use crate::validate::{validate_field_name, validate_regex_pattern};
use serde_json::{Map, Value};

/// Resolves a dot-path against a document. Returns `None` ("undefined")
/// when any segment is missing or traverses into a non-object.
fn resolve_path<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
  let mut current = doc;
  for segment in field.split('.') {
    match current {
      Value::Object(map) => current = map.get(segment)?,
      _ => return None,
    }
  }
  Some(current)
}

pub fn matches(filter: &Value, doc: &Value, limits: &LimitsConfig) -> CoreResult<bool> {
  matches_node(filter, doc, 0, limits)
}

fn matches_node(node: &Value, doc: &Value, depth: usize, limits: &LimitsConfig) -> CoreResult<bool> {
  if depth > limits.max_filter_depth {
    return Err(CoreError::invalid(format!(
      "filter nesting exceeds maximum depth of {}",
      limits.max_filter_depth
    )));
  }
  let obj = match node {
    Value::Object(map) => map,
    _ => return Err(CoreError::invalid("filter node must be a JSON object")),
  };
  if obj.is_empty() {
    return Ok(true);
  }
  if let Some(children) = obj.get("$and") {
    let items = children
      .as_array()
      .ok_or_else(|| CoreError::invalid("$and must be an array of filters"))?;
    for item in items {
      if !matches_node(item, doc, depth + 1, limits)? {
        return Ok(false);
      }
    }
    return Ok(true);
  }
  if let Some(children) = obj.get("$or") {
    let items = children
      .as_array()
      .ok_or_else(|| CoreError::invalid("$or must be an array of filters"))?;
    if items.is_empty() {
      return Ok(true);
    }
    for item in items {
      if matches_node(item, doc, depth + 1, limits)? {
        return Ok(true);
      }
    }
    return Ok(false);
  }
  if let Some(child) = obj.get("$not") {
    return Ok(!matches_node(child, doc, depth + 1, limits)?);
  }
  for (field, condition) in obj {
    validate_field_name(field)?;
    let resolved = resolve_path(doc, field);
    if !matches_field(resolved, condition, depth + 1, limits)? {
      return Ok(false);
    }
  }
  Ok(true)
}

fn matches_field(
  resolved: Option<&Value>,
  condition: &Value,
  _depth: usize,
  limits: &LimitsConfig,
) -> CoreResult<bool> {
  match condition {
    Value::Object(op_obj) if op_obj.keys().any(|k| k.starts_with('$')) => {
      matches_operator(resolved, op_obj, limits)
    }
    other => Ok(resolved.map(|v| json_eq(v, other)).unwrap_or(false)),
  }
}

fn json_eq(a: &Value, b: &Value) -> bool {
  a == b
}

fn as_number(v: &Value) -> Option<f64> {
  v.as_f64()
}

fn normalize_bool_as_int(v: &Value) -> Value {
  match v {
    Value::Bool(b) => Value::from(if *b { 1 } else { 0 }),
    other => other.clone(),
  }
}

fn matches_operator(
  resolved: Option<&Value>,
  op_obj: &Map<String, Value>,
  limits: &LimitsConfig,
) -> CoreResult<bool> {
  for op in OPERATOR_DISPATCH_ORDER {
    if let Some(value) = op_obj.get(*op) {
      return eval_operator(resolved, op, value, limits);
    }
  }
  // No recognized operator key: fall back to deep equality.
  let whole = Value::Object(op_obj.clone());
  Ok(resolved.map(|v| json_eq(v, &whole)).unwrap_or(false))
}

fn eval_operator(
  resolved: Option<&Value>,
  op: &str,
  value: &Value,
  limits: &LimitsConfig,
) -> CoreResult<bool> {
  match op {
    "$eq" => Ok(resolved
      .map(|v| json_eq(&normalize_bool_as_int(v), &normalize_bool_as_int(value)))
      .unwrap_or(false)),
    "$ne" => Ok(!resolved
      .map(|v| json_eq(&normalize_bool_as_int(v), &normalize_bool_as_int(value)))
      .unwrap_or(false)),
    "$gt" | "$gte" | "$lt" | "$lte" => {
      let target = value
        .as_f64()
        .ok_or_else(|| CoreError::invalid(format!("{op} requires a numeric value")))?;
      let Some(resolved) = resolved else {
        return Ok(false);
      };
      let Some(n) = as_number(resolved) else {
        return Ok(false);
      };
      Ok(match op {
        "$gt" => n > target,
        "$gte" => n >= target,
        "$lt" => n < target,
        _ => n <= target,
      })
    }
    "$in" | "$nin" => {
      let items = value
        .as_array()
        .ok_or_else(|| CoreError::invalid(format!("{op} requires an array")))?;
      if items.is_empty() {
        return Ok(op == "$nin");
      }
      let is_member = resolved
        .map(|v| items.iter().any(|item| json_eq(v, item)))
        .unwrap_or(false);
      Ok(if op == "$in" { is_member } else { !is_member })
    }
    "$exists" => {
      let want = value
        .as_bool()
        .ok_or_else(|| CoreError::invalid("$exists requires a boolean"))?;
      let present = resolved.map(|v| !v.is_null()).unwrap_or(false);
      Ok(present == want)
    }
    "$regex" => {
      let pattern = value
        .as_str()
        .ok_or_else(|| CoreError::invalid("$regex requires a string pattern"))?;
      if validate_regex_pattern(pattern, limits).is_err() {
        return Ok(false);
      }
      let Some(Value::String(s)) = resolved else {
        return Ok(false);
      };
      Ok(regex::Regex::new(pattern).map(|re| re.is_match(s)).unwrap_or(false))
    }
    "$contains" => {
      let needle = value
        .as_str()
        .ok_or_else(|| CoreError::invalid("$contains requires a string"))?;
      let Some(Value::String(s)) = resolved else {
        return Ok(false);
      };
      Ok(s.contains(needle))
    }
    other => Err(CoreError::invalid(format!("unknown operator {other}"))),
  }
}
