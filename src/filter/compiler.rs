//! Compiles a JSON filter tree into a parameterized SQL `WHERE` fragment.
//!
//! Grounded on `query::structured::StructuredCompiler`, but restructured
//! so every value is bound through a `?` placeholder collected into
//! `params_out`, instead of being escaped and interpolated as a SQL
//! literal. Field names are still interpolated directly, but only after
//! `validate::validate_field_name` accepts them.

use crate::config::LimitsConfig;
use crate::error::{CoreError, CoreResult};
use crate::validate::{validate_field_name, validate_regex_pattern};
use serde_json::{Map, Value};

/// The order in which a field's operator object is inspected when it
/// carries more than one recognized key (e.g. `{"$gt":1,"$eq":5}`). Kept
/// as plain data, walked identically by the compiler and by
/// `filter::eval`, rather than relying on a serde-derived enum's
/// deserialization order for safety-critical dispatch.
pub const OPERATOR_DISPATCH_ORDER: &[&str] = &[
  "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$exists", "$regex", "$contains",
];

/// A single bound value, in the order it must be supplied to the
/// underlying `rusqlite` statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Text(String),
}

impl Param {
  fn from_json_scalar(v: &Value) -> Param {
    match v {
      Value::Null => Param::Null,
      Value::Bool(b) => Param::Bool(*b),
      Value::Number(n) => {
        if let Some(i) = n.as_i64() {
          Param::Int(i)
        } else {
          Param::Float(n.as_f64().unwrap_or(0.0))
        }
      }
      Value::String(s) => Param::Text(s.clone()),
      other => Param::Text(other.to_string()),
    }
  }
}

fn json_path(field: &str) -> String {
  format!("json_extract(data,'$.{field}')")
}

fn escape_like(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '%' => out.push_str("\\%"),
      '_' => out.push_str("\\_"),
      '\\' => out.push_str("\\\\"),
      _ => out.push(c),
    }
  }
  out
}

/// Compiles `filter` into a SQL fragment, pushing bind values onto
/// `params_out` in the order they appear in the fragment. An empty
/// top-level filter (`{}`) compiles to the literal `1=1`. `limits`
/// governs the maximum nesting depth and regex pattern length enforced
/// along the way, so a loaded `CoreConfig` actually changes what this
/// function accepts.
pub fn compile(filter: &Value, params_out: &mut Vec<Param>, limits: &LimitsConfig) -> CoreResult<String> {
  compile_node(filter, params_out, 0, limits)
}

fn compile_node(
  node: &Value,
  params_out: &mut Vec<Param>,
  depth: usize,
  limits: &LimitsConfig,
) -> CoreResult<String> {
  if depth > limits.max_filter_depth {
    return Err(CoreError::invalid(format!(
      "filter nesting exceeds maximum depth of {}",
      limits.max_filter_depth
    )));
  }
  let obj = match node {
    Value::Object(map) => map,
    _ => {
      return Err(CoreError::invalid(
        "filter node must be a JSON object",
      ))
    }
  };
  if obj.is_empty() {
    return Ok("1=1".to_string());
  }
  if let Some(children) = obj.get("$and") {
    return compile_logical(children, params_out, depth, " AND ", limits);
  }
  if let Some(children) = obj.get("$or") {
    return compile_logical(children, params_out, depth, " OR ", limits);
  }
  if let Some(child) = obj.get("$not") {
    let inner = compile_node(child, params_out, depth + 1, limits)?;
    return Ok(format!("NOT ({inner})"));
  }
  compile_fields(obj, params_out, depth, limits)
}

fn compile_logical(
  children: &Value,
  params_out: &mut Vec<Param>,
  depth: usize,
  joiner: &str,
  limits: &LimitsConfig,
) -> CoreResult<String> {
  let items = children
    .as_array()
    .ok_or_else(|| CoreError::invalid("$and/$or must be an array of filters"))?;
  if items.is_empty() {
    // An empty conjunction/disjunction contributes no clause.
    return Ok("1=1".to_string());
  }
  let mut clauses = Vec::with_capacity(items.len());
  for item in items {
    clauses.push(compile_node(item, params_out, depth + 1, limits)?);
  }
  Ok(format!("({})", clauses.join(joiner)))
}

fn compile_fields(
  obj: &Map<String, Value>,
  params_out: &mut Vec<Param>,
  depth: usize,
  limits: &LimitsConfig,
) -> CoreResult<String> {
  let mut clauses = Vec::with_capacity(obj.len());
  for (field, condition) in obj {
    validate_field_name(field)?;
    clauses.push(compile_field_condition(field, condition, params_out, depth + 1, limits)?);
  }
  Ok(format!("({})", clauses.join(" AND ")))
}

fn compile_field_condition(
  field: &str,
  condition: &Value,
  params_out: &mut Vec<Param>,
  _depth: usize,
  limits: &LimitsConfig,
) -> CoreResult<String> {
  let path = json_path(field);
  match condition {
    Value::Object(op_obj) if op_obj.keys().any(|k| k.starts_with('$')) => {
      compile_operator_object(&path, op_obj, params_out, limits)
    }
    other => {
      // Implicit equality, including whole-object equality.
      params_out.push(Param::from_json_scalar_or_object(other));
      Ok(if matches!(other, Value::Object(_)) {
        format!("{path} = json(?)")
      } else {
        format!("{path} = ?")
      })
    }
  }
}

impl Param {
  fn from_json_scalar_or_object(v: &Value) -> Param {
    match v {
      Value::Object(_) | Value::Array(_) => Param::Text(v.to_string()),
      other => Param::from_json_scalar(other),
    }
  }
}

fn compile_operator_object(
  path: &str,
  op_obj: &Map<String, Value>,
  params_out: &mut Vec<Param>,
  limits: &LimitsConfig,
) -> CoreResult<String> {
  for op in OPERATOR_DISPATCH_ORDER {
    if let Some(value) = op_obj.get(*op) {
      return compile_operator(path, op, value, params_out, limits);
    }
  }
  // No recognized operator key: fall back to exact match against the
  // object as a whole.
  params_out.push(Param::Text(Value::Object(op_obj.clone()).to_string()));
  Ok(format!("{path} = json(?)"))
}

fn compile_operator(
  path: &str,
  op: &str,
  value: &Value,
  params_out: &mut Vec<Param>,
  limits: &LimitsConfig,
) -> CoreResult<String> {
  match op {
    "$eq" => {
      params_out.push(Param::from_json_scalar_or_object(value));
      Ok(format!("{path} = ?"))
    }
    "$ne" => {
      params_out.push(Param::from_json_scalar_or_object(value));
      Ok(format!("{path} != ?"))
    }
    "$gt" | "$gte" | "$lt" | "$lte" => {
      let sql_op = match op {
        "$gt" => ">",
        "$gte" => ">=",
        "$lt" => "<",
        _ => "<=",
      };
      let n = value
        .as_f64()
        .ok_or_else(|| CoreError::invalid(format!("{op} requires a numeric value")))?;
      params_out.push(Param::Float(n));
      Ok(format!("CAST({path} AS REAL) {sql_op} ?"))
    }
    "$in" | "$nin" => {
      let items = value
        .as_array()
        .ok_or_else(|| CoreError::invalid(format!("{op} requires an array")))?;
      if items.is_empty() {
        return Ok(if op == "$in" {
          "1=0".to_string()
        } else {
          "1=1".to_string()
        });
      }
      let placeholders = vec!["?"; items.len()].join(", ");
      for item in items {
        params_out.push(Param::from_json_scalar(item));
      }
      let kw = if op == "$in" { "IN" } else { "NOT IN" };
      Ok(format!("{path} {kw} ({placeholders})"))
    }
    "$exists" => {
      let want = value
        .as_bool()
        .ok_or_else(|| CoreError::invalid("$exists requires a boolean"))?;
      Ok(format!(
        "{path} IS {}",
        if want { "NOT NULL" } else { "NULL" }
      ))
    }
    "$regex" => {
      let pattern = value
        .as_str()
        .ok_or_else(|| CoreError::invalid("$regex requires a string pattern"))?;
      validate_regex_pattern(pattern, limits)?;
      params_out.push(Param::Text(pattern.to_string()));
      Ok(format!("{path} REGEXP ?"))
    }
    "$contains" => {
      let needle = value
        .as_str()
        .ok_or_else(|| CoreError::invalid("$contains requires a string"))?;
      params_out.push(Param::Text(format!("%{}%", escape_like(needle))));
      Ok(format!("{path} LIKE ? ESCAPE '\\'"))
    }
    other => Err(CoreError::invalid(format!("unknown operator {other}"))),
  }
}
