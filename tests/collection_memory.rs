use docstore::collection::MemoryCollection;
use docstore::config::LimitsConfig;
use docstore::document::{QueryOptions, SortDirection, SortSpec};
use docstore::filter::compile;
use serde_json::json;

#[test]
fn basic_crud_round_trip() {
  let users = MemoryCollection::new();
  let doc = json!({"name": "Alice", "age": 30});
  let put = users.put("u1", doc.clone()).unwrap();
  assert_eq!(put.data, doc);

  let fetched = users.get("u1").unwrap();
  assert_eq!(fetched.data, doc);
  assert!(users.has("u1"));

  assert!(users.delete("u1"));
  assert!(users.get("u1").is_none());
  assert!(!users.delete("u1"));
}

#[test]
fn put_preserves_created_at_across_overwrite() {
  let users = MemoryCollection::new();
  let first = users.put("u1", json!({"v": 1})).unwrap();
  let second = users.put("u1", json!({"v": 2})).unwrap();
  assert_eq!(first.created_at, second.created_at);
  assert!(second.updated_at >= first.updated_at);
  assert_eq!(second.data, json!({"v": 2}));
}

#[test]
fn empty_string_id_is_accepted() {
  let docs = MemoryCollection::new();
  let put = docs.put("", json!({"v": 1})).unwrap();
  assert_eq!(put.id, "");
  assert!(docs.has(""));
}

#[test]
fn filter_and_sort_and_paginate() {
  let catalog = MemoryCollection::new();
  for (name, price) in [
    ("Alpha", 100),
    ("Beta", 200),
    ("Gamma", 300),
    ("Delta", 400),
    ("Epsilon", 500),
  ] {
    catalog.put(name, json!({"name": name, "price": price})).unwrap();
  }

  let options = QueryOptions {
    limit: Some(2),
    offset: Some(2),
    sort: Some(SortSpec {
      field: "name".to_string(),
      direction: SortDirection::Asc,
    }),
  };
  let page = catalog.find(None, &options).unwrap();
  let names: Vec<&str> = page.iter().map(|d| d.data["name"].as_str().unwrap()).collect();
  assert_eq!(names, vec!["Delta", "Epsilon"]);

  let expensive = catalog
    .find(Some(&json!({"price": {"$gt": 300}})), &QueryOptions::default())
    .unwrap();
  let mut names: Vec<&str> = expensive.iter().map(|d| d.data["name"].as_str().unwrap()).collect();
  names.sort();
  assert_eq!(names, vec!["Delta", "Epsilon"]);
}

#[test]
fn empty_in_and_nin_semantics() {
  let statuses = MemoryCollection::new();
  statuses.put("s1", json!({"status": "a"})).unwrap();
  statuses.put("s2", json!({"status": "b"})).unwrap();

  let in_empty = statuses
    .find(Some(&json!({"status": {"$in": []}})), &QueryOptions::default())
    .unwrap();
  assert!(in_empty.is_empty());

  let nin_empty = statuses
    .find(Some(&json!({"status": {"$nin": []}})), &QueryOptions::default())
    .unwrap();
  assert_eq!(nin_empty.len(), 2);
}

#[test]
fn count_matches_find_length() {
  let docs = MemoryCollection::new();
  for i in 0..10 {
    docs.put(&format!("d{i}"), json!({"n": i})).unwrap();
  }
  let filter = json!({"n": {"$gte": 5}});
  let found = docs.find(Some(&filter), &QueryOptions::default()).unwrap();
  let count = docs.count(Some(&filter)).unwrap();
  assert_eq!(found.len(), count);
  assert_eq!(count, 5);
}

#[test]
fn bulk_put_get_many_delete_many() {
  let docs = MemoryCollection::new();
  let items = vec![
    ("d1".to_string(), json!({"n": 1})),
    ("d2".to_string(), json!({"n": 2})),
    ("d3".to_string(), json!({"n": 3})),
  ];
  assert_eq!(docs.put_many(items).unwrap(), 3);

  let many = docs.get_many(&["d1".to_string(), "missing".to_string(), "d3".to_string()]);
  assert!(many[0].is_some());
  assert!(many[1].is_none());
  assert!(many[2].is_some());

  let removed = docs.delete_many(&["d1".to_string(), "d2".to_string()]);
  assert_eq!(removed, 2);
  assert_eq!(docs.keys(), vec!["d3".to_string()]);
}

#[test]
fn clear_removes_everything() {
  let docs = MemoryCollection::new();
  for i in 0..5 {
    docs.put(&format!("d{i}"), json!({"n": i})).unwrap();
  }
  assert_eq!(docs.clear(), 5);
  assert_eq!(docs.count(None).unwrap(), 0);
}

#[test]
fn redos_pattern_fails_closed_to_no_match() {
  let docs = MemoryCollection::new();
  docs.put("d1", json!({"text": "a".repeat(40) + "b"})).unwrap();

  let start = std::time::Instant::now();
  let result = docs.find(Some(&json!({"text": {"$regex": "(a+)+$"}})), &QueryOptions::default());
  assert!(result.unwrap().is_empty());
  assert!(start.elapsed().as_millis() < 100);
}

#[test]
fn configured_limit_overrides_default_max_limit() {
  let mut limits = LimitsConfig::default();
  limits.max_limit = 3;
  let docs = MemoryCollection::with_limits(limits);
  docs.put("d1", json!({"n": 1})).unwrap();

  let options = QueryOptions {
    limit: Some(3),
    offset: None,
    sort: None,
  };
  assert!(docs.find(None, &options).is_ok());

  let too_large = QueryOptions {
    limit: Some(4),
    offset: None,
    sort: None,
  };
  assert!(docs.find(None, &too_large).is_err());
}

#[test]
fn filter_depth_limit() {
  let docs = MemoryCollection::new();
  docs.put("d1", json!({"leaf": 1})).unwrap();

  let mut filter = json!({"leaf": 1});
  for _ in 0..11 {
    filter = json!({"$and": [filter]});
  }
  assert!(docs.find(Some(&filter), &QueryOptions::default()).is_err());
}

/// Every filter the in-memory evaluator accepts must also compile to
/// SQL, since both consult the same `OPERATOR_DISPATCH_ORDER` constant
/// and reject the same unsafe input up front.
#[test]
fn accepted_filters_also_compile_to_sql() {
  let docs = MemoryCollection::new();
  docs.put("d1", json!({"status": "active", "age": 30, "tags": ["a", "b"]})).unwrap();
  docs.put("d2", json!({"status": "inactive", "age": 17})).unwrap();
  docs.put("d3", json!({"status": "active", "age": 65})).unwrap();

  let cases: Vec<(serde_json::Value, usize)> = vec![
    (json!({"status": "active"}), 2),
    (json!({"age": {"$gte": 18}}), 2),
    (json!({"$and": [{"status": "active"}, {"age": {"$gt": 40}}]}), 1),
    (json!({"$or": [{"status": "inactive"}, {"age": {"$gt": 60}}]}), 2),
    (json!({"status": {"$ne": "active"}}), 1),
    (json!({"tags": {"$exists": true}}), 1),
  ];

  for (filter, expected_count) in &cases {
    let mut params = Vec::new();
    assert!(
      compile(filter, &mut params, &LimitsConfig::default()).is_ok(),
      "filter should compile: {filter:?}"
    );
    let found = docs.find(Some(filter), &QueryOptions::default()).unwrap();
    assert_eq!(found.len(), *expected_count, "mismatch for filter: {filter:?}");
  }
}
