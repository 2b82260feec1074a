use docstore::document::QueryOptions;
use docstore::{InMemoryShardFactory, TenantStore};
use serde_json::json;

fn store() -> TenantStore<InMemoryShardFactory> {
  TenantStore::new(InMemoryShardFactory::new())
}

#[tokio::test]
async fn put_and_get_round_trip() {
  let tenant = store();
  let put = tenant
    .put("user-a", "notes", "n1", json!({"title": "hi"}), None)
    .await
    .unwrap();
  assert_eq!(put.data["title"], "hi");

  let fetched = tenant.get("user-a", "notes", "n1", None).await.unwrap().unwrap();
  assert_eq!(fetched.data["title"], "hi");
}

#[tokio::test]
async fn users_are_isolated() {
  let tenant = store();
  tenant
    .put("user-a", "notes", "n1", json!({"owner": "a"}), None)
    .await
    .unwrap();
  tenant
    .put("user-b", "notes", "n1", json!({"owner": "b"}), None)
    .await
    .unwrap();

  let a = tenant.get("user-a", "notes", "n1", None).await.unwrap().unwrap();
  let b = tenant.get("user-b", "notes", "n1", None).await.unwrap().unwrap();
  assert_eq!(a.data["owner"], "a");
  assert_eq!(b.data["owner"], "b");
}

#[tokio::test]
async fn namespaces_are_isolated_within_a_user() {
  let tenant = store();
  tenant
    .put("user-a", "notes", "n1", json!({"env": "prod"}), Some("prod"))
    .await
    .unwrap();
  tenant
    .put("user-a", "notes", "n1", json!({"env": "staging"}), Some("staging"))
    .await
    .unwrap();

  let prod = tenant.get("user-a", "notes", "n1", Some("prod")).await.unwrap().unwrap();
  let staging = tenant
    .get("user-a", "notes", "n1", Some("staging"))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(prod.data["env"], "prod");
  assert_eq!(staging.data["env"], "staging");
}

#[tokio::test]
async fn default_namespace_is_used_when_none_given() {
  let tenant = store();
  tenant
    .put("user-a", "notes", "n1", json!({"v": 1}), None)
    .await
    .unwrap();
  let via_default = tenant
    .get("user-a", "notes", "n1", Some("default"))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(via_default.data["v"], 1);
}

#[tokio::test]
async fn list_namespaces_reflects_writes() {
  let tenant = store();
  tenant
    .put("user-a", "notes", "n1", json!({"v": 1}), Some("alpha"))
    .await
    .unwrap();
  tenant
    .put("user-a", "notes", "n2", json!({"v": 2}), Some("beta"))
    .await
    .unwrap();

  let mut namespaces = tenant.list_namespaces("user-a").await.unwrap();
  namespaces.sort();
  assert_eq!(namespaces, vec!["alpha".to_string(), "beta".to_string()]);
}

#[tokio::test]
async fn repeated_writes_to_same_namespace_do_not_duplicate_index_entries() {
  let tenant = store();
  for i in 0..5 {
    tenant
      .put("user-a", "notes", &format!("n{i}"), json!({"v": i}), Some("alpha"))
      .await
      .unwrap();
  }
  let namespaces = tenant.list_namespaces("user-a").await.unwrap();
  assert_eq!(namespaces, vec!["alpha".to_string()]);
}

#[tokio::test]
async fn list_namespaces_is_empty_for_unknown_user() {
  let tenant = store();
  let namespaces = tenant.list_namespaces("ghost").await.unwrap();
  assert!(namespaces.is_empty());
}

#[tokio::test]
async fn delete_and_find_are_scoped_to_user_and_namespace() {
  let tenant = store();
  tenant
    .put("user-a", "notes", "n1", json!({"v": 1}), Some("alpha"))
    .await
    .unwrap();
  tenant
    .put("user-a", "notes", "n2", json!({"v": 2}), Some("alpha"))
    .await
    .unwrap();

  let all = tenant
    .find("user-a", "notes", None, &QueryOptions::default(), Some("alpha"))
    .await
    .unwrap();
  assert_eq!(all.len(), 2);

  assert!(tenant.delete("user-a", "notes", "n1", Some("alpha")).await.unwrap());
  let remaining = tenant
    .find("user-a", "notes", None, &QueryOptions::default(), Some("alpha"))
    .await
    .unwrap();
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].id, "n2");

  // Nothing written in a different namespace for the same user.
  let other = tenant
    .find("user-a", "notes", None, &QueryOptions::default(), Some("beta"))
    .await
    .unwrap();
  assert!(other.is_empty());
}

#[tokio::test]
async fn count_matches_filtered_find() {
  let tenant = store();
  for i in 0..10 {
    tenant
      .put("user-a", "numbers", &format!("d{i}"), json!({"n": i}), None)
      .await
      .unwrap();
  }
  let filter = json!({"n": {"$gte": 5}});
  let found = tenant
    .find("user-a", "numbers", Some(&filter), &QueryOptions::default(), None)
    .await
    .unwrap();
  let count = tenant.count("user-a", "numbers", Some(&filter), None).await.unwrap();
  assert_eq!(found.len(), count);
  assert_eq!(count, 5);
}
