//! Adapter behaviour against a plain (hard delete) rule table

mod common;

use casbin_sqlx_adapter::{
    Adapter, AdapterError, Filter, MemoryModel, Model, PolicyAdapter, PolicyFilter, SectionFilter,
    TableConfig,
};
use common::*;
use tokio_test::{assert_err, assert_ok};

async fn filtered(adapter: &mut Adapter, filter: impl Into<PolicyFilter>) -> MemoryModel {
    let mut model = MemoryModel::new();
    assert_ok!(adapter.load_filtered_policy(&mut model, &filter.into()).await);
    model
}

#[tokio::test]
async fn test_load_policy() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    let model = loaded(&mut adapter).await;
    assert_eq!(
        model.get_policy("p", "p"),
        rules(&[
            &["alice", "data1", "read"],
            &["bob", "data2", "write"],
            &["data2_admin", "data2", "read"],
            &["data2_admin", "data2", "write"],
        ])
    );
    assert_eq!(model.get_policy("g", "g"), rules(&[&["alice", "data2_admin"]]));
    assert!(!adapter.is_filtered());
}

#[tokio::test]
async fn test_round_trip_every_arity() {
    let db = TestDb::new();
    let mut adapter = Adapter::new(db.pool().await, plain_table()).await.unwrap();
    let values = rule(&["a", "b", "c", "d", "e", "f"]);

    for len in 0..=values.len() {
        assert!(assert_ok!(adapter.add_policy("p", "p", &values[..len]).await));
    }

    let model = loaded(&mut adapter).await;
    for len in 0..=values.len() {
        assert!(model.has_policy("p", "p", &values[..len]), "arity {} lost", len);
    }
    assert_eq!(model.len(), values.len() + 1);
}

#[tokio::test]
async fn test_rule_longer_than_six_rejected() {
    let (db, mut adapter) = seeded_adapter(plain_table()).await;

    let err = assert_err!(
        adapter
            .add_policy("p", "p", &rule(&["a", "b", "c", "d", "e", "f", "g"]))
            .await
    );
    assert!(matches!(err, AdapterError::InvalidInput(_)));
    assert_eq!(count(&db.pool().await, "SELECT COUNT(*) FROM casbin_rule").await, 5);
}

#[tokio::test]
async fn test_add_policies_allows_duplicates() {
    let (db, mut adapter) = seeded_adapter(plain_table()).await;
    let new_rules = rules(&[&["eve", "data3", "read"], &["eve", "data4", "read"]]);

    assert!(assert_ok!(adapter.add_policies("p", "p", &new_rules).await));
    assert!(assert_ok!(adapter.add_policy("p", "p", &new_rules[0]).await));

    let pool = db.pool().await;
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM casbin_rule WHERE v0 = 'eve' AND v1 = 'data3'").await,
        2
    );
    let model = loaded(&mut adapter).await;
    assert!(model.has_policy("p", "p", &new_rules[1]));
}

#[tokio::test]
async fn test_save_policy_replaces_everything() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    let mut model = loaded(&mut adapter).await;
    model.clear_policy();
    model.add_policy("p", "p", rule(&["alice", "data4", "read"]));
    model.add_policy("g", "g", rule(&["bob", "admin"]));

    assert!(assert_ok!(adapter.save_policy(&model).await));

    let reloaded = loaded(&mut adapter).await;
    assert_eq!(reloaded, model);
}

#[tokio::test]
async fn test_remove_policy_twice() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;
    let target = rule(&["alice", "data1", "read"]);

    assert!(assert_ok!(adapter.remove_policy("p", "p", &target).await));
    assert!(!assert_ok!(adapter.remove_policy("p", "p", &target).await));

    let model = loaded(&mut adapter).await;
    assert!(!model.has_policy("p", "p", &target));
    assert_eq!(model.len(), 4);
}

#[tokio::test]
async fn test_remove_policy_checks_ptype() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    assert!(!assert_ok!(
        adapter
            .remove_policy("g", "g", &rule(&["alice", "data1", "read"]))
            .await
    ));
    assert_eq!(loaded(&mut adapter).await.len(), 5);
}

#[tokio::test]
async fn test_remove_policy_spares_longer_rules() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;
    let short = rule(&["alice", "data1"]);
    assert_ok!(adapter.add_policy("p", "p", &short).await);

    assert!(assert_ok!(adapter.remove_policy("p", "p", &short).await));

    let model = loaded(&mut adapter).await;
    assert!(!model.has_policy("p", "p", &short));
    assert!(model.has_policy("p", "p", &rule(&["alice", "data1", "read"])));
    assert_eq!(model.len(), 5);
}

#[tokio::test]
async fn test_remove_empty_rule() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    assert!(!assert_ok!(adapter.remove_policy("p", "p", &[]).await));
    assert_ok!(adapter.add_policy("p", "p", &[]).await);
    assert!(assert_ok!(adapter.remove_policy("p", "p", &[]).await));

    let model = loaded(&mut adapter).await;
    assert!(!model.has_policy("p", "p", &[]));
    assert_eq!(model.get_policy("p", "p").len(), 4);
}

#[tokio::test]
async fn test_update_policy_beside_longer_rule() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;
    let short = rule(&["alice", "data1"]);
    assert_ok!(adapter.add_policy("p", "p", &short).await);

    assert!(assert_ok!(
        adapter
            .update_policy("p", "p", &short, &rule(&["alice", "data9"]))
            .await
    ));

    let model = loaded(&mut adapter).await;
    assert!(model.has_policy("p", "p", &rule(&["alice", "data9"])));
    assert!(model.has_policy("p", "p", &rule(&["alice", "data1", "read"])));
    assert!(!model.has_policy("p", "p", &short));
}

#[tokio::test]
async fn test_remove_policies() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;
    let batch = rules(&[&["alice", "data5", "read"], &["alice", "data6", "read"]]);

    assert_ok!(adapter.add_policies("p", "p", &batch).await);
    assert!(assert_ok!(adapter.remove_policies("p", "p", &batch).await));

    let model = loaded(&mut adapter).await;
    assert!(!model.has_policy("p", "p", &batch[0]));
    assert!(!model.has_policy("p", "p", &batch[1]));
    assert!(model.has_policy("p", "p", &rule(&["alice", "data1", "read"])));
}

#[tokio::test]
async fn test_remove_policies_matches_column_wise() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;
    let listed = rules(&[&["alice", "data5", "read"], &["bob", "data6", "read"]]);
    let bystander = rule(&["alice", "data6", "read"]);

    assert_ok!(adapter.add_policies("p", "p", &listed).await);
    assert_ok!(adapter.add_policy("p", "p", &bystander).await);
    assert!(assert_ok!(adapter.remove_policies("p", "p", &listed).await));

    // v0 in {alice, bob}, v1 in {data5, data6}, v2 in {read} also covers the bystander
    let model = loaded(&mut adapter).await;
    assert!(!model.has_policy("p", "p", &bystander));
    assert_eq!(model.len(), 5);

    assert!(!assert_ok!(adapter.remove_policies("p", "p", &[]).await));
    assert_eq!(loaded(&mut adapter).await.len(), 5);
}

#[tokio::test]
async fn test_remove_filtered_policy_scenario() {
    let db = TestDb::new();
    let pool = db.pool().await;
    let mut adapter = Adapter::new(pool.clone(), plain_table()).await.unwrap();
    seed(
        &pool,
        "casbin_rule",
        &[
            ("p", &["alice", "data1", "read"]),
            ("p", &["bob", "data2", "write"]),
            ("g", &["alice", "data2_admin"]),
        ],
    )
    .await;

    assert!(assert_ok!(
        adapter.remove_filtered_policy("p", "p", 1, &rule(&["data1"])).await
    ));

    let model = loaded(&mut adapter).await;
    assert_eq!(model.get_policy("p", "p"), rules(&[&["bob", "data2", "write"]]));
    assert_eq!(model.get_policy("g", "g"), rules(&[&["alice", "data2_admin"]]));

    assert!(!assert_ok!(
        adapter.remove_filtered_policy("p", "p", 1, &rule(&["data1"])).await
    ));
}

#[tokio::test]
async fn test_remove_filtered_policy_sequence() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    assert!(assert_ok!(
        adapter
            .remove_filtered_policy("p", "p", 1, &rule(&["data2", "read"]))
            .await
    ));
    let model = loaded(&mut adapter).await;
    assert!(!model.has_policy("p", "p", &rule(&["data2_admin", "data2", "read"])));
    assert!(model.has_policy("p", "p", &rule(&["data2_admin", "data2", "write"])));

    assert!(assert_ok!(
        adapter.remove_filtered_policy("p", "p", 2, &rule(&["write"])).await
    ));
    let model = loaded(&mut adapter).await;
    assert_eq!(model.get_policy("p", "p"), rules(&[&["alice", "data1", "read"]]));
}

#[tokio::test]
async fn test_remove_filtered_policy_wildcards() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    // empty strings leave v0 and v1 unconstrained
    assert!(assert_ok!(
        adapter
            .remove_filtered_policy("p", "p", 0, &rule(&["", "", "read"]))
            .await
    ));

    let model = loaded(&mut adapter).await;
    assert_eq!(
        model.get_policy("p", "p"),
        rules(&[&["bob", "data2", "write"], &["data2_admin", "data2", "write"]])
    );
}

#[tokio::test]
async fn test_remove_filtered_policy_rejects_bad_ranges() {
    let (db, mut adapter) = seeded_adapter(plain_table()).await;

    assert!(!assert_ok!(adapter.remove_filtered_policy("p", "p", 6, &rule(&["x"])).await));
    assert!(!assert_ok!(
        adapter.remove_filtered_policy("p", "p", 5, &rule(&["x", "y"])).await
    ));
    assert!(!assert_ok!(adapter.remove_filtered_policy("p", "p", 0, &[]).await));

    assert_eq!(count(&db.pool().await, "SELECT COUNT(*) FROM casbin_rule").await, 5);
}

#[tokio::test]
async fn test_update_policy() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    assert!(assert_ok!(
        adapter
            .update_policy(
                "p",
                "p",
                &rule(&["bob", "data2", "write"]),
                &rule(&["bob", "data2", "read"]),
            )
            .await
    ));

    let model = loaded(&mut adapter).await;
    assert!(model.has_policy("p", "p", &rule(&["bob", "data2", "read"])));
    assert!(!model.has_policy("p", "p", &rule(&["bob", "data2", "write"])));
}

#[tokio::test]
async fn test_update_policy_shrinks_arity() {
    let (db, mut adapter) = seeded_adapter(plain_table()).await;

    assert_ok!(
        adapter
            .update_policy(
                "p",
                "p",
                &rule(&["alice", "data1", "read"]),
                &rule(&["alice", "data1"]),
            )
            .await
    );

    let pool = db.pool().await;
    assert_eq!(
        count(
            &pool,
            "SELECT COUNT(*) FROM casbin_rule WHERE v0 = 'alice' AND v1 = 'data1' AND v2 IS NULL"
        )
        .await,
        1
    );
    let model = loaded(&mut adapter).await;
    assert!(model.has_policy("p", "p", &rule(&["alice", "data1"])));
}

#[tokio::test]
async fn test_update_policy_requires_single_match() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    let err = assert_err!(
        adapter
            .update_policy("p", "p", &rule(&["nobody"]), &rule(&["somebody"]))
            .await
    );
    assert!(matches!(err, AdapterError::NotUnique { matched: 0 }));

    let duplicate = rule(&["eve", "data3", "read"]);
    assert_ok!(adapter.add_policy("p", "p", &duplicate).await);
    assert_ok!(adapter.add_policy("p", "p", &duplicate).await);
    let err = assert_err!(
        adapter
            .update_policy("p", "p", &duplicate, &rule(&["eve", "data3", "write"]))
            .await
    );
    assert!(matches!(err, AdapterError::NotUnique { matched: 2 }));
}

#[tokio::test]
async fn test_update_policies_rolls_back_on_failure() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    let old_rules = rules(&[&["alice", "data1", "read"], &["nobody", "data9", "read"]]);
    let new_rules = rules(&[&["alice", "data1", "write"], &["nobody", "data9", "write"]]);
    assert_err!(adapter.update_policies("p", "p", &old_rules, &new_rules).await);

    let model = loaded(&mut adapter).await;
    assert!(model.has_policy("p", "p", &old_rules[0]));
    assert!(!model.has_policy("p", "p", &new_rules[0]));
}

#[tokio::test]
async fn test_update_policies() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    let old_rules = rules(&[&["alice", "data1", "read"], &["bob", "data2", "write"]]);
    let new_rules = rules(&[&["alice", "data1", "write"], &["bob", "data2", "read"]]);
    assert!(assert_ok!(
        adapter.update_policies("p", "p", &old_rules, &new_rules).await
    ));

    let model = loaded(&mut adapter).await;
    assert!(new_rules.iter().all(|r| model.has_policy("p", "p", r)));
    assert!(old_rules.iter().all(|r| !model.has_policy("p", "p", r)));

    let err = assert_err!(adapter.update_policies("p", "p", &old_rules, &[]).await);
    assert!(matches!(err, AdapterError::InvalidInput(_)));
}

#[tokio::test]
async fn test_update_filtered_policies() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    let removed = assert_ok!(
        adapter
            .update_filtered_policies(
                "p",
                "p",
                &rules(&[&["alice", "data1", "write"]]),
                0,
                &rule(&["alice"]),
            )
            .await
    );
    assert_eq!(removed, rules(&[&["alice", "data1", "read"]]));

    let model = loaded(&mut adapter).await;
    assert!(model.has_policy("p", "p", &rule(&["alice", "data1", "write"])));
    assert!(!model.has_policy("p", "p", &rule(&["alice", "data1", "read"])));
    // the g rule shares v0 but not the ptype
    assert!(model.has_policy("g", "g", &rule(&["alice", "data2_admin"])));
    assert_eq!(model.len(), 5);
}

#[tokio::test]
async fn test_update_filtered_policies_rejects_bad_range() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    let removed = assert_ok!(
        adapter
            .update_filtered_policies("p", "p", &rules(&[&["x"]]), 7, &rule(&["alice"]))
            .await
    );
    assert!(removed.is_empty());
    assert!(!loaded(&mut adapter).await.has_policy("p", "p", &rule(&["x"])));
}

#[tokio::test]
async fn test_filtered_policy() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    let model = filtered(&mut adapter, Filter::new().with_ptype(["p"])).await;
    assert_eq!(model.len(), 4);
    assert!(model.get_policy("g", "g").is_empty());
    assert!(adapter.is_filtered());

    let model = filtered(&mut adapter, Filter::new().with_field(0, ["alice"])).await;
    assert_eq!(model.get_policy("p", "p"), rules(&[&["alice", "data1", "read"]]));
    assert_eq!(model.get_policy("g", "g"), rules(&[&["alice", "data2_admin"]]));

    let model = filtered(&mut adapter, Filter::new().with_field(0, ["bob"])).await;
    assert_eq!(model.get_policy("p", "p"), rules(&[&["bob", "data2", "write"]]));
    assert_eq!(model.len(), 1);

    let model = filtered(&mut adapter, Filter::new().with_field(0, ["alice", "bob"])).await;
    assert_eq!(model.len(), 3);

    let model = filtered(&mut adapter, Filter::new().with_field(1, ["data2"])).await;
    assert_eq!(
        model.get_policy("p", "p"),
        rules(&[
            &["bob", "data2", "write"],
            &["data2_admin", "data2", "read"],
            &["data2_admin", "data2", "write"],
        ])
    );

    let model = filtered(&mut adapter, Filter::new().with_field(2, ["read"])).await;
    assert_eq!(
        model.get_policy("p", "p"),
        rules(&[&["alice", "data1", "read"], &["data2_admin", "data2", "read"]])
    );
}

#[tokio::test]
async fn test_filter_monotonicity() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    let loose = filtered(&mut adapter, Filter::new().with_ptype(["p"])).await;
    let tight = filtered(
        &mut adapter,
        Filter::new().with_ptype(["p"]).with_field(1, ["data2"]),
    )
    .await;
    let tightest = filtered(
        &mut adapter,
        Filter::new()
            .with_ptype(["p"])
            .with_field(1, ["data2"])
            .with_field(2, ["write"]),
    )
    .await;

    for (inner, outer) in [(&tight, &loose), (&tightest, &tight)] {
        for rule in inner.get_policy("p", "p") {
            assert!(outer.has_policy("p", "p", &rule));
        }
        assert!(inner.len() <= outer.len());
    }
    assert_eq!(tightest.len(), 2);
}

#[tokio::test]
async fn test_section_filter() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;

    let model = filtered(
        &mut adapter,
        SectionFilter {
            p: rule(&["", "data2"]),
            g: rule(&["alice"]),
        },
    )
    .await;
    assert_eq!(model.get_policy("p", "p").len(), 3);
    assert_eq!(model.get_policy("g", "g"), rules(&[&["alice", "data2_admin"]]));

    let model = filtered(&mut adapter, SectionFilter::default()).await;
    assert_eq!(model.len(), 5);
}

#[tokio::test]
async fn test_is_filtered_until_full_load() {
    let (_db, mut adapter) = seeded_adapter(plain_table()).await;
    assert!(!adapter.is_filtered());

    filtered(&mut adapter, Filter::new().with_ptype(["g"])).await;
    assert!(adapter.is_filtered());

    assert_ok!(adapter.add_policy("p", "p", &rule(&["eve", "data3", "read"])).await);
    assert!(adapter.is_filtered());

    loaded(&mut adapter).await;
    assert!(!adapter.is_filtered());
}

#[tokio::test]
async fn test_custom_table_name() {
    let db = TestDb::new();
    let pool = db.pool().await;
    let mut adapter = Adapter::new(pool.clone(), TableConfig::new("access_rules"))
        .await
        .unwrap();

    assert_ok!(adapter.add_policy("p", "p", &rule(&["alice", "data1", "read"])).await);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM access_rules").await, 1);
}

#[tokio::test]
async fn test_table_missing_columns_rejected_at_construction() {
    let db = TestDb::new();
    let pool = db.pool().await;
    sqlx::query("CREATE TABLE narrow_rules (id INTEGER PRIMARY KEY, ptype VARCHAR(255), v0 VARCHAR(255))")
        .execute(&pool)
        .await
        .unwrap();

    let err = assert_err!(Adapter::new(pool.clone(), TableConfig::new("narrow_rules").without_create()).await);
    assert!(matches!(err, AdapterError::Configuration(_)));

    // an existing plain table lacks the soft-delete flag
    Adapter::new(pool.clone(), plain_table()).await.unwrap();
    let flagged = plain_table().with_soft_delete("is_deleted").without_create();
    let err = assert_err!(Adapter::new(pool.clone(), flagged).await);
    assert!(matches!(err, AdapterError::Configuration(_)));
}

#[tokio::test]
async fn test_invalid_identifier_rejected() {
    let db = TestDb::new();
    let pool = db.pool().await;

    let err = assert_err!(Adapter::new(pool.clone(), TableConfig::new("rules; DROP TABLE x")).await);
    assert!(matches!(err, AdapterError::Configuration(_)));
}

#[tokio::test]
async fn test_from_url_rejects_invalid_identifier() {
    let db = TestDb::new();

    let err = assert_err!(Adapter::from_url(&db.url, TableConfig::new("bad name")).await);
    assert!(matches!(err, AdapterError::Configuration(_)));
}

#[tokio::test]
async fn test_from_url() {
    let db = TestDb::new();
    let mut adapter = assert_ok!(Adapter::from_url(&db.url, plain_table()).await);

    assert_ok!(adapter.add_policy("g", "g", &rule(&["alice", "admin"])).await);
    let model = loaded(&mut adapter).await;
    assert!(model.has_policy("g", "g", &rule(&["alice", "admin"])));
}
