//! Shared fixtures for the integration suites
//!
//! Each test gets its own SQLite file inside a temporary directory, so
//! several pools and adapters can share one database the way separate
//! worker processes would.

#![allow(dead_code)]

use casbin_sqlx_adapter::{
    config::DatabaseConfig, db::create_pool, Adapter, MemoryModel, PolicyAdapter, TableConfig,
};
use sqlx::AnyPool;
use tempfile::TempDir;

pub const SOFT_TABLE: &str = "casbin_rule_soft_delete";
pub const SOFT_COLUMN: &str = "is_deleted";

/// Temporary database; the file lives as long as this value
pub struct TestDb {
    _dir: TempDir,
    pub url: String,
}

impl TestDb {
    pub fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("policy.db").display());
        Self { _dir: dir, url }
    }

    /// A separate pool, as another process would open
    pub async fn pool(&self) -> AnyPool {
        create_pool(&DatabaseConfig {
            url: self.url.clone(),
            max_connections: 4,
        })
        .await
        .expect("Failed to open test database")
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn plain_table() -> TableConfig {
    TableConfig::default()
}

pub fn soft_table() -> TableConfig {
    TableConfig::new(SOFT_TABLE).with_soft_delete(SOFT_COLUMN)
}

pub fn rule(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn rules(values: &[&[&str]]) -> Vec<Vec<String>> {
    values.iter().map(|r| rule(r)).collect()
}

/// Insert rows behind the adapter's back
pub async fn seed(pool: &AnyPool, table: &str, rows: &[(&str, &[&str])]) {
    for (ptype, values) in rows {
        let mut padded: Vec<Option<String>> = values.iter().map(|v| Some(v.to_string())).collect();
        padded.resize(6, None);

        let sql = format!(
            "INSERT INTO {} (ptype, v0, v1, v2, v3, v4, v5) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            table
        );
        let mut query = sqlx::query(&sql).bind(ptype.to_string());
        for value in padded {
            query = query.bind(value);
        }
        query.execute(pool).await.expect("Failed to seed rule");
    }
}

/// The rows every suite starts from
pub const BASE_RULES: &[(&str, &[&str])] = &[
    ("p", &["alice", "data1", "read"]),
    ("p", &["bob", "data2", "write"]),
    ("p", &["data2_admin", "data2", "read"]),
    ("p", &["data2_admin", "data2", "write"]),
    ("g", &["alice", "data2_admin"]),
];

/// Fresh database with the base rules stored in `table`
pub async fn seeded_adapter(table: TableConfig) -> (TestDb, Adapter) {
    let db = TestDb::new();
    let pool = db.pool().await;
    let name = table.name.clone();
    let adapter = Adapter::new(pool.clone(), table)
        .await
        .expect("Failed to create adapter");
    seed(&pool, &name, BASE_RULES).await;
    (db, adapter)
}

/// Everything the adapter currently reports, as `p`/`g` rule lists
pub async fn loaded(adapter: &mut impl PolicyAdapter) -> MemoryModel {
    let mut model = MemoryModel::new();
    adapter
        .load_policy(&mut model)
        .await
        .expect("Failed to load policy");
    model
}

pub async fn count(pool: &AnyPool, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}

/// Id of the single row selected by `sql`
pub async fn row_id(pool: &AnyPool, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(pool)
        .await
        .expect("Failed to fetch row id")
}
