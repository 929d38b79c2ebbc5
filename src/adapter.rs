//! Policy adapter
//!
//! [`Adapter`] keeps a relational rule table in sync with an in-memory
//! [`Model`]. Every operation runs in its own [`TransactionScope`], so
//! nothing it writes becomes visible unless the whole operation succeeds.

use async_trait::async_trait;
use sqlx::{pool::PoolConnection, Any, AnyConnection, AnyPool};

use crate::{
    config::{AdapterConfig, DatabaseConfig, TableConfig},
    constants::{sections, DEFAULT_DATABASE_MAX_CONNECTIONS, MAX_FIELDS},
    db::{
        connection::create_pool,
        query::{RuleFilter, RuleTable},
        repositories::RuleRepository,
        schema,
        scope::TransactionScope,
        soft_delete::ReconcilePlan,
    },
    error::{AdapterError, AdapterResult},
    model::Model,
    models::{CasbinRule, PolicyFilter},
};

/// Rule persistence contract consumed by a policy model
#[async_trait]
pub trait PolicyAdapter: Send {
    /// Load every stored rule into `model`
    async fn load_policy(&mut self, model: &mut dyn Model) -> AdapterResult<()>;

    /// Load only the rules selected by `filter`
    async fn load_filtered_policy(
        &mut self,
        model: &mut dyn Model,
        filter: &PolicyFilter,
    ) -> AdapterResult<()>;

    /// Whether the last load was a filtered one
    fn is_filtered(&self) -> bool;

    /// Make storage hold exactly the `p` and `g` rules of `model`
    async fn save_policy(&mut self, model: &dyn Model) -> AdapterResult<bool>;

    async fn add_policy(&mut self, sec: &str, ptype: &str, rule: &[String]) -> AdapterResult<bool>;

    async fn add_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> AdapterResult<bool>;

    async fn remove_policy(&mut self, sec: &str, ptype: &str, rule: &[String])
        -> AdapterResult<bool>;

    /// Remove rows whose every column `i` equals the `i`-th value of any
    /// of `rules`
    async fn remove_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> AdapterResult<bool>;

    async fn remove_filtered_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> AdapterResult<bool>;

    async fn update_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        old_rule: &[String],
        new_rule: &[String],
    ) -> AdapterResult<bool>;

    async fn update_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        old_rules: &[Vec<String>],
        new_rules: &[Vec<String>],
    ) -> AdapterResult<bool>;

    /// Replace the rules matched by a positional filter with `new_rules`,
    /// returning the replaced rules
    async fn update_filtered_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        new_rules: &[Vec<String>],
        field_index: usize,
        field_values: &[String],
    ) -> AdapterResult<Vec<Vec<String>>>;
}

/// sqlx-backed adapter over one rule table
pub struct Adapter {
    pool: AnyPool,
    /// Long-lived connection handed in by the caller
    session: Option<PoolConnection<Any>>,
    config: TableConfig,
    table: RuleTable,
    filtered: bool,
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("table", &self.config)
            .field("session", &self.session.is_some())
            .field("filtered", &self.filtered)
            .finish_non_exhaustive()
    }
}

impl Adapter {
    /// Create an adapter on `pool`, creating and verifying the rule table
    pub async fn new(pool: AnyPool, config: TableConfig) -> AdapterResult<Self> {
        config.validate()?;
        let mut conn = pool.acquire().await?;
        prepare_table(&mut conn, &config).await?;
        drop(conn);

        Ok(Self::assemble(pool, None, config))
    }

    /// Create an adapter that runs every operation on `session`
    pub async fn with_session(
        pool: AnyPool,
        mut session: PoolConnection<Any>,
        config: TableConfig,
    ) -> AdapterResult<Self> {
        config.validate()?;
        prepare_table(&mut session, &config).await?;

        Ok(Self::assemble(pool, Some(session), config))
    }

    /// Connect to `url` and create an adapter on a new pool
    pub async fn from_url(url: &str, config: TableConfig) -> AdapterResult<Self> {
        let database = DatabaseConfig {
            url: url.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
        };
        Self::from_config(&AdapterConfig {
            database,
            table: config,
        })
        .await
    }

    pub async fn from_config(config: &AdapterConfig) -> AdapterResult<Self> {
        let pool = create_pool(&config.database).await?;
        Self::new(pool, config.table.clone()).await
    }

    fn assemble(pool: AnyPool, session: Option<PoolConnection<Any>>, config: TableConfig) -> Self {
        Self {
            pool,
            session,
            table: RuleTable::new(&config),
            config,
            filtered: false,
        }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn table_config(&self) -> &TableConfig {
        &self.config
    }

    /// Give the borrowed session back to the caller
    pub fn into_session(self) -> Option<PoolConnection<Any>> {
        self.session
    }

    /// Replace the held session with a newly opened connection so the next
    /// operation observes writes made by other processes. Pool-backed
    /// adapters already take a fresh transaction per operation.
    pub async fn refresh(&mut self) -> AdapterResult<()> {
        if let Some(stale) = self.session.take() {
            if let Err(err) = stale.close().await {
                tracing::warn!(error = %err, "failed to close stale session");
            }
            self.session = Some(self.pool.acquire().await?);
            tracing::debug!(table = self.table.name(), "session refreshed");
        }
        Ok(())
    }
}

async fn prepare_table(conn: &mut AnyConnection, config: &TableConfig) -> AdapterResult<()> {
    if config.create_table {
        schema::create_table(conn, config).await?;
    }
    schema::verify_table(conn, config).await
}

fn to_rows(ptype: &str, rules: &[Vec<String>]) -> AdapterResult<Vec<CasbinRule>> {
    rules.iter().map(|rule| CasbinRule::new(ptype, rule)).collect()
}

async fn insert_rows(
    conn: &mut AnyConnection,
    table: &RuleTable,
    rows: &[CasbinRule],
) -> AdapterResult<()> {
    for row in rows {
        RuleRepository::insert(conn, table, row).await?;
    }
    Ok(())
}

fn load_rows(model: &mut dyn Model, rows: &[CasbinRule]) {
    for row in rows {
        model.load_policy_line(&row.to_string());
    }
}

/// Rewrite the single row holding `old_rule`
async fn update_one(
    conn: &mut AnyConnection,
    table: &RuleTable,
    ptype: &str,
    old_rule: &[String],
    new_rule: &[String],
) -> AdapterResult<()> {
    let matched = RuleRepository::find(
        conn,
        table,
        &RuleFilter::Exact {
            ptype,
            rule: old_rule,
        },
    )
    .await?;

    let [row] = matched.as_slice() else {
        return Err(AdapterError::NotUnique {
            matched: matched.len(),
        });
    };
    let Some(id) = row.id else {
        return Err(AdapterError::NotUnique { matched: 0 });
    };

    let width = old_rule.len().max(new_rule.len());
    RuleRepository::update_values(conn, table, id, new_rule, width).await
}

#[async_trait]
impl PolicyAdapter for Adapter {
    #[tracing::instrument(skip_all)]
    async fn load_policy(&mut self, model: &mut dyn Model) -> AdapterResult<()> {
        let mut scope = TransactionScope::begin(&self.pool, self.session.as_mut(), "load_policy").await?;
        let result = RuleRepository::find(scope.conn(), &self.table, &RuleFilter::All).await;
        let rows = scope.finish(result).await?;

        load_rows(model, &rows);
        self.filtered = false;
        tracing::info!(rules = rows.len(), "policy loaded");
        Ok(())
    }

    #[tracing::instrument(skip(self, model))]
    async fn load_filtered_policy(
        &mut self,
        model: &mut dyn Model,
        filter: &PolicyFilter,
    ) -> AdapterResult<()> {
        let rule_filter = match filter {
            PolicyFilter::Fields(fields) => RuleFilter::Fields(fields),
            PolicyFilter::Sections(by_section) => RuleFilter::Sections(by_section),
        };

        let mut scope =
            TransactionScope::begin(&self.pool, self.session.as_mut(), "load_filtered_policy").await?;
        let result = RuleRepository::find(scope.conn(), &self.table, &rule_filter).await;
        let rows = scope.finish(result).await?;

        load_rows(model, &rows);
        self.filtered = true;
        tracing::info!(rules = rows.len(), "filtered policy loaded");
        Ok(())
    }

    fn is_filtered(&self) -> bool {
        self.filtered
    }

    #[tracing::instrument(skip_all)]
    async fn save_policy(&mut self, model: &dyn Model) -> AdapterResult<bool> {
        let mut scope = TransactionScope::begin(&self.pool, self.session.as_mut(), "save_policy").await?;
        let conn = scope.conn();

        let result = if self.table.soft_delete().is_some() {
            reconcile(conn, &self.table, model).await
        } else {
            replace_all(conn, &self.table, model).await
        };

        scope.finish(result).await?;
        Ok(true)
    }

    #[tracing::instrument(skip(self, rule))]
    async fn add_policy(&mut self, sec: &str, ptype: &str, rule: &[String]) -> AdapterResult<bool> {
        let row = CasbinRule::new(ptype, rule)?;

        let mut scope = TransactionScope::begin(&self.pool, self.session.as_mut(), "add_policy").await?;
        let result = RuleRepository::insert(scope.conn(), &self.table, &row).await;
        scope.finish(result).await?;
        Ok(true)
    }

    #[tracing::instrument(skip(self, rules))]
    async fn add_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> AdapterResult<bool> {
        let rows = to_rows(ptype, rules)?;

        let mut scope = TransactionScope::begin(&self.pool, self.session.as_mut(), "add_policies").await?;
        let result = insert_rows(scope.conn(), &self.table, &rows).await;
        scope.finish(result).await?;
        Ok(true)
    }

    #[tracing::instrument(skip(self, rule))]
    async fn remove_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        rule: &[String],
    ) -> AdapterResult<bool> {
        if rule.len() > MAX_FIELDS {
            return Ok(false);
        }

        let filter = RuleFilter::Exact { ptype, rule };
        let mut scope = TransactionScope::begin(&self.pool, self.session.as_mut(), "remove_policy").await?;
        let result = RuleRepository::remove(scope.conn(), &self.table, &filter).await;
        let removed = scope.finish(result).await?;
        Ok(removed > 0)
    }

    #[tracing::instrument(skip(self, rules))]
    async fn remove_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> AdapterResult<bool> {
        let Some(filter) = RuleFilter::columnwise(ptype, rules) else {
            return Ok(false);
        };

        let mut scope =
            TransactionScope::begin(&self.pool, self.session.as_mut(), "remove_policies").await?;
        let result = RuleRepository::remove(scope.conn(), &self.table, &filter).await;
        let removed = scope.finish(result).await?;
        Ok(removed > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn remove_filtered_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> AdapterResult<bool> {
        let Some(filter) = RuleFilter::positional(ptype, field_index, field_values) else {
            tracing::warn!(field_index, values = field_values.len(), "filter outside v0..v5 rejected");
            return Ok(false);
        };

        let mut scope =
            TransactionScope::begin(&self.pool, self.session.as_mut(), "remove_filtered_policy").await?;
        let result = RuleRepository::remove(scope.conn(), &self.table, &filter).await;
        let removed = scope.finish(result).await?;
        Ok(removed > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn update_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        old_rule: &[String],
        new_rule: &[String],
    ) -> AdapterResult<bool> {
        CasbinRule::new(ptype, old_rule)?;
        CasbinRule::new(ptype, new_rule)?;

        let mut scope = TransactionScope::begin(&self.pool, self.session.as_mut(), "update_policy").await?;
        let result = update_one(scope.conn(), &self.table, ptype, old_rule, new_rule).await;
        scope.finish(result).await?;
        Ok(true)
    }

    #[tracing::instrument(skip(self, old_rules, new_rules))]
    async fn update_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        old_rules: &[Vec<String>],
        new_rules: &[Vec<String>],
    ) -> AdapterResult<bool> {
        if old_rules.len() != new_rules.len() {
            return Err(AdapterError::InvalidInput(format!(
                "{} old rules paired with {} new rules",
                old_rules.len(),
                new_rules.len()
            )));
        }
        to_rows(ptype, old_rules)?;
        to_rows(ptype, new_rules)?;

        let mut scope =
            TransactionScope::begin(&self.pool, self.session.as_mut(), "update_policies").await?;
        let conn = scope.conn();
        let mut result = Ok(());
        for (old_rule, new_rule) in old_rules.iter().zip(new_rules) {
            result = update_one(&mut *conn, &self.table, ptype, old_rule, new_rule).await;
            if result.is_err() {
                break;
            }
        }
        scope.finish(result).await?;
        Ok(true)
    }

    #[tracing::instrument(skip(self, new_rules))]
    async fn update_filtered_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        new_rules: &[Vec<String>],
        field_index: usize,
        field_values: &[String],
    ) -> AdapterResult<Vec<Vec<String>>> {
        let Some(filter) = RuleFilter::positional(ptype, field_index, field_values) else {
            tracing::warn!(field_index, values = field_values.len(), "filter outside v0..v5 rejected");
            return Ok(Vec::new());
        };
        let rows = to_rows(ptype, new_rules)?;

        let mut scope =
            TransactionScope::begin(&self.pool, self.session.as_mut(), "update_filtered_policies")
                .await?;
        let result = replace_filtered(scope.conn(), &self.table, &filter, &rows).await;
        let removed = scope.finish(result).await?;

        Ok(removed.iter().map(CasbinRule::rule).collect())
    }
}

/// Delete every row, then insert the model's rules
async fn replace_all(
    conn: &mut AnyConnection,
    table: &RuleTable,
    model: &dyn Model,
) -> AdapterResult<()> {
    let mut rows = Vec::new();
    for sec in sections::ALL {
        for ptype in model.ptypes(sec) {
            rows.extend(to_rows(&ptype, &model.get_policy(sec, &ptype))?);
        }
    }

    let removed = RuleRepository::remove(&mut *conn, table, &RuleFilter::All).await?;
    insert_rows(&mut *conn, table, &rows).await?;

    tracing::info!(removed, inserted = rows.len(), "policy replaced");
    Ok(())
}

/// Insert missing rules and flag rows the model no longer holds
async fn reconcile(
    conn: &mut AnyConnection,
    table: &RuleTable,
    model: &dyn Model,
) -> AdapterResult<()> {
    let live = RuleRepository::find(&mut *conn, table, &RuleFilter::All).await?;
    let plan = ReconcilePlan::build(&live, model)?;

    insert_rows(&mut *conn, table, &plan.insert).await?;
    let flagged = RuleRepository::mark_deleted(&mut *conn, table, &plan.mark_deleted).await?;

    tracing::info!(
        live = live.len(),
        inserted = plan.insert.len(),
        flagged,
        "policy reconciled"
    );
    Ok(())
}

/// Remove the rows matched by `filter` and insert `rows` in their place
async fn replace_filtered(
    conn: &mut AnyConnection,
    table: &RuleTable,
    filter: &RuleFilter<'_>,
    rows: &[CasbinRule],
) -> AdapterResult<Vec<CasbinRule>> {
    let matched = RuleRepository::find(&mut *conn, table, filter).await?;
    RuleRepository::remove(&mut *conn, table, filter).await?;
    insert_rows(&mut *conn, table, rows).await?;
    Ok(matched)
}
