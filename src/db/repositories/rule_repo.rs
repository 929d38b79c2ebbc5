//! Rule repository

use sqlx::AnyConnection;

use crate::{
    db::query::{RuleFilter, RuleTable},
    error::AdapterResult,
    models::CasbinRule,
};

/// Ids flagged per statement when reconciling
const MARK_BATCH_SIZE: usize = 500;

/// Repository for rule rows; every call runs on the caller's transaction
pub struct RuleRepository;

impl RuleRepository {
    /// Fetch live rows matching `filter`, ordered by id
    pub async fn find(
        conn: &mut AnyConnection,
        table: &RuleTable,
        filter: &RuleFilter<'_>,
    ) -> AdapterResult<Vec<CasbinRule>> {
        let query = table.select(filter);
        let rules = query.query_as::<CasbinRule>().fetch_all(&mut *conn).await?;

        tracing::debug!(table = table.name(), rows = rules.len(), "rules fetched");
        Ok(rules)
    }

    /// Insert one row
    pub async fn insert(
        conn: &mut AnyConnection,
        table: &RuleTable,
        rule: &CasbinRule,
    ) -> AdapterResult<()> {
        table.insert(rule).query().execute(&mut *conn).await?;

        tracing::debug!(table = table.name(), rule = %rule, "rule inserted");
        Ok(())
    }

    /// Delete (or flag) live rows matching `filter`, returning how many were hit
    pub async fn remove(
        conn: &mut AnyConnection,
        table: &RuleTable,
        filter: &RuleFilter<'_>,
    ) -> AdapterResult<u64> {
        let result = table.remove(filter).query().execute(&mut *conn).await?;

        tracing::debug!(table = table.name(), rows = result.rows_affected(), "rules removed");
        Ok(result.rows_affected())
    }

    /// Overwrite the value slots of one row
    pub async fn update_values(
        conn: &mut AnyConnection,
        table: &RuleTable,
        id: i64,
        rule: &[String],
        width: usize,
    ) -> AdapterResult<()> {
        table
            .update_values(id, rule, width)
            .query()
            .execute(&mut *conn)
            .await?;

        tracing::debug!(table = table.name(), id, "rule updated");
        Ok(())
    }

    /// Flag rows as deleted by id; a no-op without soft delete
    pub async fn mark_deleted(
        conn: &mut AnyConnection,
        table: &RuleTable,
        ids: &[i64],
    ) -> AdapterResult<u64> {
        let mut flagged = 0;
        for chunk in ids.chunks(MARK_BATCH_SIZE) {
            let Some(query) = table.mark_deleted(chunk) else {
                return Ok(0);
            };
            flagged += query.query().execute(&mut *conn).await?.rows_affected();
        }

        tracing::debug!(table = table.name(), rows = flagged, "rules flagged deleted");
        Ok(flagged)
    }
}
