//! Rule table setup
//!
//! Creation is idempotent. Verification runs a zero-row `SELECT` of every
//! column the adapter reads or writes, so a table missing one of them is
//! reported before any rule query is attempted.

use sqlx::AnyConnection;

use crate::{
    config::TableConfig,
    constants::{columns, MAX_VALUE_LENGTH},
    db::connection::Backend,
    error::{AdapterError, AdapterResult},
};

/// `CREATE TABLE IF NOT EXISTS` (plus flag index) for the given backend
pub fn create_statements(table: &TableConfig, backend: Backend) -> Vec<String> {
    let id_column = match backend {
        Backend::Postgres => "id BIGSERIAL PRIMARY KEY",
        Backend::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
    };

    let mut definition = format!("{}, {} VARCHAR({})", id_column, columns::PTYPE, MAX_VALUE_LENGTH);
    for column in columns::VALUES {
        definition.push_str(&format!(", {} VARCHAR({})", column, MAX_VALUE_LENGTH));
    }
    if let Some(flag) = &table.soft_delete_column {
        definition.push_str(&format!(", {} BOOLEAN NOT NULL DEFAULT FALSE", flag));
    }

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table.name, definition
    )];
    if let Some(flag) = &table.soft_delete_column {
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS ix_{}_{} ON {} ({})",
            table.name, flag, table.name, flag
        ));
    }
    statements
}

/// Create the rule table if it does not exist yet
pub async fn create_table(conn: &mut AnyConnection, table: &TableConfig) -> AdapterResult<()> {
    let backend = Backend::of(conn);
    for statement in create_statements(table, backend) {
        sqlx::query(&statement).execute(&mut *conn).await?;
    }
    tracing::info!(table = %table.name, ?backend, "rule table ready");
    Ok(())
}

/// Check the table exposes every required column
pub async fn verify_table(conn: &mut AnyConnection, table: &TableConfig) -> AdapterResult<()> {
    let mut required = vec![columns::ID, columns::PTYPE];
    required.extend(columns::VALUES);
    if let Some(flag) = &table.soft_delete_column {
        required.push(flag.as_str());
    }

    let probe = format!("SELECT {} FROM {} WHERE 1 = 0", required.join(", "), table.name);
    sqlx::query(&probe)
        .execute(&mut *conn)
        .await
        .map_err(|err| {
            AdapterError::Configuration(format!(
                "table {} must provide columns [{}]: {}",
                table.name,
                required.join(", "),
                err
            ))
        })?;

    Ok(())
}
