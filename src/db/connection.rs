//! Database connection management

use sqlx::{
    any::{install_default_drivers, AnyPoolOptions},
    AnyConnection, AnyPool,
};

use crate::{config::DatabaseConfig, constants::BACKEND_POSTGRES};

/// Create a new database connection pool
///
/// Any `postgres://` or `sqlite:` URL is accepted; the drivers are
/// registered on first use.
pub async fn create_pool(config: &DatabaseConfig) -> Result<AnyPool, sqlx::Error> {
    install_default_drivers();

    AnyPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

/// SQL dialect spoken by a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn of(conn: &AnyConnection) -> Self {
        if conn.backend_name() == BACKEND_POSTGRES {
            Backend::Postgres
        } else {
            Backend::Sqlite
        }
    }
}
