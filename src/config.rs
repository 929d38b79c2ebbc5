//! Adapter configuration management
//!
//! This module handles loading and validating configuration from environment variables.
//! Table settings can also be built in code with [`TableConfig`]'s builder methods.

use std::env;
use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{DEFAULT_DATABASE_MAX_CONNECTIONS, DEFAULT_TABLE_NAME};

/// SQL identifiers accepted for table and column names
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

/// Main adapter configuration
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub database: DatabaseConfig,
    pub table: TableConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Rule table configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Table holding one row per rule
    pub name: String,
    /// Boolean column flagging logically removed rows; enables soft delete
    pub soft_delete_column: Option<String>,
    /// Create the table at construction if it does not exist
    pub create_table: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_NAME)
    }
}

impl TableConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            soft_delete_column: None,
            create_table: true,
        }
    }

    /// Turn deletes into flag updates on `column`
    pub fn with_soft_delete(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    /// Expect the table to exist already
    pub fn without_create(mut self) -> Self {
        self.create_table = false;
        self
    }

    /// Check that every configured name is a plain SQL identifier
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier(&self.name)?;
        if let Some(column) = &self.soft_delete_column {
            validate_identifier(column)?;
        }
        Ok(())
    }
}

/// Validate a table or column name before it is spliced into SQL
pub fn validate_identifier(name: &str) -> Result<(), ConfigError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(name.to_string()))
    }
}

impl AdapterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database: DatabaseConfig::from_env()?,
            table: TableConfig::from_env()?,
        })
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL".to_string()))?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| DEFAULT_DATABASE_MAX_CONNECTIONS.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string()))?,
        })
    }
}

impl TableConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            name: env::var("CASBIN_TABLE").unwrap_or_else(|_| DEFAULT_TABLE_NAME.to_string()),
            soft_delete_column: env::var("CASBIN_SOFT_DELETE_COLUMN")
                .ok()
                .filter(|column| !column.is_empty()),
            create_table: parse_bool(
                "CASBIN_CREATE_TABLE",
                env::var("CASBIN_CREATE_TABLE").ok().as_deref(),
            )?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_bool(key: &str, value: Option<&str>) -> Result<bool, ConfigError> {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(true),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        },
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),
}
