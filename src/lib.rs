//! casbin-sqlx-adapter - relational storage for access-control policies
//!
//! This library persists the rules of an in-memory policy model (`p`
//! permission tuples, `g` role tuples, ...) in one SQL table and keeps the
//! two in sync.
//!
//! # Features
//!
//! - PostgreSQL and SQLite through sqlx's `Any` driver
//! - Filtered loads by per-field value sets or per-section positions
//! - Optional soft delete: removals flag rows, saves reconcile instead of replacing
//! - One transaction per operation, rolled back on any failure
//! - Session refresh wrapper for deployments with several writers
//!
//! # Architecture
//!
//! - **Adapter**: the operations a policy model calls
//! - **Repositories**: row primitives run inside a transaction scope
//! - **Query**: SQL rendering for filters, inserts, updates and removals
//! - **Models**: the stored rule shape and filters

pub mod adapter;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod model;
pub mod models;
pub mod session;

// Re-export commonly used types
pub use adapter::{Adapter, PolicyAdapter};
pub use config::{AdapterConfig, TableConfig};
pub use error::{AdapterError, AdapterResult};
pub use model::{MemoryModel, Model};
pub use models::{CasbinRule, Filter, PolicyFilter, SectionFilter};
pub use session::{Refresh, RefreshingAdapter};
