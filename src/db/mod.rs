//! Database module
//!
//! This module handles connections, table setup, query construction,
//! transaction scoping and the rule repository.

pub mod connection;
pub mod query;
pub mod repositories;
pub mod schema;
pub mod scope;
pub mod soft_delete;

pub use connection::*;
pub use query::{Bind, RuleFilter, RuleQuery, RuleTable};
pub use scope::TransactionScope;
pub use soft_delete::{ReconcilePlan, SoftDelete};
