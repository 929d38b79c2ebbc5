//! Database repositories
//!
//! Repositories handle all direct database interactions.

pub mod rule_repo;

pub use rule_repo::RuleRepository;
