//! Adapter-wide constants
//!
//! Constants are grouped by their purpose for better organization.

// =============================================================================
// TABLE LAYOUT
// =============================================================================

/// Default rule table name
pub const DEFAULT_TABLE_NAME: &str = "casbin_rule";

/// Number of positional value columns (`v0` .. `v5`)
pub const MAX_FIELDS: usize = 6;

/// Maximum length of a rule column value
pub const MAX_VALUE_LENGTH: usize = 255;

/// Column names in storage order
pub mod columns {
    pub const ID: &str = "id";
    pub const PTYPE: &str = "ptype";
    pub const VALUES: [&str; 6] = ["v0", "v1", "v2", "v3", "v4", "v5"];
}

// =============================================================================
// DATABASE DEFAULTS
// =============================================================================

/// Default maximum database connections in the pool
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Backend name reported by the PostgreSQL driver
pub const BACKEND_POSTGRES: &str = "PostgreSQL";

// =============================================================================
// POLICY SECTIONS
// =============================================================================

/// Policy sections persisted by the adapter
pub mod sections {
    pub const POLICY: &str = "p";
    pub const GROUPING: &str = "g";
    pub const ALL: [&str; 2] = [POLICY, GROUPING];
}
