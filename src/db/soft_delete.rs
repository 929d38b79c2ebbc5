//! Soft-delete overlay
//!
//! With a flag column configured, removals set the flag instead of
//! deleting rows and every read only sees rows whose flag is unset.
//! Saving a model then becomes a diff against the live rows so history
//! is kept.

use std::collections::HashSet;

use crate::{
    constants::sections,
    error::AdapterResult,
    model::Model,
    models::CasbinRule,
};

/// Boolean column marking logically removed rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDelete {
    column: String,
}

impl SoftDelete {
    pub fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Predicate selecting rows that are not flagged
    pub fn live_clause(&self) -> String {
        format!("{} = FALSE", self.column)
    }

    /// Assignment flagging a row
    pub fn mark_clause(&self) -> String {
        format!("{} = TRUE", self.column)
    }
}

/// Changes needed to bring the live rows in line with a model
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Model rules with no live row
    pub insert: Vec<CasbinRule>,
    /// Live rows whose rule is gone from the model
    pub mark_deleted: Vec<i64>,
}

impl ReconcilePlan {
    /// Diff `live` rows against the `p` and `g` sections of `model`.
    /// Rows present on both sides are left alone.
    pub fn build(live: &[CasbinRule], model: &dyn Model) -> AdapterResult<Self> {
        let mut stored: HashSet<(String, Vec<String>)> = live
            .iter()
            .map(|row| (row.ptype.clone(), row.rule()))
            .collect();

        let mut plan = ReconcilePlan::default();

        for sec in sections::ALL {
            for ptype in model.ptypes(sec) {
                for rule in model.get_policy(sec, &ptype) {
                    let row = CasbinRule::new(&ptype, &rule)?;
                    if stored.insert((ptype.clone(), rule)) {
                        plan.insert.push(row);
                    }
                }
            }
        }

        plan.mark_deleted = live
            .iter()
            .filter(|row| !model.has_policy(row.section(), &row.ptype, &row.rule()))
            .filter_map(|row| row.id)
            .collect();

        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.mark_deleted.is_empty()
    }
}
