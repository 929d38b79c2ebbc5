//! Rule record model

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{any::AnyRow, FromRow, Row};

use crate::{
    constants::{columns, MAX_FIELDS},
    error::{AdapterError, AdapterResult},
};

/// One stored policy rule
///
/// `values[i]` holds the i-th element of the rule tuple. Slots after the
/// tuple's length are `None`, and the first `None` ends the rule.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasbinRule {
    /// Surrogate key, `None` until the row is stored
    pub id: Option<i64>,
    pub ptype: String,
    pub values: [Option<String>; MAX_FIELDS],
}

impl CasbinRule {
    /// Build a row from a rule tuple
    pub fn new(ptype: &str, rule: &[String]) -> AdapterResult<Self> {
        if rule.len() > MAX_FIELDS {
            return Err(AdapterError::InvalidInput(format!(
                "rule has {} values, at most {} are supported",
                rule.len(),
                MAX_FIELDS
            )));
        }

        let mut values: [Option<String>; MAX_FIELDS] = Default::default();
        for (slot, value) in values.iter_mut().zip(rule) {
            *slot = Some(value.clone());
        }

        Ok(Self {
            id: None,
            ptype: ptype.to_string(),
            values,
        })
    }

    /// The rule tuple, up to the first unset value
    pub fn rule(&self) -> Vec<String> {
        self.values
            .iter()
            .map_while(|v| v.clone())
            .collect()
    }

    /// Section this rule belongs to, taken from the ptype's first letter
    pub fn section(&self) -> &str {
        self.ptype.get(..1).unwrap_or_default()
    }

    /// Whether this row holds exactly `rule` under `ptype`
    pub fn is_rule(&self, ptype: &str, rule: &[String]) -> bool {
        self.ptype == ptype && self.rule() == rule
    }
}

/// Serialized rule line, e.g. `p, alice, data1, read`
impl fmt::Display for CasbinRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ptype)?;
        for value in self.values.iter().map_while(|v| v.as_deref()) {
            write!(f, ", {}", value)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CasbinRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "<CasbinRule {}: \"{}\">", id, self),
            None => write!(f, "<CasbinRule None: \"{}\">", self),
        }
    }
}

impl<'r> FromRow<'r, AnyRow> for CasbinRule {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        let mut values: [Option<String>; MAX_FIELDS] = Default::default();
        for (slot, column) in values.iter_mut().zip(columns::VALUES) {
            *slot = row.try_get(column)?;
        }

        Ok(Self {
            id: Some(row.try_get(columns::ID)?),
            ptype: row
                .try_get::<Option<String>, _>(columns::PTYPE)?
                .unwrap_or_default(),
            values,
        })
    }
}
