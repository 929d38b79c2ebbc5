//! Rule filters used for partial loads

use serde::{Deserialize, Serialize};

use crate::constants::MAX_FIELDS;

/// Per-field value sets
///
/// A row matches when, for every field with a non-empty set, its value is
/// one of the listed values. Empty sets leave the field unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Filter {
    pub ptype: Vec<String>,
    pub v0: Vec<String>,
    pub v1: Vec<String>,
    pub v2: Vec<String>,
    pub v3: Vec<String>,
    pub v4: Vec<String>,
    pub v5: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the rule type
    pub fn with_ptype<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ptype = values.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict value slot `index` (0..=5); other indexes are ignored
    pub fn with_field<I, S>(mut self, index: usize, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(slot) = self.field_mut(index) {
            *slot = values.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Value sets for `v0..v5`, in column order
    pub fn fields(&self) -> [&[String]; MAX_FIELDS] {
        [
            self.v0.as_slice(),
            self.v1.as_slice(),
            self.v2.as_slice(),
            self.v3.as_slice(),
            self.v4.as_slice(),
            self.v5.as_slice(),
        ]
    }

    fn field_mut(&mut self, index: usize) -> Option<&mut Vec<String>> {
        match index {
            0 => Some(&mut self.v0),
            1 => Some(&mut self.v1),
            2 => Some(&mut self.v2),
            3 => Some(&mut self.v3),
            4 => Some(&mut self.v4),
            5 => Some(&mut self.v5),
            _ => None,
        }
    }

    /// True when no field is constrained
    pub fn is_empty(&self) -> bool {
        self.ptype.is_empty() && self.fields().iter().all(|values| values.is_empty())
    }
}

/// Positional filters for the `p` and `g` sections
///
/// Each list is matched against `v0, v1, ...` of rules whose ptype starts
/// with the section letter; empty strings are wildcards. The two sections
/// are OR-ed together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SectionFilter {
    pub p: Vec<String>,
    pub g: Vec<String>,
}

/// Any filter accepted by a filtered load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyFilter {
    Fields(Filter),
    Sections(SectionFilter),
}

impl From<Filter> for PolicyFilter {
    fn from(filter: Filter) -> Self {
        PolicyFilter::Fields(filter)
    }
}

impl From<SectionFilter> for PolicyFilter {
    fn from(filter: SectionFilter) -> Self {
        PolicyFilter::Sections(filter)
    }
}
