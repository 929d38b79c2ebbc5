//! Policy model interface
//!
//! The adapter never evaluates policies. It only needs to enumerate the
//! rules a model holds, feed stored rule lines back into it, and ask
//! whether a given rule is present.

use std::collections::BTreeMap;

use crate::constants::sections;

/// In-memory policy holder consumed by the adapter
pub trait Model: Send + Sync {
    /// Rule types defined in `sec`
    fn ptypes(&self, sec: &str) -> Vec<String>;

    /// All rules of `ptype` in `sec`
    fn get_policy(&self, sec: &str, ptype: &str) -> Vec<Vec<String>>;

    /// Decode one serialized rule line (`ptype, v0, v1, ...`) into the model
    fn load_policy_line(&mut self, line: &str);

    /// Whether `rule` is currently present
    fn has_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> bool;
}

/// Plain rule storage keyed by section and ptype
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryModel {
    sections: BTreeMap<String, BTreeMap<String, Vec<Vec<String>>>>,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, ignoring exact duplicates
    pub fn add_policy(&mut self, sec: &str, ptype: &str, rule: Vec<String>) -> bool {
        let rules = self
            .sections
            .entry(sec.to_string())
            .or_default()
            .entry(ptype.to_string())
            .or_default();
        if rules.contains(&rule) {
            return false;
        }
        rules.push(rule);
        true
    }

    pub fn remove_policy(&mut self, sec: &str, ptype: &str, rule: &[String]) -> bool {
        let Some(rules) = self
            .sections
            .get_mut(sec)
            .and_then(|ptypes| ptypes.get_mut(ptype))
        else {
            return false;
        };
        let before = rules.len();
        rules.retain(|r| r != rule);
        rules.len() != before
    }

    pub fn clear_policy(&mut self) {
        self.sections.clear();
    }

    /// Number of rules across all sections
    pub fn len(&self) -> usize {
        self.sections
            .values()
            .flat_map(|ptypes| ptypes.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Model for MemoryModel {
    fn ptypes(&self, sec: &str) -> Vec<String> {
        self.sections
            .get(sec)
            .map(|ptypes| ptypes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn get_policy(&self, sec: &str, ptype: &str) -> Vec<Vec<String>> {
        self.sections
            .get(sec)
            .and_then(|ptypes| ptypes.get(ptype))
            .cloned()
            .unwrap_or_default()
    }

    fn load_policy_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }

        let mut tokens = line.split(',').map(|token| token.trim().to_string());
        let Some(ptype) = tokens.next() else {
            return;
        };
        let sec = match ptype.get(..1) {
            Some(sec) if sections::ALL.contains(&sec) => sec.to_string(),
            _ => return,
        };
        self.add_policy(&sec, &ptype, tokens.collect());
    }

    fn has_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> bool {
        self.sections
            .get(sec)
            .and_then(|ptypes| ptypes.get(ptype))
            .is_some_and(|rules| rules.iter().any(|r| r == rule))
    }
}
