//! Rule query construction
//!
//! Statements are rendered as SQL text with `$N` placeholders plus the
//! values to bind, so the same statement runs on PostgreSQL and SQLite.
//! Table and column names come from a validated [`TableConfig`]; rule
//! values are always bound.

use sqlx::{
    any::{AnyArguments, AnyRow},
    query::{Query, QueryAs},
    Any, FromRow,
};

use crate::{
    config::TableConfig,
    constants::{columns, sections, MAX_FIELDS},
    db::soft_delete::SoftDelete,
    models::{CasbinRule, Filter, SectionFilter},
};

/// Value bound to a placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bind {
    Text(Option<String>),
    Int(i64),
}

impl From<&str> for Bind {
    fn from(value: &str) -> Self {
        Bind::Text(Some(value.to_string()))
    }
}

/// A rendered statement and its bind values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleQuery {
    sql: String,
    binds: Vec<Bind>,
}

impl RuleQuery {
    fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    fn push_bind(&mut self, value: impl Into<Bind>) -> &mut Self {
        self.binds.push(value.into());
        self.sql.push_str(&format!("${}", self.binds.len()));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[Bind] {
        &self.binds
    }

    /// Statement ready to execute
    pub fn query(&self) -> Query<'_, Any, AnyArguments<'_>> {
        self.binds
            .iter()
            .fold(sqlx::query(&self.sql), |query, bind| match bind {
                Bind::Text(value) => query.bind(value.clone()),
                Bind::Int(value) => query.bind(*value),
            })
    }

    /// Statement ready to fetch rows as `T`
    pub fn query_as<T>(&self) -> QueryAs<'_, Any, T, AnyArguments<'_>>
    where
        T: for<'r> FromRow<'r, AnyRow>,
    {
        self.binds
            .iter()
            .fold(sqlx::query_as::<_, T>(&self.sql), |query, bind| match bind {
                Bind::Text(value) => query.bind(value.clone()),
                Bind::Int(value) => query.bind(*value),
            })
    }
}

/// Selection predicate over stored rules
#[derive(Debug, Clone, Copy)]
pub enum RuleFilter<'a> {
    /// Every row
    All,
    /// Set membership per field; empty sets are skipped
    Fields(&'a Filter),
    /// Positional `p` / `g` filters, OR-ed across sections
    Sections(&'a SectionFilter),
    /// `ptype` plus positional equality on every element of `rule`
    Exact { ptype: &'a str, rule: &'a [String] },
    /// `ptype` plus, per column, equality with any of the rules' values
    Columnwise {
        ptype: &'a str,
        rules: &'a [Vec<String>],
    },
    /// `ptype` plus `v[field_index + i] = field_values[i]`, skipping `""`
    Positional {
        ptype: &'a str,
        field_index: usize,
        field_values: &'a [String],
    },
}

impl<'a> RuleFilter<'a> {
    /// Positional filter, or `None` when it would address slots outside `v0..v5`
    /// or select no slot at all
    pub fn positional(ptype: &'a str, field_index: usize, field_values: &'a [String]) -> Option<Self> {
        if field_index >= MAX_FIELDS || field_values.is_empty() {
            return None;
        }
        if field_index + field_values.len() > MAX_FIELDS {
            return None;
        }
        Some(RuleFilter::Positional {
            ptype,
            field_index,
            field_values,
        })
    }

    /// Column-wise filter, or `None` when no rules are given
    pub fn columnwise(ptype: &'a str, rules: &'a [Vec<String>]) -> Option<Self> {
        if rules.is_empty() {
            return None;
        }
        Some(RuleFilter::Columnwise { ptype, rules })
    }
}

/// Joins predicates with `WHERE` then `AND`
struct Conditions<'q> {
    query: &'q mut RuleQuery,
    started: bool,
}

impl<'q> Conditions<'q> {
    fn new(query: &'q mut RuleQuery) -> Self {
        Self {
            query,
            started: false,
        }
    }

    fn next(&mut self) -> &mut RuleQuery {
        self.query
            .push(if self.started { " AND " } else { " WHERE " });
        self.started = true;
        &mut *self.query
    }

    fn eq(&mut self, column: &str, value: &str) {
        self.next().push(column).push(" = ").push_bind(value);
    }

    fn any_of(&mut self, column: &str, values: &[String]) {
        let query = self.next();
        query.push(column).push(" IN (");
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                query.push(", ");
            }
            query.push_bind(value.as_str());
        }
        query.push(")");
    }

    fn is_null(&mut self, column: &str) {
        self.next().push(column).push(" IS NULL");
    }

    fn raw(&mut self, clause: &str) {
        self.next().push(clause);
    }
}

/// Renders every statement the adapter issues against one rule table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    name: String,
    soft_delete: Option<SoftDelete>,
}

impl RuleTable {
    pub fn new(config: &TableConfig) -> Self {
        Self {
            name: config.name.clone(),
            soft_delete: config.soft_delete_column.as_deref().map(SoftDelete::new),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn soft_delete(&self) -> Option<&SoftDelete> {
        self.soft_delete.as_ref()
    }

    fn select_list() -> String {
        let mut list = format!("{}, {}", columns::ID, columns::PTYPE);
        for column in columns::VALUES {
            list.push_str(", ");
            list.push_str(column);
        }
        list
    }

    /// `SELECT` of live rows matching `filter`, ordered by id
    pub fn select(&self, filter: &RuleFilter<'_>) -> RuleQuery {
        let mut query = RuleQuery::new(format!("SELECT {} FROM {}", Self::select_list(), self.name));
        self.push_filter(&mut query, filter);
        query.push(" ORDER BY ").push(columns::ID);
        query
    }

    /// Removal of live rows matching `filter`: a `DELETE`, or a flag
    /// update when soft delete is configured
    pub fn remove(&self, filter: &RuleFilter<'_>) -> RuleQuery {
        let mut query = match &self.soft_delete {
            Some(soft_delete) => RuleQuery::new(format!(
                "UPDATE {} SET {}",
                self.name,
                soft_delete.mark_clause()
            )),
            None => RuleQuery::new(format!("DELETE FROM {}", self.name)),
        };
        self.push_filter(&mut query, filter);
        query
    }

    /// `INSERT` of one rule row
    pub fn insert(&self, rule: &CasbinRule) -> RuleQuery {
        let mut query = RuleQuery::new(format!(
            "INSERT INTO {} ({}, {}) VALUES (",
            self.name,
            columns::PTYPE,
            columns::VALUES.join(", ")
        ));
        query.push_bind(rule.ptype.as_str());
        for value in &rule.values {
            query.push(", ").push_bind(Bind::Text(value.clone()));
        }
        query.push(")");
        query
    }

    /// Overwrite the first `width` value slots of row `id` with `rule`,
    /// nulling slots past the rule's end
    pub fn update_values(&self, id: i64, rule: &[String], width: usize) -> RuleQuery {
        let mut query = RuleQuery::new(format!("UPDATE {} SET ", self.name));
        for (i, column) in columns::VALUES.iter().take(width.min(MAX_FIELDS)).enumerate() {
            if i > 0 {
                query.push(", ");
            }
            query
                .push(column)
                .push(" = ")
                .push_bind(Bind::Text(rule.get(i).cloned()));
        }
        query
            .push(" WHERE ")
            .push(columns::ID)
            .push(" = ")
            .push_bind(Bind::Int(id));
        query
    }

    /// Flag the given rows as deleted; `None` without soft delete
    pub fn mark_deleted(&self, ids: &[i64]) -> Option<RuleQuery> {
        let soft_delete = self.soft_delete.as_ref()?;
        let mut query = RuleQuery::new(format!(
            "UPDATE {} SET {} WHERE {} IN (",
            self.name,
            soft_delete.mark_clause(),
            columns::ID
        ));
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                query.push(", ");
            }
            query.push_bind(Bind::Int(*id));
        }
        query.push(")");
        Some(query)
    }

    fn push_filter(&self, query: &mut RuleQuery, filter: &RuleFilter<'_>) {
        let mut conditions = Conditions::new(query);

        match *filter {
            RuleFilter::All => {}
            RuleFilter::Fields(filter) => {
                if !filter.ptype.is_empty() {
                    conditions.any_of(columns::PTYPE, &filter.ptype);
                }
                for (column, values) in columns::VALUES.iter().zip(filter.fields()) {
                    if !values.is_empty() {
                        conditions.any_of(column, values);
                    }
                }
            }
            RuleFilter::Sections(filter) => {
                let query = conditions.next();
                query.push("(");
                let by_section = [(sections::POLICY, &filter.p), (sections::GROUPING, &filter.g)];
                for (i, (section, values)) in by_section.into_iter().enumerate() {
                    if i > 0 {
                        query.push(" OR ");
                    }
                    query
                        .push("(")
                        .push(columns::PTYPE)
                        .push(" LIKE ")
                        .push_bind(format!("{}%", section).as_str());
                    for (column, value) in columns::VALUES.iter().zip(values.iter()) {
                        if !value.is_empty() {
                            query.push(" AND ").push(column).push(" = ").push_bind(value.as_str());
                        }
                    }
                    query.push(")");
                }
                query.push(")");
            }
            RuleFilter::Exact { ptype, rule } => {
                conditions.eq(columns::PTYPE, ptype);
                for (column, value) in columns::VALUES.iter().zip(rule) {
                    conditions.eq(column, value);
                }
                // the rule ends where its first unset slot begins
                if let Some(end) = columns::VALUES.get(rule.len()) {
                    conditions.is_null(end);
                }
            }
            RuleFilter::Columnwise { ptype, rules } => {
                conditions.eq(columns::PTYPE, ptype);
                let width = rules.iter().map(Vec::len).min().unwrap_or(0);
                for (i, column) in columns::VALUES.iter().take(width).enumerate() {
                    let values: Vec<String> = rules.iter().map(|rule| rule[i].clone()).collect();
                    conditions.any_of(column, &values);
                }
            }
            RuleFilter::Positional {
                ptype,
                field_index,
                field_values,
            } => {
                conditions.eq(columns::PTYPE, ptype);
                for (column, value) in columns::VALUES.iter().skip(field_index).zip(field_values) {
                    if !value.is_empty() {
                        conditions.eq(column, value);
                    }
                }
            }
        }

        if let Some(soft_delete) = &self.soft_delete {
            conditions.raw(&soft_delete.live_clause());
        }
    }
}
