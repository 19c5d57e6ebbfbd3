//! Query compiler
//! Turns a validated `FilterSpec` into a parameterized select statement and
//! its count sidecar. Identifiers come from the allow-list or configuration;
//! caller values only ever travel as bound parameters.

use serde::Serialize;
use tracing::debug;

use crate::columns::{self, JOIN_COLUMN, TIME_COLUMN};
use crate::config::ReportConfig;
use crate::error_handling::{ReportError, ReportResult};
use crate::filter::{FilterSpec, ScalarValue};
use crate::pager::{self, Page};

/// A value bound to one `?` placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BindValue {
    Scalar(ScalarValue),
    /// Bound as a single array parameter for `IN ?`
    List(Vec<ScalarValue>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateKind {
    DateRange,
    Equals,
    Membership,
}

/// One condition of the WHERE clause, rendered with a trailing space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub kind: PredicateKind,
    pub sql: String,
}

/// Output of the compiler, consumed once by the executor
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub select_sql: String,
    pub count_sql: String,
    pub params: Vec<BindValue>,
    pub predicates: Vec<Predicate>,
    pub limit: u64,
    pub offset: u64,
}

impl CompiledQuery {
    /// WHERE clause body with predicates chained by `AND`
    pub fn predicate_sql(&self) -> String {
        join_predicates(&self.predicates)
    }
}

fn join_predicates(predicates: &[Predicate]) -> String {
    predicates
        .iter()
        .map(|p| p.sql.as_str())
        .collect::<Vec<_>>()
        .join("AND ")
}

/// Compiler bound to the configured tables and page-size cap
pub struct QueryCompiler<'a> {
    config: &'a ReportConfig,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(config: &'a ReportConfig) -> Self {
        Self { config }
    }

    /// Compile a filter into select and count statements
    pub fn compile(&self, filter: &FilterSpec) -> ReportResult<CompiledQuery> {
        let page_size = pager::cap_page_size(filter.page_size, self.config.max_page_size);
        let Page { limit, offset } = pager::paginate(filter.page, page_size)?;

        let select_clause = self.build_select_clause(filter)?;
        let join_clause = self.build_join_clause(filter);
        let (predicates, params) = self.build_predicates(filter)?;

        let where_clause = join_predicates(&predicates);

        let base = format!(
            "SELECT {} FROM {} {}WHERE {}",
            select_clause, self.config.log_table, join_clause, where_clause
        );

        let count_sql = format!("SELECT COUNT(*) FROM ({}) AS counted", base.trim_end());
        let select_sql = format!("{}LIMIT {} OFFSET {}", base, limit, offset);

        debug!(
            "Compiled report query with {} predicates and {} bound parameters",
            predicates.len(),
            params.len()
        );

        Ok(CompiledQuery {
            select_sql,
            count_sql,
            params,
            predicates,
            limit,
            offset,
        })
    }

    fn build_select_clause(&self, filter: &FilterSpec) -> ReportResult<String> {
        if filter.desired_columns.is_empty() {
            return Ok("*".to_string());
        }

        // FilterSpec can be built without parse(), so columns are re-checked here
        for column in &filter.desired_columns {
            self.ensure_column(column, filter.join_with_groups)?;
        }

        let columns: Vec<String> = filter
            .desired_columns
            .iter()
            .map(|column| {
                if filter.join_with_groups {
                    format!("{} AS {}", self.column_ref(column, true), column)
                } else {
                    column.clone()
                }
            })
            .collect();

        Ok(columns.join(", "))
    }

    fn build_join_clause(&self, filter: &FilterSpec) -> String {
        if !filter.join_with_groups {
            return String::new();
        }

        let groups = &self.config.group_members_table;
        format!(
            "JOIN {groups} ON {groups}.{col} = {log}.{col} ",
            groups = groups,
            col = JOIN_COLUMN,
            log = self.config.log_table
        )
    }

    fn build_predicates(&self, filter: &FilterSpec) -> ReportResult<(Vec<Predicate>, Vec<BindValue>)> {
        let mut predicates = Vec::with_capacity(1 + filter.where_equals.len() + filter.where_in.len());
        let mut params = Vec::with_capacity(filter.where_equals.len() + filter.where_in.len());

        let range = filter.date_range;
        predicates.push(Predicate {
            kind: PredicateKind::DateRange,
            sql: format!(
                "{col} > {} AND {col} < {} ",
                range.start,
                range.end,
                col = self.column_ref(TIME_COLUMN, filter.join_with_groups)
            ),
        });

        for (column, value) in &filter.where_equals {
            self.ensure_column(column, filter.join_with_groups)?;
            predicates.push(Predicate {
                kind: PredicateKind::Equals,
                sql: format!("{} = ? ", self.column_ref(column, filter.join_with_groups)),
            });
            params.push(BindValue::Scalar(value.clone()));
        }

        for (column, values) in &filter.where_in {
            self.ensure_column(column, filter.join_with_groups)?;
            if values.is_empty() {
                return Err(ReportError::malformed(format!(
                    "'whereIn.{}' must list at least one value",
                    column
                )));
            }
            predicates.push(Predicate {
                kind: PredicateKind::Membership,
                sql: format!("{} IN ? ", self.column_ref(column, filter.join_with_groups)),
            });
            params.push(BindValue::List(values.clone()));
        }

        Ok((predicates, params))
    }

    /// Columns are table-qualified under the join, where `userid` exists on both sides
    fn column_ref(&self, column: &str, with_groups: bool) -> String {
        if !with_groups {
            column.to_string()
        } else if columns::is_log_column(column) {
            format!("{}.{}", self.config.log_table, column)
        } else {
            format!("{}.{}", self.config.group_members_table, column)
        }
    }

    fn ensure_column(&self, column: &str, with_groups: bool) -> ReportResult<()> {
        if columns::is_allowed(column, with_groups) {
            Ok(())
        } else {
            Err(ReportError::invalid_column(column))
        }
    }
}
