//! Query executor
//! Runs a compiled query against a `DataSource`, count first, then the page.

use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::compiler::CompiledQuery;
use crate::database::traits::{DataSource, Record};
use crate::error_handling::{ReportError, ReportResult};

/// Caller-supplied cancellation and deadline for one request
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
}

impl ExecutionContext {
    /// Context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Rows of the requested page plus the optional total
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub rows: Vec<Record>,
    pub total_rows: Option<u64>,
}

pub struct QueryExecutor<'a> {
    data_source: &'a dyn DataSource,
    context: &'a ExecutionContext,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(data_source: &'a dyn DataSource, context: &'a ExecutionContext) -> Self {
        Self {
            data_source,
            context,
        }
    }

    /// Run the count statement (when asked) and then the select statement.
    ///
    /// Any failure aborts the request; nothing is retried.
    pub async fn execute(&self, query: &CompiledQuery, run_count: bool) -> ReportResult<Execution> {
        let total_rows = if run_count {
            debug!("Running count query");
            let value = self
                .guarded("count", self.data_source.query_scalar(&query.count_sql, &query.params))
                .await?;
            Some(count_from_value(&value)?)
        } else {
            None
        };

        debug!("Running select query");
        let rows = self
            .guarded("select", self.data_source.query(&query.select_sql, &query.params))
            .await?;

        Ok(Execution { rows, total_rows })
    }

    /// Race a data source call against cancellation and the deadline
    async fn guarded<T, F>(&self, statement: &str, call: F) -> ReportResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        if self.context.cancel.is_cancelled() {
            return Err(ReportError::execution(format!("{} query cancelled", statement)));
        }

        let outcome = match self.context.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.context.cancel.cancelled() => Err(Interrupted::Cancelled),
                    result = tokio::time::timeout_at(deadline, call) => {
                        result.map_err(|_| Interrupted::TimedOut)
                    }
                }
            }
            None => {
                tokio::select! {
                    _ = self.context.cancel.cancelled() => Err(Interrupted::Cancelled),
                    result = call => Ok(result),
                }
            }
        };

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ReportError::execution_with_source(
                format!("{} query failed: {:#}", statement, e),
                e,
            )),
            Err(Interrupted::Cancelled) => {
                Err(ReportError::execution(format!("{} query cancelled", statement)))
            }
            Err(Interrupted::TimedOut) => {
                warn!("{} query exceeded its deadline", statement);
                Err(ReportError::execution(format!("{} query timed out", statement)))
            }
        }
    }
}

enum Interrupted {
    Cancelled,
    TimedOut,
}

/// Counts arrive as numbers, or as strings when 64-bit integers are quoted
fn count_from_value(value: &Value) -> ReportResult<u64> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| ReportError::execution(format!("count query returned a non-integer value: {}", value)))
}
