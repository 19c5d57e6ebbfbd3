//! Report service
//! Drives one request from the raw filter payload to the response envelope:
//! authorize, parse, compile, execute, respond.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::compiler::{CompiledQuery, QueryCompiler};
use crate::config::Config;
use crate::database::traits::DataSource;
use crate::dto::ReportResponse;
use crate::error_handling::{ReportError, ReportResult};
use crate::executor::{ExecutionContext, QueryExecutor};
use crate::filter;
use crate::pager;

/// Request lifecycle stages, used in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStage {
    Received,
    Authorized,
    Parsed,
    Compiled,
    Executed,
    Responded,
    Rejected,
    Failed,
}

impl fmt::Display for ReportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Authorized => "authorized",
            Self::Parsed => "parsed",
            Self::Compiled => "compiled",
            Self::Executed => "executed",
            Self::Responded => "responded",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub struct ReportService {
    config: Arc<Config>,
}

impl ReportService {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Serve a report with the configured query timeout as deadline
    pub async fn get_report(
        &self,
        raw_payload: &str,
        auth: &dyn AuthContext,
        data_source: &dyn DataSource,
    ) -> ReportResponse {
        let context = ExecutionContext::with_timeout(self.config.query_timeout());
        self.get_report_with_context(raw_payload, auth, data_source, &context)
            .await
    }

    /// Serve a report under a caller-supplied cancellation context.
    ///
    /// Never fails: every error becomes a failure envelope.
    pub async fn get_report_with_context(
        &self,
        raw_payload: &str,
        auth: &dyn AuthContext,
        data_source: &dyn DataSource,
        context: &ExecutionContext,
    ) -> ReportResponse {
        let span = info_span!(
            "report",
            request_id = %Uuid::new_v4(),
            user_id = %auth.user_id()
        );

        async move {
            let started = Instant::now();
            debug!(stage = %ReportStage::Received, "Report request received");

            match self.run(raw_payload, auth, data_source, context).await {
                Ok(response) => {
                    debug!(stage = %ReportStage::Responded, "Report response ready");
                    info!(
                        "Report served: {} rows in {}ms",
                        response.data.as_ref().map_or(0, Vec::len),
                        started.elapsed().as_millis()
                    );
                    response
                }
                Err(e) if e.is_rejection() => {
                    warn!(stage = %ReportStage::Rejected, code = e.error_code(), "Report rejected: {}", e);
                    e.to_response()
                }
                Err(e) => {
                    error!(stage = %ReportStage::Failed, code = e.error_code(), "Report failed: {}", e);
                    e.to_response()
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        raw_payload: &str,
        auth: &dyn AuthContext,
        data_source: &dyn DataSource,
        context: &ExecutionContext,
    ) -> ReportResult<ReportResponse> {
        let capability = &self.config.security.required_capability;
        if !auth.has_capability(capability) {
            return Err(ReportError::Unauthorized {
                capability: capability.clone(),
            });
        }
        debug!(stage = %ReportStage::Authorized, "Capability '{}' granted", capability);

        let spec = filter::parse(raw_payload)?;
        debug!(stage = %ReportStage::Parsed, "Filter parsed");

        let query = QueryCompiler::new(&self.config.report).compile(&spec)?;
        debug!(stage = %ReportStage::Compiled, "Query compiled");
        self.log_query(&query);

        let started = Instant::now();
        let execution = QueryExecutor::new(data_source, context)
            .execute(&query, spec.with_count)
            .await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(stage = %ReportStage::Executed, "Query executed in {}ms", elapsed_ms);

        if elapsed_ms > self.config.monitoring.slow_query_threshold_ms {
            warn!(
                "Slow report query: {}ms (threshold {}ms)",
                elapsed_ms, self.config.monitoring.slow_query_threshold_ms
            );
        }

        let mut response = ReportResponse::success(execution.rows);
        if let Some(total_rows) = execution.total_rows {
            response = response.with_page_count(pager::page_count(total_rows, query.limit));
        }
        if spec.debug {
            response = response.with_debug(query.select_sql, query.count_sql);
        }

        Ok(response)
    }

    fn log_query(&self, query: &CompiledQuery) {
        if self.config.monitoring.enable_query_logging {
            info!(
                params = query.params.len(),
                "Report query: {} | count: {}", query.select_sql, query.count_sql
            );
        } else {
            debug!(
                params = query.params.len(),
                "Report query: {} | count: {}", query.select_sql, query.count_sql
            );
        }
    }
}
