//! Data source trait abstraction for dependency injection and testing

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compiler::BindValue;

/// One result row, keyed by column name in select order
pub type Record = Map<String, Value>;

/// Point-in-time query counters reported by `/health`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceStats {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    pub last_query_time_ms: u64,
}

/// Narrow read-only interface the executor runs compiled statements against
///
/// Implementations bind `params` to the `?` placeholders of `sql` in order.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Run a statement and return every row
    async fn query(&self, sql: &str, params: &[BindValue]) -> Result<Vec<Record>>;

    /// Run a statement expected to yield a single value
    async fn query_scalar(&self, sql: &str, params: &[BindValue]) -> Result<Value>;

    /// Perform a health check on the underlying connection
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    /// Query counters, when the implementation keeps any
    fn stats(&self) -> Option<DataSourceStats> {
        None
    }
}
