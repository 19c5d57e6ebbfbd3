//! ClickHouse-backed data source
//!
//! Compiled statements return arbitrary column sets, so each row is rendered
//! server-side as one JSONEachRow line and parsed into a `Record`. Column order
//! survives through serde_json's `preserve_order` map.

pub mod traits;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clickhouse::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::compiler::BindValue;
use crate::config::ClickHouseConfig;
use self::traits::{DataSource, DataSourceStats, Record};

#[derive(Debug, Default)]
struct DatabaseMetrics {
    total_queries: AtomicU64,
    successful_queries: AtomicU64,
    failed_queries: AtomicU64,
    last_query_time_ms: AtomicU64,
}

/// `DataSource` over the `clickhouse` HTTP client
#[derive(Clone)]
pub struct ClickHouseDataSource {
    client: Client,
    metrics: Arc<DatabaseMetrics>,
}

impl ClickHouseDataSource {
    /// Build a client from configuration without touching the network
    pub fn new(config: &ClickHouseConfig) -> Self {
        let client = Client::default()
            .with_url(config.url.as_str())
            .with_database(&config.database)
            .with_user(&config.username)
            .with_password(&config.password)
            .with_compression(clickhouse::Compression::Lz4)
            .with_option("output_format_json_quote_64bit_integers", "0");

        Self {
            client,
            metrics: Arc::new(DatabaseMetrics::default()),
        }
    }

    /// Build a client and verify the server answers
    pub async fn connect(config: &ClickHouseConfig) -> Result<Self> {
        let source = Self::new(config);
        source
            .client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .context("Failed to connect to ClickHouse")?;
        Ok(source)
    }

    async fn fetch_rows(&self, sql: &str, params: &[BindValue]) -> Result<Vec<Record>> {
        let wrapped = format!("SELECT formatRow('JSONEachRow', *) FROM ({}) AS page", sql);
        let mut query = self.client.query(&wrapped);
        for param in params {
            query = query.bind(param);
        }

        let lines = query
            .fetch_all::<String>()
            .await
            .context("ClickHouse query failed")?;

        lines
            .iter()
            .map(|line| parse_row(line))
            .collect()
    }

    fn record_outcome(&self, started: Instant, ok: bool) {
        let elapsed = started.elapsed().as_millis() as u64;
        self.metrics.last_query_time_ms.store(elapsed, Ordering::Relaxed);
        if ok {
            self.metrics.successful_queries.fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.failed_queries.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl DataSource for ClickHouseDataSource {
    async fn query(&self, sql: &str, params: &[BindValue]) -> Result<Vec<Record>> {
        self.metrics.total_queries.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        debug!("Executing query with {} parameters", params.len());
        let result = self.fetch_rows(sql, params).await;
        self.record_outcome(started, result.is_ok());

        if let Err(e) = &result {
            error!("Query failed: {:#}", e);
        }
        result
    }

    async fn query_scalar(&self, sql: &str, params: &[BindValue]) -> Result<Value> {
        let rows = self.query(sql, params).await?;
        let first = rows
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Scalar query returned no rows"))?;

        first
            .into_iter()
            .next()
            .map(|(_, value)| value)
            .ok_or_else(|| anyhow!("Scalar query returned no columns"))
    }

    async fn health_check(&self) -> Result<()> {
        self.client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .context("Database health check failed")?;
        Ok(())
    }

    fn stats(&self) -> Option<DataSourceStats> {
        Some(DataSourceStats {
            total_queries: self.metrics.total_queries.load(Ordering::Relaxed),
            successful_queries: self.metrics.successful_queries.load(Ordering::Relaxed),
            failed_queries: self.metrics.failed_queries.load(Ordering::Relaxed),
            last_query_time_ms: self.metrics.last_query_time_ms.load(Ordering::Relaxed),
        })
    }
}

/// Parse one JSONEachRow line into a record
fn parse_row(line: &str) -> Result<Record> {
    match serde_json::from_str::<Value>(line.trim_end())
        .with_context(|| format!("Invalid row from ClickHouse: {}", line))?
    {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("Expected a JSON object row, got {}", other)),
    }
}
