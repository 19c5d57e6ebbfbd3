//! Log report query service
//!
//! An authenticated caller posts a JSON filter object; the service validates
//! it, compiles it into a parameterized ClickHouse statement plus a count
//! sidecar, runs both and returns one page of rows.
//!
//! # Modules
//!
//! - `filter`: filter object parsing and validation
//! - `compiler`: parameterized select/count query construction
//! - `executor`: query execution with cancellation and deadlines
//! - `service`: the per-request pipeline producing the response envelope
//! - `handlers`: axum routes for the report and health endpoints

pub mod auth;
pub mod columns;
pub mod compiler;
pub mod config;
pub mod database;
pub mod dto;
pub mod error_handling;
pub mod executor;
pub mod filter;
pub mod handlers;
pub mod pager;
pub mod security;
pub mod service;

// Re-export the main types for convenience
pub use auth::{AuthContext, JwtAuth};
pub use compiler::{BindValue, CompiledQuery, QueryCompiler};
pub use config::Config;
pub use database::traits::{DataSource, DataSourceStats, Record};
pub use database::ClickHouseDataSource;
pub use dto::ReportResponse;
pub use error_handling::{ReportError, ReportResult};
pub use executor::{ExecutionContext, QueryExecutor};
pub use filter::{FilterSpec, ScalarValue};
pub use handlers::{create_router, AppState};
pub use security::{Claims, SecurityService};
pub use service::ReportService;
