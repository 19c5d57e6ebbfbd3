//! Configuration module for the report service
//! Handles server binding, ClickHouse access, report limits, and security settings

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Main configuration structure for the report service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// ClickHouse database configuration
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,
    /// Report query settings
    #[serde(default)]
    pub report: ReportConfig,
    /// Authentication and capability settings
    #[serde(default)]
    pub security: SecurityConfig,
    /// Logging configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Enable CORS
    pub enable_cors: bool,
}

/// ClickHouse connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// ClickHouse server URL
    pub url: Url,
    /// Database name
    pub database: String,
    /// Username for authentication
    pub username: String,
    /// Password for authentication
    pub password: String,
}

/// Report query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Log events table queried by every report
    pub log_table: String,
    /// Group-membership table used by the optional join
    pub group_members_table: String,
    /// Largest page size a caller may request
    pub max_page_size: u32,
    /// Deadline for the count and select statements of one request
    pub query_timeout_secs: u64,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// JWT secret for token validation
    pub jwt_secret: String,
    /// Token expiration time in seconds (0 issues tokens without expiry)
    pub token_expiration_secs: u64,
    /// Expected token issuer
    pub issuer: String,
    /// Expected token audience
    pub audience: String,
    /// Capability a caller needs to read reports
    pub required_capability: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
    /// Log compiled SQL at info level instead of debug
    pub enable_query_logging: bool,
    /// Log slow queries threshold in milliseconds
    pub slow_query_threshold_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8085,
            request_timeout_secs: 60,
            max_request_size: 1024 * 1024, // 1MB
            enable_cors: true,
        }
    }
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:8123").expect("static URL is valid"),
            database: "moodle".to_string(),
            username: "default".to_string(),
            password: "".to_string(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            log_table: "mdl_logstore_standard_log".to_string(),
            group_members_table: "mdl_groups_members".to_string(),
            max_page_size: 10000,
            query_timeout_secs: 30,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "your-secret-key-change-in-production".to_string(),
            token_expiration_secs: 3600, // 1 hour
            issuer: "reportlog-auth".to_string(),
            audience: "reportlog".to_string(),
            required_capability: "moodle/user:viewdetails".to_string(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "reportlog_search=info,tower_http=debug".to_string(),
            enable_query_logging: false,
            slow_query_threshold_ms: 1000, // 1 second
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("REPORT_SERVER_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("REPORT_SERVER_PORT") {
            config.server.port = port.parse()
                .context("Invalid REPORT_SERVER_PORT")?;
        }

        if let Ok(url) = std::env::var("CLICKHOUSE_URL") {
            config.clickhouse.url = Url::parse(&url)
                .context("Invalid CLICKHOUSE_URL")?;
        }

        if let Ok(database) = std::env::var("CLICKHOUSE_DATABASE") {
            config.clickhouse.database = database;
        }

        if let Ok(username) = std::env::var("CLICKHOUSE_USERNAME") {
            config.clickhouse.username = username;
        }

        if let Ok(password) = std::env::var("CLICKHOUSE_PASSWORD") {
            config.clickhouse.password = password;
        }

        if let Ok(jwt_secret) = std::env::var("JWT_SECRET") {
            config.security.jwt_secret = jwt_secret;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Request timeout cannot be 0"));
        }

        if self.clickhouse.database.is_empty() {
            return Err(anyhow::anyhow!("ClickHouse database name cannot be empty"));
        }

        validate_table_name(&self.report.log_table)
            .context("Invalid report.log_table")?;
        validate_table_name(&self.report.group_members_table)
            .context("Invalid report.group_members_table")?;

        if self.report.max_page_size == 0 {
            return Err(anyhow::anyhow!("Max page size cannot be 0"));
        }

        if self.report.query_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Query timeout cannot be 0"));
        }

        // The query deadline must fire before the server-level timeout
        if self.server.request_timeout_secs <= self.report.query_timeout_secs {
            return Err(anyhow::anyhow!(
                "Request timeout ({}s) must be longer than the query timeout ({}s)",
                self.server.request_timeout_secs,
                self.report.query_timeout_secs
            ));
        }

        if self.security.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!("JWT secret must be at least 32 characters long"));
        }

        if self.security.required_capability.trim().is_empty() {
            return Err(anyhow::anyhow!("Required capability cannot be empty"));
        }

        Ok(())
    }

    /// Get query timeout as Duration
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.report.query_timeout_secs)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

/// Table names are spliced into SQL text, so only plain identifiers pass
fn validate_table_name(table_name: &str) -> Result<()> {
    let valid_pattern = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)?$")
        .context("Failed to compile table name pattern")?;

    if table_name.is_empty() {
        return Err(anyhow::anyhow!("Table name cannot be empty"));
    }

    if table_name.len() > 64 {
        return Err(anyhow::anyhow!("Table name too long (max 64 characters)"));
    }

    if !valid_pattern.is_match(table_name) {
        return Err(anyhow::anyhow!("Table name '{}' contains invalid characters", table_name));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.security.jwt_secret = "this-is-a-long-enough-secret-key-for-testing".to_string();
        config
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        assert_ok!(config.validate());

        config.security.jwt_secret = "short".to_string();
        assert_err!(config.validate());
    }

    #[test]
    fn test_table_name_validation() {
        let mut config = valid_config();
        config.report.log_table = "moodle.mdl_logstore_standard_log".to_string();
        assert!(config.validate().is_ok());

        for bad in ["", "logs; DROP TABLE users", "logs where 1=1", "a.b.c", "1logs"] {
            config.report.log_table = bad.to_string();
            assert!(config.validate().is_err(), "table '{}' should be rejected", bad);
        }
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = valid_config();
        config.report.max_page_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.report.query_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout_outlasts_query_timeout() {
        let config = valid_config();
        assert!(config.request_timeout() > config.query_timeout());

        let mut config = valid_config();
        config.server.request_timeout_secs = config.report.query_timeout_secs;
        assert_err!(config.validate());

        config.server.request_timeout_secs = config.report.query_timeout_secs + 1;
        assert_ok!(config.validate());
    }

    #[tokio::test]
    async fn test_config_loading() {
        let config_content = r#"
[server]
host = "127.0.0.1"
port = 8080
request_timeout_secs = 30
max_request_size = 1048576
enable_cors = false

[clickhouse]
url = "http://localhost:8123"
database = "moodle_test"
username = "default"
password = ""

[report]
log_table = "mdl_logstore_standard_log"
group_members_table = "mdl_groups_members"
max_page_size = 2000
query_timeout_secs = 10

[security]
jwt_secret = "test-secret-key-that-is-long-enough"
token_expiration_secs = 3600
issuer = "reportlog-auth"
audience = "reportlog"
required_capability = "moodle/user:viewdetails"
"#;

        let temp_file = std::env::temp_dir().join(format!("reportlog_config_{}.toml", uuid::Uuid::new_v4()));
        tokio::fs::write(&temp_file, config_content).await.unwrap();

        let config = Config::from_file(temp_file.to_str().unwrap()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.clickhouse.database, "moodle_test");
        assert_eq!(config.report.max_page_size, 2000);
        assert_eq!(config.query_timeout(), Duration::from_secs(10));
        // omitted section falls back to defaults
        assert!(!config.monitoring.enable_query_logging);

        let _ = tokio::fs::remove_file(&temp_file).await;
    }
}
