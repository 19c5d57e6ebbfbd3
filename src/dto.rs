//! Response envelope for the report endpoint
//! Serialized once at the end of each request

use serde::{Deserialize, Serialize};

use crate::database::traits::{DataSourceStats, Record};

/// Compiled statements echoed back when the caller asks for debug output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugQueries {
    #[serde(rename = "selectQuery")]
    pub select_query: String,
    #[serde(rename = "countQuery")]
    pub count_query: String,
}

/// Report response envelope
///
/// Successful responses carry `data` (and optionally `page_count` and the
/// debug queries); failures carry only `status` and `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub status: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(flatten)]
    pub debug: Option<DebugQueries>,
}

impl ReportResponse {
    /// Start a successful response around the fetched rows
    pub fn success(data: Vec<Record>) -> Self {
        Self {
            status: 200,
            data: Some(data),
            page_count: None,
            message: None,
            debug: None,
        }
    }

    /// Build a failure envelope
    pub fn failure(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            data: None,
            page_count: None,
            message: Some(message.into()),
            debug: None,
        }
    }

    pub fn with_page_count(mut self, page_count: u64) -> Self {
        self.page_count = Some(page_count);
        self
    }

    pub fn with_debug(mut self, select_query: String, count_query: String) -> Self {
        self.debug = Some(DebugQueries {
            select_query,
            count_query,
        });
        self
    }
}

/// Query string form of the report request
#[derive(Debug, Deserialize)]
pub struct ReportQueryParams {
    /// Filter object as a JSON string
    pub filter: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DataSourceStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_wire_shape() {
        let mut row = Record::new();
        row.insert("userid".to_string(), json!(5));
        row.insert("eventname".to_string(), json!("\\core\\event\\user_loggedin"));

        let response = ReportResponse::success(vec![row])
            .with_page_count(3)
            .with_debug("SELECT 1".to_string(), "SELECT 2".to_string());

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "status": 200,
                "data": [{"userid": 5, "eventname": "\\core\\event\\user_loggedin"}],
                "page_count": 3,
                "selectQuery": "SELECT 1",
                "countQuery": "SELECT 2"
            })
        );
    }

    #[test]
    fn test_failure_envelope_omits_data() {
        let response = ReportResponse::failure(403, "Missing required capability");
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(
            value,
            json!({"status": 403, "message": "Missing required capability"})
        );
    }

    #[test]
    fn test_row_column_order_is_preserved() {
        let mut row = Record::new();
        row.insert("timecreated".to_string(), json!(1500));
        row.insert("action".to_string(), json!("viewed"));
        row.insert("component".to_string(), json!("core"));

        let body = serde_json::to_string(&ReportResponse::success(vec![row])).unwrap();
        assert_eq!(
            body,
            r#"{"status":200,"data":[{"timecreated":1500,"action":"viewed","component":"core"}]}"#
        );
    }
}
