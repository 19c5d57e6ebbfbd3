//! Report service integration tests
//!
//! Drives `ReportService` end to end against a spy data source.

use async_trait::async_trait;
use reportlog_search::compiler::BindValue;
use reportlog_search::error_handling::MISSING_DATE_RANGE_MESSAGE;
use reportlog_search::executor::ExecutionContext;
use reportlog_search::{AuthContext, Config, DataSource, Record, ReportService, ScalarValue};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const CAPABILITY: &str = "moodle/user:viewdetails";

struct TestCaller {
    granted: bool,
}

impl AuthContext for TestCaller {
    fn user_id(&self) -> &str {
        "5"
    }

    fn has_capability(&self, capability: &str) -> bool {
        self.granted && capability == CAPABILITY
    }
}

/// Records every call and answers with canned rows
#[derive(Default)]
struct SpyDataSource {
    calls: AtomicUsize,
    statements: Mutex<Vec<(String, Vec<BindValue>)>>,
    total_rows: u64,
    fail_with: Option<&'static str>,
}

impl SpyDataSource {
    fn with_total(total_rows: u64) -> Self {
        Self {
            total_rows,
            ..Default::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, sql: &str, params: &[BindValue]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
    }
}

#[async_trait]
impl DataSource for SpyDataSource {
    async fn query(&self, sql: &str, params: &[BindValue]) -> anyhow::Result<Vec<Record>> {
        self.record(sql, params);
        if let Some(message) = self.fail_with {
            anyhow::bail!(message);
        }

        let rows = (0..2)
            .map(|i| {
                let mut row = Record::new();
                row.insert("id".to_string(), json!(100 + i));
                row.insert("userid".to_string(), json!(5));
                row.insert("timecreated".to_string(), json!(1500 + i));
                row
            })
            .collect();
        Ok(rows)
    }

    async fn query_scalar(&self, sql: &str, params: &[BindValue]) -> anyhow::Result<Value> {
        self.record(sql, params);
        if let Some(message) = self.fail_with {
            anyhow::bail!(message);
        }
        Ok(json!(self.total_rows))
    }
}

fn service() -> ReportService {
    let mut config = Config::default();
    config.security.jwt_secret = "integration-test-secret-that-is-long-enough".to_string();
    ReportService::new(Arc::new(config))
}

const GRANTED: TestCaller = TestCaller { granted: true };
const DENIED: TestCaller = TestCaller { granted: false };

#[tokio::test]
async fn test_end_to_end_example() {
    let spy = SpyDataSource::with_total(25);
    let payload = r#"{"dateRange":{"start":1000,"end":2000},"where":{"userid":5},"withCount":true,"pageSize":10,"page":2}"#;

    let response = service().get_report(payload, &GRANTED, &spy).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.page_count, Some(3));
    assert_eq!(response.data.as_ref().map(Vec::len), Some(2));
    assert!(response.debug.is_none());

    let statements = spy.statements.lock().unwrap();
    assert_eq!(statements.len(), 2);

    let (count_sql, count_params) = &statements[0];
    assert!(count_sql.starts_with("SELECT COUNT(*) FROM ("));
    assert_eq!(count_params, &vec![BindValue::Scalar(ScalarValue::Int(5))]);

    let (select_sql, select_params) = &statements[1];
    assert!(select_sql.contains("WHERE timecreated > 1000 AND timecreated < 2000 AND userid = ? LIMIT 10 OFFSET 10"));
    assert_eq!(select_params, &vec![BindValue::Scalar(ScalarValue::Int(5))]);
}

#[tokio::test]
async fn test_denied_caller_never_reaches_data_source() {
    let spy = SpyDataSource::with_total(10);

    for payload in [
        r#"{"dateRange":{"start":1000,"end":2000}}"#,
        r#"{}"#,
        "not json at all",
    ] {
        let response = service().get_report(payload, &DENIED, &spy).await;
        assert_eq!(response.status, 403, "payload {}", payload);
        assert!(response.data.is_none());
    }

    assert_eq!(spy.call_count(), 0);
}

#[tokio::test]
async fn test_missing_date_range_message() {
    let spy = SpyDataSource::default();

    let response = service()
        .get_report(r#"{"where":{"userid":5}}"#, &GRANTED, &spy)
        .await;

    assert_eq!(response.status, 422);
    assert_eq!(response.message.as_deref(), Some(MISSING_DATE_RANGE_MESSAGE));
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({
            "status": 422,
            "message": "'dateRange.start' and 'dateRange.end' are required."
        })
    );
    assert_eq!(spy.call_count(), 0);
}

#[tokio::test]
async fn test_validation_failures_are_422() {
    let spy = SpyDataSource::default();

    for payload in [
        r#"{"dateRange":{"start":2000,"end":1000}}"#,
        r#"{"dateRange":{"start":1,"end":2},"desiredColumns":["password"]}"#,
        r#"{"dateRange":{"start":1,"end":2},"page":0}"#,
        r#"{"dateRange":{"start":1,"end":2},"pageSize":-10}"#,
        r#"{"dateRange":{"start":1,"end":2},"whereIn":{"userid":[]}}"#,
        "{",
    ] {
        let response = service().get_report(payload, &GRANTED, &spy).await;
        assert_eq!(response.status, 422, "payload {}", payload);
        assert!(response.message.is_some());
    }

    assert_eq!(spy.call_count(), 0);
}

#[tokio::test]
async fn test_debug_echoes_compiled_queries() {
    let spy = SpyDataSource::with_total(3);
    let payload = r#"{"dateRange":{"start":1,"end":9},"desiredColumns":["id","userid"],"debug":true}"#;

    let response = service().get_report(payload, &GRANTED, &spy).await;
    assert_eq!(response.status, 200);
    // no count requested, so only the select ran
    assert_eq!(spy.call_count(), 1);
    assert!(response.page_count.is_none());

    let body = serde_json::to_value(&response).unwrap();
    assert_eq!(
        body["selectQuery"],
        json!("SELECT id, userid FROM mdl_logstore_standard_log WHERE timecreated > 1 AND timecreated < 9 LIMIT 500 OFFSET 0")
    );
    assert_eq!(
        body["countQuery"],
        json!("SELECT COUNT(*) FROM (SELECT id, userid FROM mdl_logstore_standard_log WHERE timecreated > 1 AND timecreated < 9) AS counted")
    );
    assert_eq!(body["data"][0], json!({"id": 100, "userid": 5, "timecreated": 1500}));
}

#[tokio::test]
async fn test_execution_failure_is_500_without_data() {
    let spy = SpyDataSource {
        fail_with: Some("Code: 60. Table does not exist"),
        ..Default::default()
    };

    let response = service()
        .get_report(r#"{"dateRange":{"start":1,"end":2},"withCount":true}"#, &GRANTED, &spy)
        .await;

    assert_eq!(response.status, 500);
    assert!(response.data.is_none());
    assert!(response.page_count.is_none());
    let message = response.message.unwrap_or_default();
    assert!(message.contains("Table does not exist"), "message was {}", message);
    // the count failed, so the select never ran
    assert_eq!(spy.call_count(), 1);
}

#[tokio::test]
async fn test_cancelled_context_fails_request() {
    let spy = SpyDataSource::with_total(1);
    let context = ExecutionContext::default();
    context.cancel.cancel();

    let response = service()
        .get_report_with_context(r#"{"dateRange":{"start":1,"end":2}}"#, &GRANTED, &spy, &context)
        .await;

    assert_eq!(response.status, 500);
    assert_eq!(spy.call_count(), 0);
}

#[tokio::test]
async fn test_membership_filter_binds_list() {
    let spy = SpyDataSource::with_total(0);
    let payload = r#"{"dateRange":{"start":1,"end":2},"whereIn":{"courseid":[2,3]},"joinWithGroups":[4],"withCount":true}"#;

    let response = service().get_report(payload, &GRANTED, &spy).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.page_count, Some(0));

    let statements = spy.statements.lock().unwrap();
    let (select_sql, params) = &statements[1];
    assert!(select_sql.contains("JOIN mdl_groups_members ON mdl_groups_members.userid = mdl_logstore_standard_log.userid "));
    assert!(select_sql.contains("AND mdl_logstore_standard_log.courseid IN ? "));
    assert_eq!(
        params,
        &vec![BindValue::List(vec![ScalarValue::Int(2), ScalarValue::Int(3)])]
    );
}
