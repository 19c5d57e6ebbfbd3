//! Filter model for report requests
//! Parses the loosely-typed filter object into a validated `FilterSpec`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::columns;
use crate::error_handling::{ErrorContext, ReportError, ReportResult};

/// Page used when the filter does not name one
pub const DEFAULT_PAGE: i64 = 1;

/// Page size used when the filter does not name one
pub const DEFAULT_PAGE_SIZE: i64 = 500;

/// A single scalar value from `where` or `whereIn`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// Convert a JSON value, rejecting null, arrays and objects
    fn from_json(value: Value, path: &str) -> ReportResult<Self> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Self::UInt(u))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(ReportError::malformed(format!("'{}' is not a representable number", path)))
                }
            }
            Value::String(s) => Ok(Self::Text(s)),
            other => Err(ReportError::malformed(format!(
                "'{}' must be a string, number or boolean, got {}",
                path,
                json_type_name(&other)
            ))),
        }
    }
}

/// Event time window in epoch seconds, both bounds exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: i64,
    pub end: i64,
}

/// Validated filter object
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// Columns to select, empty means all
    pub desired_columns: Vec<String>,
    pub date_range: DateRange,
    /// Equality filters in request order
    pub where_equals: Vec<(String, ScalarValue)>,
    /// Membership filters in request order
    pub where_in: Vec<(String, Vec<ScalarValue>)>,
    pub join_with_groups: bool,
    pub page: i64,
    pub page_size: i64,
    pub with_count: bool,
    pub debug: bool,
}

impl FilterSpec {
    /// Filter over a date range with every other field at its default
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            desired_columns: Vec::new(),
            date_range: DateRange { start, end },
            where_equals: Vec::new(),
            where_in: Vec::new(),
            join_with_groups: false,
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            with_count: false,
            debug: false,
        }
    }
}

/// `joinWithGroups` accepts a flag or a list; a non-empty list counts as true
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JoinWithGroups {
    Flag(bool),
    Groups(Vec<Value>),
}

impl JoinWithGroups {
    fn is_truthy(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Groups(groups) => !groups.is_empty(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawDateRange {
    #[serde(default)]
    start: Option<i64>,
    #[serde(default)]
    end: Option<i64>,
}

/// Wire shape of the filter object before validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFilter {
    #[serde(default)]
    desired_columns: Option<Vec<String>>,
    #[serde(default)]
    date_range: Option<RawDateRange>,
    #[serde(default, rename = "where")]
    where_equals: Option<Map<String, Value>>,
    #[serde(default)]
    where_in: Option<Map<String, Value>>,
    #[serde(default)]
    join_with_groups: Option<JoinWithGroups>,
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    page_size: Option<i64>,
    #[serde(default)]
    with_count: Option<bool>,
    #[serde(default)]
    debug: Option<bool>,
}

/// Parse and validate a raw filter payload.
///
/// Page bounds are left to the pager; everything else is checked here.
pub fn parse(raw_payload: &str) -> ReportResult<FilterSpec> {
    let raw: RawFilter = serde_json::from_str(raw_payload)
        .with_payload_context(|| "invalid filter object".to_string())?;

    let range = raw.date_range.unwrap_or_default();
    let (start, end) = match (range.start, range.end) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(ReportError::MissingDateRange),
    };
    if start > end {
        return Err(ReportError::InvalidDateRange { start, end });
    }

    let join_with_groups = raw
        .join_with_groups
        .as_ref()
        .map(JoinWithGroups::is_truthy)
        .unwrap_or(false);

    let desired_columns = raw.desired_columns.unwrap_or_default();
    for column in &desired_columns {
        ensure_column(column, join_with_groups)?;
    }

    let mut where_equals = Vec::new();
    for (column, value) in raw.where_equals.unwrap_or_default() {
        ensure_column(&column, join_with_groups)?;
        let scalar = ScalarValue::from_json(value, &format!("where.{}", column))?;
        where_equals.push((column, scalar));
    }

    let mut where_in = Vec::new();
    for (column, value) in raw.where_in.unwrap_or_default() {
        ensure_column(&column, join_with_groups)?;
        let path = format!("whereIn.{}", column);
        let values = match value {
            Value::Array(values) => values,
            other => {
                return Err(ReportError::malformed(format!(
                    "'{}' must be a list, got {}",
                    path,
                    json_type_name(&other)
                )))
            }
        };
        if values.is_empty() {
            return Err(ReportError::malformed(format!(
                "'{}' must list at least one value",
                path
            )));
        }
        let scalars = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| ScalarValue::from_json(v, &format!("{}[{}]", path, i)))
            .collect::<ReportResult<Vec<_>>>()?;
        where_in.push((column, scalars));
    }

    let spec = FilterSpec {
        desired_columns,
        date_range: DateRange { start, end },
        where_equals,
        where_in,
        join_with_groups,
        page: raw.page.unwrap_or(DEFAULT_PAGE),
        page_size: raw.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        with_count: raw.with_count.unwrap_or(false),
        debug: raw.debug.unwrap_or(false),
    };

    debug!(
        "Parsed filter: {} columns, {} equality and {} membership filters",
        spec.desired_columns.len(),
        spec.where_equals.len(),
        spec.where_in.len()
    );

    Ok(spec)
}

fn ensure_column(column: &str, join_with_groups: bool) -> ReportResult<()> {
    if columns::is_allowed(column, join_with_groups) {
        Ok(())
    } else {
        Err(ReportError::invalid_column(column))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
