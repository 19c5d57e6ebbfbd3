//! Column allow-list for report queries
//!
//! Only these identifiers may appear in a compiled statement. Column names
//! coming from the filter object are checked here before the compiler sees
//! them, so no caller-supplied identifier reaches SQL text unvalidated.

use phf::phf_set;

/// Timestamp column used by the date-range predicate
pub const TIME_COLUMN: &str = "timecreated";

/// Column shared by the log table and the group-membership table
pub const JOIN_COLUMN: &str = "userid";

/// Columns of the standard log store table
static LOG_COLUMNS: phf::Set<&'static str> = phf_set! {
    "id",
    "eventname",
    "component",
    "action",
    "target",
    "objecttable",
    "objectid",
    "crud",
    "edulevel",
    "contextid",
    "contextlevel",
    "contextinstanceid",
    "userid",
    "courseid",
    "relateduserid",
    "anonymous",
    "other",
    "timecreated",
    "origin",
    "ip",
    "realuserid",
};

/// Columns contributed by the group-membership join
static GROUP_MEMBER_COLUMNS: phf::Set<&'static str> = phf_set! {
    "groupid",
    "timeadded",
};

/// True for columns of the log table itself
pub fn is_log_column(column: &str) -> bool {
    LOG_COLUMNS.contains(column)
}

/// Check a column name against the allow-list.
///
/// Group-membership columns only resolve when the group join is active.
pub fn is_allowed(column: &str, with_groups: bool) -> bool {
    is_log_column(column) || (with_groups && GROUP_MEMBER_COLUMNS.contains(column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_columns_allowed() {
        for column in ["id", "userid", "courseid", "timecreated", "eventname", "ip"] {
            assert!(is_allowed(column, false), "Column '{}' should be allowed", column);
        }
    }

    #[test]
    fn test_log_column_membership() {
        assert!(is_log_column("userid"));
        assert!(!is_log_column("groupid"));
    }

    #[test]
    fn test_group_columns_require_join() {
        assert!(!is_allowed("groupid", false));
        assert!(is_allowed("groupid", true));
        assert!(is_allowed("timeadded", true));
    }

    #[test]
    fn test_injection_attempts_rejected() {
        let attempts = [
            "userid; DROP TABLE mdl_logstore_standard_log; --",
            "userid = 1 OR 1=1",
            "USERID",
            "",
            "*",
            "mdl_user.password",
        ];

        for column in attempts {
            assert!(!is_allowed(column, true), "Column '{}' should be rejected", column);
        }
    }
}
