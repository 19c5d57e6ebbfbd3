//! Offset pagination helpers

use tracing::warn;

use crate::error_handling::{ReportError, ReportResult};

/// Limit/offset pair for one page of results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

/// Translate a 1-based page number and page size into limit/offset
pub fn paginate(page: i64, page_size: i64) -> ReportResult<Page> {
    if page < 1 {
        return Err(ReportError::invalid_page(format!("page must be >= 1, got {}", page)));
    }
    if page_size < 1 {
        return Err(ReportError::invalid_page(format!(
            "pageSize must be >= 1, got {}",
            page_size
        )));
    }

    let limit = page_size as u64;
    let offset = (page as u64 - 1)
        .checked_mul(limit)
        .ok_or_else(|| ReportError::invalid_page(format!("page {} is out of range", page)))?;

    Ok(Page { limit, offset })
}

/// Number of pages needed to hold `total_rows`
pub fn page_count(total_rows: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_rows.div_ceil(page_size)
}

/// Clamp a requested page size to the configured maximum
pub fn cap_page_size(page_size: i64, max_page_size: u32) -> i64 {
    let max = i64::from(max_page_size);
    if page_size > max {
        warn!("Requested page size {} exceeds maximum {}, capping", page_size, max);
        max
    } else {
        page_size
    }
}
