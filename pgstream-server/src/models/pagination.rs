//! Pagination types for the product listing

use serde::{Deserialize, Serialize};

/// Page used when `page` is missing or unparseable
pub const DEFAULT_PAGE: i64 = 1;

/// Rows per page used when `limit` is missing or unparseable
pub const DEFAULT_LIMIT: i64 = 100;

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page number (1-indexed)
    pub page: i64,
    /// Rows per page
    pub limit: i64,
}

impl Pagination {
    /// Create pagination, replacing non-positive values with the defaults.
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: if page >= 1 { page } else { DEFAULT_PAGE },
            limit: if limit >= 1 { limit } else { DEFAULT_LIMIT },
        }
    }

    /// SQL OFFSET value: `(page - 1) * limit`.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// SQL LIMIT value.
    pub fn limit(&self) -> i64 {
        self.limit
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One page of rows plus the total row count
#[derive(Debug, Clone)]
pub struct Paginated<T> {
    /// Rows for the current page
    pub items: Vec<T>,
    /// Total count across all pages
    pub total: i64,
    /// Pagination the page was fetched with
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    /// `ceil(total / limit)`; an empty table has zero pages.
    pub fn total_pages(&self) -> i64 {
        if self.total <= 0 {
            return 0;
        }
        let limit = self.pagination.limit;
        self.total / limit + i64::from(self.total % limit != 0)
    }

    /// Metadata block sent alongside the rows.
    pub fn page_info(&self) -> PageInfo {
        PageInfo {
            page: self.pagination.page,
            limit: self.pagination.limit,
            total_pages: self.total_pages(),
            total_count: self.total,
        }
    }
}

/// Pagination metadata as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub total_count: i64,
}

/// Query parameters for pagination.
///
/// Kept as raw strings so that junk input falls back to defaults instead of
/// being rejected by the extractor.
#[derive(Debug, Clone, Default)]
pub struct PaginationParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PaginationParams {
    /// Pick `page` and `limit` out of decoded query pairs.
    ///
    /// A repeated key keeps its first value; unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "page" => &mut params.page,
                "limit" => &mut params.limit,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        params
    }
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        let page = params.page.as_deref().and_then(parse_leading_int);
        let limit = params.limit.as_deref().and_then(parse_leading_int);
        Self::new(page.unwrap_or(DEFAULT_PAGE), limit.unwrap_or(DEFAULT_LIMIT))
    }
}

/// Parse the leading decimal integer of `s`, ignoring anything after it.
///
/// `"12"` and `" 12abc"` give 12, `"1.9"` gives 1, `"abc"` and `""` give
/// `None`. Values that overflow `i64` are treated as unparseable.
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }

    let value: i64 = rest[..digits_end].parse().ok()?;
    Some(if negative { -value } else { value })
}
