//! Display helpers shared by the list pages.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use oja_core::catalog::Page;

/// Rows per list page.
pub const PER_PAGE: u32 = 20;

/// Previous/next links for a paged list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    pub page: u32,
    pub total_pages: u64,
    pub total: u64,
    pub previous: Option<String>,
    pub next: Option<String>,
}

impl Pager {
    /// Links for `page`, keeping the other query parameters in `base_query`
    /// (already encoded, without a leading `?`).
    #[must_use]
    pub fn new<T>(path: &str, base_query: &str, page: &Page<T>) -> Self {
        let link = |n: u32| {
            if base_query.is_empty() {
                format!("{path}?page={n}")
            } else {
                format!("{path}?{base_query}&page={n}")
            }
        };
        Self {
            page: page.page,
            total_pages: page.total_pages(),
            total: page.total,
            previous: page.has_previous().then(|| link(page.page - 1)),
            next: page.has_next().then(|| link(page.page + 1)),
        }
    }
}

/// A form value with surrounding whitespace removed, or `None` when blank.
#[must_use]
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a `YYYY-MM-DD` date at the start of that day, UTC.
#[must_use]
pub fn start_of_day(value: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Parse a `YYYY-MM-DD` date at the last second of that day, UTC.
#[must_use]
pub fn end_of_day(value: &str) -> Option<DateTime<Utc>> {
    let end = NaiveTime::from_hms_opt(23, 59, 59)?;
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(end).and_utc())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn page(page: u32, total: u64) -> Page<()> {
        Page {
            items: Vec::new(),
            total,
            page,
            per_page: PER_PAGE,
        }
    }

    #[test]
    fn test_pager_keeps_filters() {
        let pager = Pager::new("/orders", "status=pending", &page(2, 45));
        assert_eq!(pager.total_pages, 3);
        assert_eq!(pager.previous.as_deref(), Some("/orders?status=pending&page=1"));
        assert_eq!(pager.next.as_deref(), Some("/orders?status=pending&page=3"));
    }

    #[test]
    fn test_pager_single_page() {
        let pager = Pager::new("/products", "", &page(1, 3));
        assert_eq!(pager.previous, None);
        assert_eq!(pager.next, None);
    }

    #[test]
    fn test_day_bounds() {
        assert_eq!(
            start_of_day("2026-03-01").unwrap().to_rfc3339(),
            "2026-03-01T00:00:00+00:00"
        );
        assert_eq!(
            end_of_day(" 2026-03-01 ").unwrap().to_rfc3339(),
            "2026-03-01T23:59:59+00:00"
        );
        assert!(start_of_day("01/03/2026").is_none());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  x ")), Some("x"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
