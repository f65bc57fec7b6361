//! Query Builder pagination operations

use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use super::builder::QueryBuilder;
use crate::collection::{Collection, Exportable};

impl QueryBuilder {
    /// Add LIMIT clause
    pub fn limit(mut self, count: u64) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Add OFFSET clause
    pub fn offset(mut self, count: u64) -> Self {
        self.offset_value = Some(count);
        self
    }

    /// LIMIT/OFFSET for a 1-based page number
    pub fn for_page(mut self, page: u64, per_page: u64) -> Self {
        match page_offset(page, per_page) {
            Some(offset) => self.limit(per_page).offset(offset),
            None => {
                self.record_error(format!(
                    "Page {} of size {} is out of range",
                    page, per_page
                ));
                self
            }
        }
    }
}

/// Row offset of a 1-based page; `None` past what SQLite can address
pub(crate) fn page_offset(page: u64, per_page: u64) -> Option<u64> {
    page.max(1)
        .saturating_sub(1)
        .checked_mul(per_page)
        .filter(|offset| *offset <= i64::MAX as u64)
}

/// One page of results plus the totals needed to render navigation
#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl PageMeta {
    pub fn new(total: u64, per_page: u64, current_page: u64, items_on_page: usize) -> Self {
        let last_page = if total == 0 { 1 } else { total.div_ceil(per_page) };
        let first = current_page
            .saturating_sub(1)
            .saturating_mul(per_page)
            .saturating_add(1);
        let (from, to) = if items_on_page == 0 {
            (None, None)
        } else {
            (
                Some(first),
                Some(first.saturating_add(items_on_page as u64 - 1)),
            )
        };
        Self {
            total,
            per_page,
            current_page,
            last_page,
            from,
            to,
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }
}

#[derive(Debug, Clone)]
pub struct Paginator<T> {
    pub items: Collection<T>,
    pub meta: PageMeta,
}

impl<T> Paginator<T> {
    pub fn has_more_pages(&self) -> bool {
        self.meta.has_more_pages()
    }
}

impl<T: Exportable> Exportable for Paginator<T> {
    fn export(&self) -> JsonValue {
        json!({
            "data": self.items.export(),
            "total": self.meta.total,
            "per_page": self.meta.per_page,
            "current_page": self.meta.current_page,
            "last_page": self.meta.last_page,
            "from": self.meta.from,
            "to": self.meta.to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;

    #[test]
    fn test_for_page_offsets() {
        let q = QueryBuilder::table("users").for_page(3, 10);
        assert_eq!(q.limit_count, Some(10));
        assert_eq!(q.offset_value, Some(20));

        let first = QueryBuilder::table("users").for_page(0, 10);
        assert_eq!(first.offset_value, Some(0));
    }

    #[test]
    fn test_for_page_out_of_range() {
        let q = QueryBuilder::table("users").for_page(u64::MAX, 10);
        assert!(matches!(q.to_sql(), Err(ModelError::Usage(_))));

        let past_i64 = QueryBuilder::table("users").for_page(2, u64::MAX);
        assert!(past_i64.to_sql().is_err());

        assert_eq!(page_offset(u64::MAX, 2), None);
        assert_eq!(page_offset(3, 10), Some(20));
    }

    #[test]
    fn test_page_meta() {
        let meta = PageMeta::new(25, 10, 3, 5);
        assert_eq!(meta.last_page, 3);
        assert_eq!(meta.from, Some(21));
        assert_eq!(meta.to, Some(25));
        assert!(!meta.has_more_pages());

        let empty = PageMeta::new(0, 10, 1, 0);
        assert_eq!(empty.last_page, 1);
        assert_eq!(empty.from, None);
    }
}
