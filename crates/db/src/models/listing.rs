//! Offset paging and field filters shared by the list queries.

use serde::{Deserialize, Serialize};
use sqlx::{Encode, FromRow, QueryBuilder, Sqlite, SqlitePool, Type, sqlite::SqliteRow};
use thiserror::Error;
use ts_rs::TS;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("offset must be >= 0, got {0}")]
    NegativeOffset(i64),
    #[error("page must be >= 1, got {0}")]
    PageBelowOne(i64),
    #[error("page_size must be between 1 and {max}, got {got}")]
    PageSize { got: i64, max: i64 },
}

/// Raw paging parameters of a list request
#[derive(Debug, Clone, Copy, Default, Deserialize, TS)]
pub struct PageQuery {
    pub offset: Option<i64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Validated window into a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: i64,
    pub page_size: i64,
}

impl PageQuery {
    /// Resolves the window. `page` is 1-based and wins over `offset` when
    /// both are given.
    pub fn resolve(self, default_size: i64) -> Result<PageRequest, PageError> {
        let page_size = self.page_size.unwrap_or(default_size);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(PageError::PageSize {
                got: page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        let offset = match (self.page, self.offset) {
            (Some(page), _) if page < 1 => return Err(PageError::PageBelowOne(page)),
            (Some(page), _) => (page - 1).saturating_mul(page_size),
            (None, Some(offset)) if offset < 0 => return Err(PageError::NegativeOffset(offset)),
            (None, offset) => offset.unwrap_or(0),
        };
        Ok(PageRequest { offset, page_size })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Page<T> {
    pub total: i64,
    pub offset: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    fn new(total: i64, request: PageRequest, data: Vec<T>) -> Self {
        Self {
            total,
            offset: request.offset,
            page_size: request.page_size,
            total_pages: (total + request.page_size - 1) / request.page_size,
            data,
        }
    }
}

/// Appends a case-insensitive substring match on `column`. Blank values are
/// ignored.
pub(crate) fn push_contains<'a>(
    qb: &mut QueryBuilder<'a, Sqlite>,
    column: &'static str,
    value: Option<&'a str>,
) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        qb.push(" AND instr(lower(")
            .push(column)
            .push("), lower(")
            .push_bind(value)
            .push(")) > 0");
    }
}

pub(crate) fn push_eq<'a, T>(qb: &mut QueryBuilder<'a, Sqlite>, column: &'static str, value: Option<T>)
where
    T: 'a + Encode<'a, Sqlite> + Type<Sqlite>,
{
    if let Some(value) = value {
        qb.push(" AND ").push(column).push(" = ").push_bind(value);
    }
}

/// Runs `SELECT COUNT(*)` and the windowed `select` over the same
/// `FROM ... WHERE 1 = 1 ...` tail written by `push_from`.
pub(crate) async fn fetch_page<'a, T, F>(
    pool: &SqlitePool,
    select: &'static str,
    push_from: F,
    order_by: &'static str,
    request: PageRequest,
) -> Result<Page<T>, sqlx::Error>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    F: Fn(&mut QueryBuilder<'a, Sqlite>),
{
    let mut count = QueryBuilder::new("SELECT COUNT(*) ");
    push_from(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut rows = QueryBuilder::new(select);
    push_from(&mut rows);
    rows.push(" ORDER BY ")
        .push(order_by)
        .push(" LIMIT ")
        .push_bind(request.page_size)
        .push(" OFFSET ")
        .push_bind(request.offset);
    let data = rows.build_query_as::<T>().fetch_all(pool).await?;

    Ok(Page::new(total, request, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(offset: Option<i64>, page: Option<i64>, page_size: Option<i64>) -> PageQuery {
        PageQuery {
            offset,
            page,
            page_size,
        }
    }

    #[test]
    fn test_resolve_defaults_and_page_numbers() {
        assert_eq!(
            PageQuery::default().resolve(DEFAULT_PAGE_SIZE),
            Ok(PageRequest {
                offset: 0,
                page_size: 10
            })
        );
        assert_eq!(
            query(Some(5), Some(3), Some(20)).resolve(DEFAULT_PAGE_SIZE),
            Ok(PageRequest {
                offset: 40,
                page_size: 20
            })
        );
        assert_eq!(
            query(Some(7), None, None).resolve(50).map(|r| r.offset),
            Ok(7)
        );
    }

    #[test]
    fn test_resolve_rejects_out_of_range() {
        assert_eq!(
            query(Some(-1), None, None).resolve(DEFAULT_PAGE_SIZE),
            Err(PageError::NegativeOffset(-1))
        );
        assert_eq!(
            query(None, Some(0), None).resolve(DEFAULT_PAGE_SIZE),
            Err(PageError::PageBelowOne(0))
        );
        assert!(query(None, None, Some(0)).resolve(DEFAULT_PAGE_SIZE).is_err());
        assert_eq!(
            query(None, None, Some(101)).resolve(DEFAULT_PAGE_SIZE),
            Err(PageError::PageSize { got: 101, max: 100 })
        );
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let request = PageRequest {
            offset: 0,
            page_size: 10,
        };
        assert_eq!(Page::<()>::new(0, request, vec![]).total_pages, 0);
        assert_eq!(Page::<()>::new(10, request, vec![]).total_pages, 1);
        assert_eq!(Page::<()>::new(11, request, vec![]).total_pages, 2);
    }
}
