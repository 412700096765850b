//! Listing query composition
//!
//! Builds the filtered, ordered selects behind the document listings:
//! status equality, role containment on `allowed_roles` for non-admin
//! principals, and a case-insensitive substring search.

use crate::auth::Principal;
use crate::db::models::{DocumentColumn, DocumentEntity, DocumentStatus};
use crate::errors::{AppError, Result};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Alias, Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Select};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Escape LIKE wildcards so the term only matches literally
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Trimmed search term, `None` when blank
pub fn normalize_search(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// `term` as an escaped `%term%` pattern
pub fn contains_pattern(term: &str) -> LikeExpr {
    LikeExpr::new(format!("%{}%", escape_like(term))).escape('\\')
}

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, page_size: Option<u64>) -> Result<Self> {
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(AppError::validation(
                "size",
                format!("page size must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }

        let page = page.unwrap_or(0);
        // the row offset must fit a signed 64-bit OFFSET
        let in_range = page
            .checked_mul(page_size)
            .is_some_and(|offset| offset <= i64::MAX as u64);
        if !in_range {
            return Err(AppError::validation("page", "page number is out of range"));
        }

        Ok(Self { page, page_size })
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total_items,
            total_pages: total_items.div_ceil(request.page_size),
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}

/// Predicates of a document listing, combined by conjunction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    /// Exact status; `None` lists every status
    pub status: Option<DocumentStatus>,

    /// Role that must be contained in `allowed_roles`; `None` is unrestricted
    pub role: Option<crate::auth::Role>,

    /// Normalized search term
    pub search: Option<String>,
}

impl DocumentFilter {
    /// Admins see everything, anyone else only what their role is allowed
    pub fn for_principal(principal: &Principal) -> Self {
        Self {
            role: (!principal.is_admin()).then_some(principal.role),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_search(mut self, term: Option<&str>) -> Self {
        self.search = normalize_search(term);
        self
    }

    pub fn condition(&self) -> Condition {
        let mut condition = Condition::all();

        if let Some(status) = self.status {
            condition = condition.add(DocumentColumn::Status.eq(status.as_str()));
        }

        if let Some(role) = self.role {
            condition = condition.add(
                Expr::col((DocumentEntity, DocumentColumn::AllowedRoles))
                    .contains(serde_json::json!([role.as_str()])),
            );
        }

        if let Some(term) = self.search.as_deref() {
            condition = condition.add(search_condition(term));
        }

        condition
    }

    /// Filtered select ordered newest first, ties broken by id
    pub fn select(&self) -> Select<DocumentEntity> {
        DocumentEntity::find()
            .filter(self.condition())
            .order_by_desc(DocumentColumn::UploadDate)
            .order_by_asc(DocumentColumn::Id)
    }
}

fn search_condition(term: &str) -> Condition {
    let tags_text: SimpleExpr = Func::cast_as(
        Expr::col((DocumentEntity, DocumentColumn::Tags)),
        Alias::new("text"),
    )
    .into();

    Condition::any()
        .add(Expr::col((DocumentEntity, DocumentColumn::OriginalFilename)).ilike(contains_pattern(term)))
        .add(Expr::col((DocumentEntity, DocumentColumn::SummaryEn)).ilike(contains_pattern(term)))
        .add(Expr::expr(tags_text).ilike(contains_pattern(term)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use sea_orm::{DbBackend, QueryTrait};

    fn sql(filter: &DocumentFilter) -> String {
        filter.select().build(DbBackend::Postgres).to_string()
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), r"50\%\_off");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("invoice"), "invoice");
    }

    #[test]
    fn test_blank_search_is_no_search() {
        assert_eq!(normalize_search(Some("   ")), None);
        assert_eq!(normalize_search(None), None);
        assert_eq!(normalize_search(Some("  invoice ")).as_deref(), Some("invoice"));

        let principal = Principal::new("asha", Role::Hr);
        let blank = DocumentFilter::for_principal(&principal)
            .with_status(DocumentStatus::Active)
            .with_search(Some(" \t "));
        let none = DocumentFilter::for_principal(&principal).with_status(DocumentStatus::Active);

        assert_eq!(sql(&blank), sql(&none));
        assert!(!sql(&blank).contains("ILIKE"));
    }

    #[test]
    fn test_non_admin_always_gets_role_clause() {
        for role in [Role::Leadership, Role::Hr, Role::Finance, Role::Engineer] {
            let filter = DocumentFilter::for_principal(&Principal::new("u", role))
                .with_status(DocumentStatus::Active)
                .with_search(Some("invoice"));
            let sql = sql(&filter);

            assert!(sql.contains(r#""documents"."allowed_roles" @>"#), "{}", sql);
            assert!(sql.contains(role.as_str()), "{}", sql);
        }
    }

    #[test]
    fn test_admin_has_no_role_clause() {
        let filter = DocumentFilter::for_principal(&Principal::new("root", Role::Admin))
            .with_status(DocumentStatus::Active);
        let sql = sql(&filter);

        assert!(!sql.contains("@>"));
        assert!(sql.contains(r#""documents"."status" = 'ACTIVE'"#));
    }

    #[test]
    fn test_search_covers_filename_summary_and_tags() {
        let filter = DocumentFilter::default().with_search(Some("invoice"));
        let sql = sql(&filter);

        assert!(sql.contains(r#""documents"."original_filename" ILIKE"#));
        assert!(sql.contains(r#""documents"."summary_en" ILIKE"#));
        assert!(sql.contains(r#"CAST("documents"."tags" AS text) ILIKE"#));
        assert!(sql.contains("%invoice%"));
        assert!(sql.contains(" OR "));
    }

    #[test]
    fn test_ordering() {
        let sql = sql(&DocumentFilter::default());
        assert!(sql.ends_with(r#"ORDER BY "documents"."upload_date" DESC, "documents"."id" ASC"#));
    }

    #[test]
    fn test_page_request_bounds() {
        assert_eq!(PageRequest::new(None, None).unwrap(), PageRequest::default());
        assert!(PageRequest::new(Some(0), Some(0)).is_err());
        assert!(PageRequest::new(Some(0), Some(101)).is_err());
        assert_eq!(PageRequest::new(Some(3), Some(100)).unwrap().page, 3);
    }

    #[test]
    fn test_page_offset_must_fit_i64() {
        for page in [u64::MAX / 2, u64::MAX, i64::MAX as u64 / 10 + 1] {
            assert!(matches!(
                PageRequest::new(Some(page), Some(10)),
                Err(AppError::Validation { ref field, .. }) if field.as_deref() == Some("page")
            ));
        }
        assert!(PageRequest::new(Some(i64::MAX as u64 / 10), Some(10)).is_ok());
    }

    #[test]
    fn test_page_totals() {
        let request = PageRequest::new(Some(5), Some(10)).unwrap();
        let page: Page<u32> = Page::new(vec![], request, 15);

        assert_eq!(page.total_pages, 2);
        assert!(page.items.is_empty());
        assert_eq!(page.page, 5);
    }
}
