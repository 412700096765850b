//! Role-scoped document listings

use crate::access::require_admin;
use crate::auth::Principal;
use crate::db::models::{Document, DocumentStatus};
use crate::db::{DocumentFilter, Page, PageRequest, Repository};
use crate::errors::Result;
use crate::metrics;
use std::time::Instant;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct DocumentQueryService {
    repo: Repository,
}

impl DocumentQueryService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Documents in `status` the principal may see, optionally narrowed by
    /// a search over filename, English summary and tags. Soft-deleted
    /// documents are listed for administrators only.
    #[instrument(skip(self, principal), fields(role = %principal.role))]
    pub async fn list(
        &self,
        principal: &Principal,
        status: DocumentStatus,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Document>> {
        if status == DocumentStatus::Deleted {
            require_admin(principal)?;
        }

        let filter = DocumentFilter::for_principal(principal)
            .with_status(status)
            .with_search(search);

        self.run(filter, page, "role").await
    }

    /// Every document regardless of status; administrators only
    #[instrument(skip(self, principal), fields(role = %principal.role))]
    pub async fn list_all(
        &self,
        principal: &Principal,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Document>> {
        require_admin(principal)?;

        let filter = DocumentFilter::default().with_search(search);
        self.run(filter, page, "all").await
    }

    async fn run(
        &self,
        filter: DocumentFilter,
        page: PageRequest,
        scope: &'static str,
    ) -> Result<Page<Document>> {
        let start = Instant::now();
        let result = self.repo.list_documents(&filter, page).await?;

        metrics::record_listing(start.elapsed().as_secs_f64(), scope, filter.search.is_some());
        debug!(
            total = result.total_items,
            returned = result.items.len(),
            page = page.page,
            "Listed documents"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::test_support::{document, shared, statements, transaction_log};
    use crate::db::DbPool;
    use crate::errors::AppError;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn count(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    #[tokio::test]
    async fn test_list_scopes_by_role_and_search() {
        let invoice = document(&[Role::Finance]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count(1)]])
            .append_query_results([vec![invoice.clone()]]);
        let db = shared(db);
        let service = DocumentQueryService::new(Repository::new(DbPool::from_connection(db.clone())));

        let page = service
            .list(
                &Principal::new("f", Role::Finance),
                DocumentStatus::Active,
                Some("invoice"),
                PageRequest::default(),
            )
            .await
            .unwrap();

        assert_eq!(page.items, vec![invoice]);
        assert_eq!(page.total_pages, 1);
        drop(service);

        let log = transaction_log(db);
        let select = &log[1].statements()[0];
        assert!(select.sql.contains(r#""documents"."allowed_roles" @> $"#), "{}", select.sql);
        assert!(select.sql.contains("ILIKE"));
        assert!(select.sql.contains(r#"ORDER BY "documents"."upload_date" DESC, "documents"."id" ASC"#));
    }

    #[tokio::test]
    async fn test_list_all_requires_admin() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = DocumentQueryService::new(Repository::new(DbPool::from_connection(db)));

        let result = service
            .list_all(&Principal::new("h", Role::Hr), None, PageRequest::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_list_all_has_no_status_filter() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count(0)]])
            .append_query_results([Vec::<Document>::new()]);
        let db = shared(db);
        let service = DocumentQueryService::new(Repository::new(DbPool::from_connection(db.clone())));

        let page = service
            .list_all(&Principal::new("root", Role::Admin), Some("  "), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total_items, 0);
        drop(service);

        let log = transaction_log(db);
        let select = &log[1].statements()[0].sql;
        assert!(!select.contains(r#""status" ="#), "{}", select);
        assert!(!select.contains("@>"), "{}", select);
        assert!(!select.contains("ILIKE"), "{}", select);
    }

    #[tokio::test]
    async fn test_deleted_listing_is_admin_only() {
        let db = shared(MockDatabase::new(DatabaseBackend::Postgres));
        let service = DocumentQueryService::new(Repository::new(DbPool::from_connection(db.clone())));

        let result = service
            .list(
                &Principal::new("h", Role::Hr),
                DocumentStatus::Deleted,
                None,
                PageRequest::default(),
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
        drop(service);

        assert!(statements(&transaction_log(db)).is_empty());
    }

    #[tokio::test]
    async fn test_admin_lists_deleted_documents() {
        let mut removed = document(&[Role::Hr]);
        removed.status = "DELETED".into();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count(1)]])
            .append_query_results([vec![removed.clone()]]);
        let db = shared(db);
        let service = DocumentQueryService::new(Repository::new(DbPool::from_connection(db.clone())));

        let page = service
            .list(
                &Principal::new("root", Role::Admin),
                DocumentStatus::Deleted,
                None,
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.items, vec![removed]);
        drop(service);

        let sql = statements(&transaction_log(db));
        assert!(sql[1].contains(r#""documents"."status" = "#), "{}", sql[1]);
    }
}
