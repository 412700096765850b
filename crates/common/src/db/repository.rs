//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::auth::Role;
use crate::db::models::*;
use crate::db::query::{contains_pattern, DocumentFilter, Page, PageRequest};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

/// Derived fields written by a successful enrichment pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentUpdate {
    pub extracted_text: Option<String>,
    pub summary_en: Option<String>,
    pub summary_ml: Option<String>,
    pub tags: Vec<String>,
    pub allowed_roles: Vec<Role>,
    pub ai_confidence: f64,
    pub status: Option<DocumentStatus>,
    pub sensitivity_level: Option<SensitivityLevel>,
    pub retention_days: Option<i32>,
    pub expiry_date: Option<NaiveDate>,
    pub embeddings: Option<Vec<f32>>,
    pub languages_detected: Vec<String>,
    pub has_multilingual_content: bool,
}

/// Image row produced by enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocumentImage {
    pub image_id: String,
    pub page_number: i32,
    pub image_data: Option<String>,
    pub image_format: Option<String>,
    pub text_content: Option<String>,
    pub languages_detected: Vec<String>,
    pub extraction_confidence: Option<f64>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Insert a freshly uploaded document. Derived fields start empty and
    /// enrichment starts pending.
    pub async fn create_document(&self, new: NewDocument) -> Result<Document> {
        new.validate()?;

        let now = Utc::now();
        let expiry = now.date_naive() + chrono::Duration::days(DEFAULT_RETENTION_DAYS as i64);

        let document = DocumentActiveModel {
            id: Set(Uuid::now_v7()),
            filename: Set(new.filename),
            original_filename: Set(new.original_filename),
            file_path: Set(new.file_path),
            file_size: Set(new.file_size),
            mime_type: Set(new.mime_type),
            uploaded_by: Set(new.uploaded_by),
            upload_date: Set(now.into()),
            summary_en: Set(None),
            summary_ml: Set(None),
            extracted_text: Set(None),
            tags: Set(None),
            allowed_roles: Set(Some(RoleList::default())),
            ai_confidence: Set(None),
            sensitivity_level: Set(SensitivityLevel::Medium.as_str().to_string()),
            retention_days: Set(DEFAULT_RETENTION_DAYS),
            expiry_date: Set(Some(expiry)),
            status: Set(String::from(DocumentStatus::Active)),
            embeddings: Set(None),
            languages_detected: Set(None),
            images_count: Set(0),
            has_multilingual_content: Set(false),
            enrichment_status: Set(EnrichmentStatus::Pending.as_str().to_string()),
            enrichment_error: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        document.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find document by ID
    pub async fn find_document_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        DocumentEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List documents matching `filter`, one page at a time
    pub async fn list_documents(
        &self,
        filter: &DocumentFilter,
        request: PageRequest,
    ) -> Result<Page<Document>> {
        let paginator = filter
            .select()
            .paginate(self.read_conn(), request.page_size);

        let total = paginator.num_items().await?;
        let documents = paginator.fetch_page(request.page).await?;

        Ok(Page::new(documents, request, total))
    }

    /// Update document status
    pub async fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
    ) -> Result<Document> {
        let mut document: DocumentActiveModel = self.find_for_update(id).await?.into();

        document.status = Set(String::from(status));
        document.updated_at = Set(Utc::now().into());

        document.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Write an enrichment result and replace the document's images, atomically
    pub async fn apply_enrichment(
        &self,
        id: Uuid,
        update: EnrichmentUpdate,
        images: Vec<NewDocumentImage>,
    ) -> Result<Document> {
        let txn = self.write_conn().begin().await?;

        let existing = DocumentEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })?;

        let expiry = update.expiry_date.or_else(|| {
            let days = update.retention_days.unwrap_or(existing.retention_days);
            Some(existing.upload_date.date_naive() + chrono::Duration::days(days as i64))
        });

        // retired documents keep their status whatever the collaborator says
        let retired = existing.is_retired();

        let mut document: DocumentActiveModel = existing.into();
        document.extracted_text = Set(update.extracted_text);
        document.summary_en = Set(update.summary_en);
        document.summary_ml = Set(update.summary_ml);
        document.tags = Set(Some(StringList(update.tags)));
        document.allowed_roles = Set(Some(RoleList(update.allowed_roles)));
        document.ai_confidence = Set(Some(update.ai_confidence));
        if let Some(status) = update.status.filter(|_| !retired) {
            document.status = Set(String::from(status));
        }
        if let Some(level) = update.sensitivity_level {
            document.sensitivity_level = Set(level.as_str().to_string());
        }
        if let Some(days) = update.retention_days {
            document.retention_days = Set(days);
        }
        document.expiry_date = Set(expiry);
        document.embeddings = Set(update.embeddings.map(Embedding));
        document.languages_detected = Set(Some(StringList(update.languages_detected)));
        document.has_multilingual_content = Set(update.has_multilingual_content);
        document.images_count = Set(images.len() as i32);
        document.enrichment_status = Set(EnrichmentStatus::Completed.as_str().to_string());
        document.enrichment_error = Set(None);
        document.updated_at = Set(Utc::now().into());

        let document = document.update(&txn).await?;

        DocumentImageEntity::delete_many()
            .filter(DocumentImageColumn::DocumentId.eq(id))
            .exec(&txn)
            .await?;

        if !images.is_empty() {
            let now = Utc::now();
            let rows = images.into_iter().map(|image| DocumentImageActiveModel {
                id: Set(Uuid::now_v7()),
                document_id: Set(id),
                image_id: Set(image.image_id),
                page_number: Set(image.page_number),
                image_data: Set(image.image_data),
                image_format: Set(image.image_format),
                text_content: Set(image.text_content),
                languages_detected: Set(Some(StringList(image.languages_detected))),
                extraction_confidence: Set(image.extraction_confidence),
                created_at: Set(now.into()),
            });

            DocumentImageEntity::insert_many(rows)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;

        Ok(document)
    }

    /// Record an enrichment failure without touching any derived field
    pub async fn mark_enrichment_failed(&self, id: Uuid, error: &str) -> Result<Document> {
        let mut document: DocumentActiveModel = self.find_for_update(id).await?.into();

        document.enrichment_status = Set(EnrichmentStatus::Failed.as_str().to_string());
        document.enrichment_error = Set(Some(error.to_string()));
        document.updated_at = Set(Utc::now().into());

        document.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Clear derived fields and images ahead of a fresh enrichment pass
    pub async fn reset_for_reprocess(&self, id: Uuid) -> Result<Document> {
        let txn = self.write_conn().begin().await?;

        let mut document: DocumentActiveModel = DocumentEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })?
            .into();

        document.summary_en = Set(None);
        document.summary_ml = Set(None);
        document.tags = Set(None);
        document.allowed_roles = Set(Some(RoleList::default()));
        document.ai_confidence = Set(None);
        document.images_count = Set(0);
        document.enrichment_status = Set(EnrichmentStatus::Pending.as_str().to_string());
        document.enrichment_error = Set(None);
        document.updated_at = Set(Utc::now().into());

        let document = document.update(&txn).await?;

        DocumentImageEntity::delete_many()
            .filter(DocumentImageColumn::DocumentId.eq(id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        Ok(document)
    }

    async fn find_for_update(&self, id: Uuid) -> Result<Document> {
        DocumentEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })
    }

    // ========================================================================
    // Image Operations
    // ========================================================================

    /// Images of a document in page order
    pub async fn list_images(&self, document_id: Uuid) -> Result<Vec<DocumentImage>> {
        DocumentImageEntity::find()
            .filter(DocumentImageColumn::DocumentId.eq(document_id))
            .order_by_asc(DocumentImageColumn::PageNumber)
            .order_by_asc(DocumentImageColumn::ImageId)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Image by ID, only if it belongs to `document_id`
    pub async fn find_image(&self, document_id: Uuid, id: Uuid) -> Result<Option<DocumentImage>> {
        DocumentImageEntity::find_by_id(id)
            .filter(DocumentImageColumn::DocumentId.eq(document_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Images whose OCR text contains `keyword`, case-insensitively
    pub async fn search_images(
        &self,
        document_id: Uuid,
        keyword: &str,
    ) -> Result<Vec<DocumentImage>> {
        DocumentImageEntity::find()
            .filter(DocumentImageColumn::DocumentId.eq(document_id))
            .filter(
                Expr::col((DocumentImageEntity, DocumentImageColumn::TextContent))
                    .ilike(contains_pattern(keyword)),
            )
            .order_by_asc(DocumentImageColumn::PageNumber)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }
}
