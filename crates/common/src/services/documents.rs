//! Document lifecycle: upload, fetch, file access, admin changes, images

use crate::access::{ensure_access, require_admin};
use crate::auth::Principal;
use crate::db::models::{Document, DocumentImage, DocumentStatus, NewDocument};
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::services::enrichment::EnrichmentService;
use crate::storage::BlobStore;
use base64::Engine;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Accepted non-image MIME types; any `image/*` type is also accepted
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/rtf",
    "text/plain",
    "text/csv",
];

pub fn is_allowed_mime_type(mime_type: &str) -> bool {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    mime_type.starts_with("image/") || ALLOWED_MIME_TYPES.contains(&mime_type.as_str())
}

/// Final path component of a client-supplied filename
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}

/// A file as received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Decoded image ready to serve
#[derive(Debug, Clone)]
pub struct ImageContent {
    pub image: DocumentImage,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct DocumentService {
    repo: Repository,
    blobs: Arc<dyn BlobStore>,
    enrichment: EnrichmentService,
    max_upload_bytes: usize,
}

impl DocumentService {
    pub fn new(
        repo: Repository,
        blobs: Arc<dyn BlobStore>,
        enrichment: EnrichmentService,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            repo,
            blobs,
            enrichment,
            max_upload_bytes,
        }
    }

    /// Store the file, record it, and start enrichment in the background
    #[instrument(skip(self, principal, upload), fields(subject = %principal.subject, size = upload.data.len()))]
    pub async fn upload(&self, principal: &Principal, upload: Upload) -> Result<Document> {
        if upload.data.is_empty() {
            return Err(AppError::validation("file", "file is empty"));
        }
        if upload.data.len() > self.max_upload_bytes {
            return Err(AppError::PayloadTooLarge {
                size: upload.data.len(),
                limit: self.max_upload_bytes,
            });
        }

        let mime_type = upload.mime_type.trim().to_ascii_lowercase();
        if !is_allowed_mime_type(&mime_type) {
            return Err(AppError::UnsupportedMediaType { mime_type });
        }

        let original_filename = sanitize_filename(&upload.filename)
            .ok_or_else(|| AppError::validation("file", "a filename is required"))?;

        let extension = Path::new(&original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        let stored_name = format!("{}{}", Uuid::new_v4(), extension);

        let file_path = self.blobs.put(&stored_name, &upload.data).await?;

        let new = NewDocument {
            filename: stored_name,
            original_filename,
            file_path: file_path.clone(),
            file_size: upload.data.len() as i64,
            mime_type: mime_type.clone(),
            uploaded_by: Some(principal.subject.clone()),
        };

        let document = match self.repo.create_document(new).await {
            Ok(document) => document,
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&file_path).await {
                    warn!(error = %cleanup, "Failed to remove orphaned upload");
                }
                return Err(e);
            }
        };

        metrics::record_upload(&mime_type, upload.data.len());
        info!(document_id = %document.id, mime_type = %mime_type, "Document uploaded");

        self.enrichment.spawn(document.id);

        Ok(document)
    }

    /// Fetch a document the principal may see. Deleted documents are only
    /// visible to administrators.
    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<Document> {
        let document = self
            .repo
            .find_document_by_id(id)
            .await?
            .filter(|d| principal.is_admin() || d.document_status() != DocumentStatus::Deleted)
            .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })?;

        ensure_access(principal, &document)?;
        Ok(document)
    }

    /// The document together with its stored bytes
    pub async fn read_file(&self, principal: &Principal, id: Uuid) -> Result<(Document, Vec<u8>)> {
        let document = self.get(principal, id).await?;
        let bytes = self.blobs.get(&document.file_path).await?;
        Ok((document, bytes))
    }

    /// Administrators may move a document between active, archived and
    /// quarantined; deletion goes through `delete`
    #[instrument(skip(self, principal), fields(subject = %principal.subject))]
    pub async fn update_status(
        &self,
        principal: &Principal,
        id: Uuid,
        status: DocumentStatus,
    ) -> Result<Document> {
        require_admin(principal)?;

        if status == DocumentStatus::Deleted {
            return Err(AppError::validation("status", "use DELETE to remove a document"));
        }

        let document = self.repo.update_document_status(id, status).await?;
        info!(status = %document.status, "Document status changed");
        Ok(document)
    }

    /// Soft delete: the row stays, marked DELETED
    #[instrument(skip(self, principal), fields(subject = %principal.subject))]
    pub async fn delete(&self, principal: &Principal, id: Uuid) -> Result<()> {
        require_admin(principal)?;

        self.repo
            .update_document_status(id, DocumentStatus::Deleted)
            .await?;
        info!("Document deleted");
        Ok(())
    }

    /// Clear derived fields and run enrichment again
    #[instrument(skip(self, principal), fields(subject = %principal.subject))]
    pub async fn reprocess(&self, principal: &Principal, id: Uuid) -> Result<Document> {
        require_admin(principal)?;

        let document = self.repo.reset_for_reprocess(id).await?;
        self.enrichment.spawn(document.id);

        info!("Document queued for reprocessing");
        Ok(document)
    }

    pub async fn list_images(&self, principal: &Principal, id: Uuid) -> Result<Vec<DocumentImage>> {
        let document = self.get(principal, id).await?;
        self.repo.list_images(document.id).await
    }

    /// Decoded bytes of one image belonging to the document
    pub async fn get_image(
        &self,
        principal: &Principal,
        id: Uuid,
        image_id: Uuid,
    ) -> Result<ImageContent> {
        let document = self.get(principal, id).await?;

        let image = self
            .repo
            .find_image(document.id, image_id)
            .await?
            .ok_or_else(|| AppError::ImageNotFound {
                id: image_id.to_string(),
            })?;

        let data = image.image_data.as_deref().ok_or_else(|| AppError::ImageNotFound {
            id: image_id.to_string(),
        })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| AppError::Internal {
                message: format!("Stored image data is not valid base64: {}", e),
            })?;

        Ok(ImageContent {
            content_type: image.content_type(),
            image,
            bytes,
        })
    }

    /// Images whose OCR text contains `keyword`
    pub async fn search_images(
        &self,
        principal: &Principal,
        id: Uuid,
        keyword: &str,
    ) -> Result<Vec<DocumentImage>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(AppError::validation("query", "query must not be empty"));
        }

        let document = self.get(principal, id).await?;
        self.repo.search_images(document.id, keyword).await
    }
}
