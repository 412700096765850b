//! Document handlers

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use docvault_common::{
    auth::{Principal, Role},
    db::{
        models::{Document, DocumentStatus},
        Page, PageRequest,
    },
    errors::{AppError, Result},
    services::documents::Upload,
};

/// Listing entry; never carries the uploader or the embedding vector
#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub upload_date: DateTime<FixedOffset>,
    pub status: String,
    pub summary_en: Option<String>,
    pub summary_ml: Option<String>,
    pub tags: Vec<String>,
    pub allowed_roles: Vec<Role>,
    pub sensitivity_level: String,
    pub languages_detected: Vec<String>,
    pub images_count: i32,
    pub enrichment_status: String,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.original_filename.clone(),
            mime_type: doc.mime_type.clone(),
            file_size: doc.file_size,
            upload_date: doc.upload_date,
            status: doc.status.clone(),
            summary_en: doc.summary_en.clone(),
            summary_ml: doc.summary_ml.clone(),
            tags: doc.tag_list().to_vec(),
            allowed_roles: doc.roles().to_vec(),
            sensitivity_level: doc.sensitivity_level.clone(),
            languages_detected: doc.languages().to_vec(),
            images_count: doc.images_count,
            enrichment_status: doc.enrichment_status.clone(),
        }
    }
}

/// Full view of one document
#[derive(Debug, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    pub extracted_text: Option<String>,
    pub ai_confidence: Option<f64>,
    pub retention_days: i32,
    pub expiry_date: Option<NaiveDate>,
    pub has_multilingual_content: bool,
    pub embedding_dimension: usize,
    pub enrichment_error: Option<String>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<&Document> for DocumentDetail {
    fn from(doc: &Document) -> Self {
        Self {
            summary: DocumentSummary::from(doc),
            extracted_text: doc.extracted_text.clone(),
            ai_confidence: doc.ai_confidence,
            retention_days: doc.retention_days,
            expiry_date: doc.expiry_date,
            has_multilingual_content: doc.has_multilingual_content,
            embedding_dimension: doc.embedding_dimension(),
            enrichment_error: doc.enrichment_error.clone(),
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminListParams {
    pub search: Option<String>,
    pub page: Option<u64>,
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    #[validate(length(min = 1, max = 32))]
    pub status: String,
}

fn parse_status(value: &str) -> Result<DocumentStatus> {
    DocumentStatus::parse(value).ok_or_else(|| {
        AppError::validation(
            "status",
            "status must be one of ACTIVE, ARCHIVED, QUARANTINED, DELETED",
        )
    })
}

/// Accept a multipart upload with the file in field `file`
pub async fn upload(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentDetail>)> {
    let limit = state.config.storage.max_upload_bytes;
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge {
                size: declared.unwrap_or(limit + 1),
                limit,
            }
        } else {
            AppError::validation("file", e.body_text())
        }
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?;

        upload = Some(Upload {
            filename,
            mime_type,
            data: data.to_vec(),
        });
        break;
    }

    let upload = upload.ok_or_else(|| AppError::MissingField {
        field: "file".to_string(),
    })?;

    let document = state.documents.upload(&principal, upload).await?;

    Ok((StatusCode::CREATED, Json(DocumentDetail::from(&document))))
}

/// Documents in one status visible to the caller's role
pub async fn list_documents(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<DocumentSummary>>> {
    let status = match params.status.as_deref() {
        Some(value) => parse_status(value)?,
        None => DocumentStatus::Active,
    };
    let page = PageRequest::new(params.page, params.size)?;

    let result = state
        .queries
        .list(&principal, status, params.search.as_deref(), page)
        .await?;

    Ok(Json(result.map(|doc| DocumentSummary::from(&doc))))
}

/// Every document in any status; administrators only
pub async fn list_all_documents(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<AdminListParams>,
) -> Result<Json<Page<DocumentSummary>>> {
    let page = PageRequest::new(params.page, params.size)?;

    let result = state
        .queries
        .list_all(&principal, params.search.as_deref(), page)
        .await?;

    Ok(Json(result.map(|doc| DocumentSummary::from(&doc))))
}

pub async fn get_document(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentDetail>> {
    let document = state.documents.get(&principal, id).await?;
    Ok(Json(DocumentDetail::from(&document)))
}

pub async fn download_document(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    file_response(&state, &principal, id, "attachment").await
}

pub async fn view_document(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    file_response(&state, &principal, id, "inline").await
}

async fn file_response(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
    disposition: &str,
) -> Result<Response> {
    let (document, bytes) = state.documents.read_file(principal, id).await?;

    Response::builder()
        .header(header::CONTENT_TYPE, document.mime_type.as_str())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "{}; filename=\"{}\"",
                disposition,
                header_filename(&document.original_filename)
            ),
        )
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal {
            message: format!("Failed to build file response: {}", e),
        })
}

/// ASCII rendition of a filename that is safe inside a quoted header value
pub fn header_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub async fn update_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<DocumentDetail>> {
    request.validate()?;
    let status = parse_status(&request.status)?;

    let document = state.documents.update_status(&principal, id, status).await?;
    Ok(Json(DocumentDetail::from(&document)))
}

pub async fn delete_document(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.documents.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reprocess_document(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<DocumentDetail>)> {
    let document = state.documents.reprocess(&principal, id).await?;
    Ok((StatusCode::ACCEPTED, Json(DocumentDetail::from(&document))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_filename_strips_non_ascii_and_quotes() {
        assert_eq!(header_filename("Invoice Q1.pdf"), "Invoice Q1.pdf");
        assert_eq!(header_filename("résumé.pdf"), "r_sum_.pdf");
        assert_eq!(header_filename("a\"b\\c\r\n.txt"), "a_b_c__.txt");
    }

    #[test]
    fn test_parse_status_rejects_unknown() {
        assert_eq!(parse_status("quarantined").unwrap(), DocumentStatus::Quarantined);
        let err = parse_status("PENDING").unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some(ref f), .. } if f == "status"));
    }
}
