//! Page images extracted from a document

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use docvault_common::{
    auth::Principal,
    db::models::DocumentImage,
    errors::Result,
};

/// Image metadata and OCR text, without the encoded pixels
#[derive(Debug, Serialize)]
pub struct ImageSummary {
    pub id: Uuid,
    pub document_id: Uuid,
    pub image_id: String,
    pub page_number: i32,
    pub image_format: Option<String>,
    pub text_content: Option<String>,
    pub languages_detected: Vec<String>,
    pub extraction_confidence: Option<f64>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<DocumentImage> for ImageSummary {
    fn from(image: DocumentImage) -> Self {
        Self {
            id: image.id,
            document_id: image.document_id,
            image_id: image.image_id,
            page_number: image.page_number,
            image_format: image.image_format,
            text_content: image.text_content,
            languages_detected: image.languages_detected.map(|l| l.0).unwrap_or_default(),
            extraction_confidence: image.extraction_confidence,
            created_at: image.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageSearchParams {
    #[serde(default)]
    pub query: String,
}

pub async fn list_images(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ImageSummary>>> {
    let images = state.documents.list_images(&principal, id).await?;
    Ok(Json(images.into_iter().map(ImageSummary::from).collect()))
}

pub async fn search_images(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Query(params): Query<ImageSearchParams>,
) -> Result<Json<Vec<ImageSummary>>> {
    let images = state
        .documents
        .search_images(&principal, id, &params.query)
        .await?;
    Ok(Json(images.into_iter().map(ImageSummary::from).collect()))
}

/// Raw image bytes with their content type
pub async fn get_image(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let content = state.documents.get_image(&principal, id, image_id).await?;
    Ok(([(header::CONTENT_TYPE, content.content_type)], content.bytes))
}
