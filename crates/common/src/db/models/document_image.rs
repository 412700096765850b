//! Images extracted from a document, with their OCR text

use super::document::StringList;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document_images")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub document_id: Uuid,

    /// Identifier assigned by the extraction service, e.g. `page3_img1`
    #[sea_orm(column_type = "Text")]
    pub image_id: String,

    pub page_number: i32,

    /// Base64-encoded image bytes
    #[sea_orm(column_type = "Text", nullable)]
    pub image_data: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub image_format: Option<String>,

    /// OCR text
    #[sea_orm(column_type = "Text", nullable)]
    pub text_content: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub languages_detected: Option<StringList>,

    pub extraction_confidence: Option<f64>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn has_text(&self) -> bool {
        self.text_content
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }

    /// MIME type used when serving the decoded image
    pub fn content_type(&self) -> String {
        match self.image_format.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("jpg") | Some("jpeg") => "image/jpeg".to_string(),
            Some("gif") => "image/gif".to_string(),
            Some("webp") => "image/webp".to_string(),
            Some("bmp") => "image/bmp".to_string(),
            Some("tiff") | Some("tif") => "image/tiff".to_string(),
            _ => "image/png".to_string(),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document::Entity",
        from = "Column::DocumentId",
        to = "super::document::Column::Id",
        on_delete = "Cascade"
    )]
    Document,
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
