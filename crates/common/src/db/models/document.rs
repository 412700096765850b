//! Document entity

use crate::auth::Role;
use crate::errors::AppError;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Default retention, roughly seven years
pub const DEFAULT_RETENTION_DAYS: i32 = 2555;

/// Lifecycle status of a document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Active,
    Archived,
    Quarantined,
    Deleted,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Active => "ACTIVE",
            DocumentStatus::Archived => "ARCHIVED",
            DocumentStatus::Quarantined => "QUARANTINED",
            DocumentStatus::Deleted => "DELETED",
        }
    }

    /// Strict, case-insensitive parse of client input
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(DocumentStatus::Active),
            "ARCHIVED" => Some(DocumentStatus::Archived),
            "QUARANTINED" => Some(DocumentStatus::Quarantined),
            "DELETED" => Some(DocumentStatus::Deleted),
            _ => None,
        }
    }
}

impl From<&str> for DocumentStatus {
    fn from(s: &str) -> Self {
        match s {
            "ACTIVE" => DocumentStatus::Active,
            "ARCHIVED" => DocumentStatus::Archived,
            "DELETED" => DocumentStatus::Deleted,
            // unrecognised values are held back like quarantined rows
            _ => DocumentStatus::Quarantined,
        }
    }
}

impl From<DocumentStatus> for String {
    fn from(status: DocumentStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Sensitivity tag; informational only, it does not gate access
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensitivityLevel {
    Low,
    Medium,
    High,
}

impl SensitivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitivityLevel::Low => "LOW",
            SensitivityLevel::Medium => "MEDIUM",
            SensitivityLevel::High => "HIGH",
        }
    }

    /// Case-insensitive parse, `None` for anything outside the set
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(SensitivityLevel::Low),
            "MEDIUM" => Some(SensitivityLevel::Medium),
            "HIGH" => Some(SensitivityLevel::High),
            _ => None,
        }
    }
}

/// Progress of the asynchronous enrichment pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrichmentStatus {
    Pending,
    Completed,
    Failed,
}

impl EnrichmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStatus::Pending => "PENDING",
            EnrichmentStatus::Completed => "COMPLETED",
            EnrichmentStatus::Failed => "FAILED",
        }
    }
}

impl From<&str> for EnrichmentStatus {
    fn from(s: &str) -> Self {
        match s {
            "COMPLETED" => EnrichmentStatus::Completed,
            "FAILED" => EnrichmentStatus::Failed,
            _ => EnrichmentStatus::Pending,
        }
    }
}

/// JSONB list of strings (tags, language codes)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StringList(pub Vec<String>);

/// JSONB list of roles, e.g. `["HR","FINANCE"]`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct RoleList(pub Vec<Role>);

/// JSONB embedding vector
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Embedding(pub Vec<f32>);

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Name the file is stored under
    #[sea_orm(column_type = "Text")]
    pub filename: String,

    /// Name supplied by the uploader
    #[sea_orm(column_type = "Text")]
    pub original_filename: String,

    #[sea_orm(column_type = "Text")]
    pub file_path: String,

    pub file_size: i64,

    #[sea_orm(column_type = "Text")]
    pub mime_type: String,

    /// Subject of the uploading principal; never exported
    #[sea_orm(column_type = "Text", nullable)]
    #[serde(skip_serializing)]
    pub uploaded_by: Option<String>,

    pub upload_date: DateTimeWithTimeZone,

    #[sea_orm(column_type = "Text", nullable)]
    pub summary_en: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub summary_ml: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub extracted_text: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub tags: Option<StringList>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub allowed_roles: Option<RoleList>,

    /// 0.00 - 1.00
    pub ai_confidence: Option<f64>,

    #[sea_orm(column_type = "Text")]
    pub sensitivity_level: String,

    pub retention_days: i32,

    pub expiry_date: Option<Date>,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub embeddings: Option<Embedding>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub languages_detected: Option<StringList>,

    pub images_count: i32,

    pub has_multilingual_content: bool,

    #[sea_orm(column_type = "Text")]
    pub enrichment_status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub enrichment_error: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn document_status(&self) -> DocumentStatus {
        DocumentStatus::from(self.status.as_str())
    }

    pub fn enrichment(&self) -> EnrichmentStatus {
        EnrichmentStatus::from(self.enrichment_status.as_str())
    }

    pub fn sensitivity(&self) -> SensitivityLevel {
        SensitivityLevel::parse(&self.sensitivity_level).unwrap_or(SensitivityLevel::Medium)
    }

    /// Roles allowed to see this document; empty when unset
    pub fn roles(&self) -> &[Role] {
        self.allowed_roles.as_ref().map(|r| r.0.as_slice()).unwrap_or(&[])
    }

    pub fn tag_list(&self) -> &[String] {
        self.tags.as_ref().map(|t| t.0.as_slice()).unwrap_or(&[])
    }

    pub fn languages(&self) -> &[String] {
        self.languages_detected.as_ref().map(|l| l.0.as_slice()).unwrap_or(&[])
    }

    pub fn embedding_dimension(&self) -> usize {
        self.embeddings.as_ref().map(|e| e.0.len()).unwrap_or(0)
    }

    /// Archived and deleted documents are closed to reads such as chat
    pub fn is_retired(&self) -> bool {
        matches!(
            self.document_status(),
            DocumentStatus::Archived | DocumentStatus::Deleted
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::document_image::Entity")]
    Images,
}

impl Related<super::document_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Input for inserting a freshly uploaded document
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_by: Option<String>,
}

impl NewDocument {
    /// Required text fields must be non-blank and the size non-negative
    pub fn validate(&self) -> crate::errors::Result<()> {
        let required = [
            ("filename", &self.filename),
            ("original_filename", &self.original_filename),
            ("file_path", &self.file_path),
            ("mime_type", &self.mime_type),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        if self.file_size < 0 {
            return Err(AppError::validation("file_size", "must not be negative"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_document() -> NewDocument {
        NewDocument {
            filename: "0190.pdf".into(),
            original_filename: "report.pdf".into(),
            file_path: "uploads/0190.pdf".into(),
            file_size: 42,
            mime_type: "application/pdf".into(),
            uploaded_by: Some("asha".into()),
        }
    }

    #[test]
    fn test_new_document_validation() {
        assert!(new_document().validate().is_ok());

        let mut blank = new_document();
        blank.mime_type = "  ".into();
        assert!(matches!(
            blank.validate(),
            Err(AppError::MissingField { field }) if field == "mime_type"
        ));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(DocumentStatus::from("ARCHIVED"), DocumentStatus::Archived);
        assert_eq!(DocumentStatus::from("bogus"), DocumentStatus::Quarantined);
        assert_eq!(String::from(DocumentStatus::Deleted), "DELETED");
        assert_eq!(
            serde_json::to_string(&DocumentStatus::Active).unwrap(),
            "\"ACTIVE\""
        );
        assert_eq!(DocumentStatus::parse(" archived"), Some(DocumentStatus::Archived));
        assert_eq!(DocumentStatus::parse("bogus"), None);
    }

    #[test]
    fn test_sensitivity_parse() {
        assert_eq!(SensitivityLevel::parse("high"), Some(SensitivityLevel::High));
        assert_eq!(SensitivityLevel::parse("SECRET"), None);
    }

    #[test]
    fn test_role_list_is_plain_json_array() {
        let roles = RoleList(vec![Role::Hr, Role::Finance]);
        assert_eq!(serde_json::to_string(&roles).unwrap(), r#"["HR","FINANCE"]"#);
    }

    #[test]
    fn test_json_columns_convert_through_db_values() {
        use sea_orm::sea_query::ValueType;

        let value: sea_orm::Value = RoleList(vec![Role::Finance]).into();
        assert_eq!(
            <RoleList as ValueType>::try_from(value).unwrap(),
            RoleList(vec![Role::Finance])
        );

        let tags: sea_orm::Value = StringList(vec!["invoice-related".into()]).into();
        assert_eq!(
            <StringList as ValueType>::try_from(tags).unwrap().0,
            vec!["invoice-related".to_string()]
        );
    }
}
