//! Fixtures shared by the repository and service tests

use crate::auth::Role;
use crate::db::models::{Document, DocumentImage, RoleList, StringList};
use chrono::{TimeZone, Utc};
use sea_orm::{DatabaseConnection, MockDatabase, Transaction};
use std::sync::Arc;
use uuid::Uuid;

/// Mock connection that the test keeps a handle on after building a pool
pub fn shared(db: MockDatabase) -> Arc<DatabaseConnection> {
    Arc::new(db.into_connection())
}

/// Statements executed so far; every pool holding the connection must be dropped first
pub fn transaction_log(db: Arc<DatabaseConnection>) -> Vec<Transaction> {
    match Arc::try_unwrap(db) {
        Ok(conn) => conn.into_transaction_log(),
        Err(_) => panic!("mock connection is still held by a pool"),
    }
}

/// Every SQL statement in the log, flattened across transactions
pub fn statements(log: &[Transaction]) -> Vec<String> {
    log.iter()
        .flat_map(|t| t.statements())
        .map(|s| s.sql.clone())
        .collect()
}

pub fn document(roles: &[Role]) -> Document {
    let uploaded = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();

    Document {
        id: Uuid::now_v7(),
        filename: "0190a.pdf".into(),
        original_filename: "Invoice_Q1.pdf".into(),
        file_path: "uploads/0190a.pdf".into(),
        file_size: 2048,
        mime_type: "application/pdf".into(),
        uploaded_by: Some("asha".into()),
        upload_date: uploaded.into(),
        summary_en: Some("Quarterly invoice summary".into()),
        summary_ml: None,
        extracted_text: Some("Invoice total: 4,200".into()),
        tags: Some(StringList(vec!["invoice-related".into()])),
        allowed_roles: Some(RoleList(roles.to_vec())),
        ai_confidence: Some(0.82),
        sensitivity_level: "MEDIUM".into(),
        retention_days: 2555,
        expiry_date: None,
        status: "ACTIVE".into(),
        embeddings: None,
        languages_detected: Some(StringList(vec!["en".into()])),
        images_count: 0,
        has_multilingual_content: false,
        enrichment_status: "COMPLETED".into(),
        enrichment_error: None,
        created_at: uploaded.into(),
        updated_at: uploaded.into(),
    }
}

pub fn image(document_id: Uuid, page_number: i32, text: &str) -> DocumentImage {
    DocumentImage {
        id: Uuid::now_v7(),
        document_id,
        image_id: format!("page{}_img1", page_number),
        page_number,
        image_data: Some("iVBORw0KGgo=".into()),
        image_format: Some("png".into()),
        text_content: Some(text.into()),
        languages_detected: Some(StringList(vec!["en".into()])),
        extraction_confidence: Some(0.9),
        created_at: Utc::now().into(),
    }
}
