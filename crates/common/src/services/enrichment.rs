//! Post-upload enrichment
//!
//! Sends a stored file to the intelligence collaborator and folds the
//! analysis back into the document: summaries, tags, allowed roles,
//! confidence-driven status, retention, embeddings and page images.
//! A failed pass only marks the enrichment as failed.

use crate::auth::Role;
use crate::db::models::{Document, DocumentStatus, SensitivityLevel};
use crate::db::{EnrichmentUpdate, NewDocumentImage, Repository};
use crate::errors::{AppError, Result};
use crate::intelligence::{IntelligenceClient, ProcessRequest, ProcessingResult};
use crate::metrics;
use base64::Engine;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Confidence assumed when the collaborator gives none
pub const DEFAULT_CONFIDENCE: f64 = 0.75;

/// Documents classified below this confidence are quarantined
pub const QUARANTINE_THRESHOLD: f64 = 0.3;

#[derive(Clone)]
pub struct EnrichmentService {
    repo: Repository,
    intelligence: Arc<dyn IntelligenceClient>,
}

impl EnrichmentService {
    pub fn new(repo: Repository, intelligence: Arc<dyn IntelligenceClient>) -> Self {
        Self { repo, intelligence }
    }

    /// Run one enrichment pass for `document_id`
    #[instrument(skip(self))]
    pub async fn enrich(&self, document_id: Uuid) -> Result<Document> {
        let start = Instant::now();

        let document = self
            .repo
            .find_document_by_id(document_id)
            .await?
            .ok_or_else(|| AppError::DocumentNotFound {
                id: document_id.to_string(),
            })?;

        let request = ProcessRequest {
            file_path: document.file_path.clone(),
            mime_type: document.mime_type.clone(),
            document_id,
        };

        let outcome = match self.intelligence.process_document(&request).await {
            Ok(result) => {
                let (mut update, images) = map_processing_result(result, Utc::now().date_naive());
                // Enrichment never revives an archived or deleted document
                if document.is_retired() {
                    update.status = None;
                }
                self.repo.apply_enrichment(document_id, update, images).await
            }
            Err(e) => Err(e),
        };

        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            Ok(document) => {
                metrics::record_enrichment(elapsed, true);
                info!(
                    status = %document.status,
                    roles = document.roles().len(),
                    images = document.images_count,
                    "Enrichment completed"
                );
                Ok(document)
            }
            Err(e) => {
                metrics::record_enrichment(elapsed, false);
                warn!(error = %e, "Enrichment failed");
                self.repo
                    .mark_enrichment_failed(document_id, &e.to_string())
                    .await?;
                Err(e)
            }
        }
    }

    /// Enrich in the background; the caller does not wait
    pub fn spawn(&self, document_id: Uuid) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.enrich(document_id).await {
                error!(document_id = %document_id, error = %e, "Background enrichment ended with error");
            }
        });
    }
}

/// Fold a collaborator analysis into document fields and image rows
pub fn map_processing_result(
    result: ProcessingResult,
    today: NaiveDate,
) -> (EnrichmentUpdate, Vec<NewDocumentImage>) {
    let analysis = result.analysis.unwrap_or_default();

    let (allowed_roles, ai_confidence, status) = match analysis.recommended_roles {
        Some(recommendation) => {
            let roles = parse_roles(&recommendation.roles);
            let (confidence, status) = match recommendation.confidence_value() {
                Some(c) => {
                    let status = if c < QUARANTINE_THRESHOLD {
                        DocumentStatus::Quarantined
                    } else {
                        DocumentStatus::Active
                    };
                    (c.clamp(0.0, 1.0), status)
                }
                None => (DEFAULT_CONFIDENCE, DocumentStatus::Active),
            };
            (roles, confidence, status)
        }
        None => (
            vec![Role::Leadership, Role::Engineer],
            DEFAULT_CONFIDENCE,
            DocumentStatus::Active,
        ),
    };

    let sensitivity_level = analysis.sensitivity_level.as_deref().and_then(|level| {
        let parsed = SensitivityLevel::parse(level);
        if parsed.is_none() {
            warn!(sensitivity = level, "Unknown sensitivity level, keeping current");
        }
        parsed
    });

    let retention_days = analysis
        .retention_recommendation
        .and_then(|r| r.days)
        .filter(|days| *days > 0);
    let expiry_date = retention_days.map(|days| today + chrono::Duration::days(days as i64));

    let mut images: Vec<NewDocumentImage> = result
        .images
        .into_iter()
        .map(|image| NewDocumentImage {
            image_data: image.image_data.filter(|data| {
                let valid = base64::engine::general_purpose::STANDARD.decode(data).is_ok();
                if !valid {
                    warn!(image_id = %image.image_id, "Discarding image data that is not base64");
                }
                valid
            }),
            image_id: image.image_id,
            page_number: image.page_number,
            image_format: image.image_format,
            text_content: image.text_content,
            languages_detected: image.languages_detected,
            extraction_confidence: image.confidence.map(|c| c.clamp(0.0, 1.0)),
        })
        .collect();
    images.sort_by_key(|image| image.page_number);

    let mut seen = BTreeSet::new();
    let languages_detected: Vec<String> = result
        .languages_detected
        .iter()
        .chain(images.iter().flat_map(|image| image.languages_detected.iter()))
        .map(|lang| lang.trim().to_lowercase())
        .filter(|lang| !lang.is_empty() && seen.insert(lang.clone()))
        .collect();

    let update = EnrichmentUpdate {
        extracted_text: result.extracted_text,
        summary_en: analysis.summary_en,
        summary_ml: analysis.summary_ml,
        tags: analysis.tags,
        allowed_roles,
        ai_confidence,
        status: Some(status),
        sensitivity_level,
        retention_days,
        expiry_date,
        embeddings: result.embeddings,
        has_multilingual_content: languages_detected.len() > 1,
        languages_detected,
    };

    (update, images)
}

/// Known roles from a recommendation; unknown names are skipped, and a
/// recommendation with no usable role falls back to leadership
fn parse_roles(names: &[String]) -> Vec<Role> {
    let mut roles = Vec::new();
    for name in names {
        match name.parse::<Role>() {
            Ok(role) if !roles.contains(&role) => roles.push(role),
            Ok(_) => {}
            Err(_) => warn!(role = %name, "Unknown role from intelligence service, skipping"),
        }
    }

    if roles.is_empty() {
        roles.push(Role::Leadership);
    }
    roles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{document, shared, statements, transaction_log};
    use crate::db::DbPool;
    use crate::intelligence::{DocumentChatRequest, GlobalChatRequest, TranslateRequest};
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn result(value: serde_json::Value) -> ProcessingResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_unknown_roles_skipped() {
        let (update, _) = map_processing_result(
            result(serde_json::json!({
                "analysis": {"recommended_roles": {"roles": ["HR", "JANITOR", "finance"], "confidence": 0.9}}
            })),
            today(),
        );

        assert_eq!(update.allowed_roles, vec![Role::Hr, Role::Finance]);
        assert_eq!(update.ai_confidence, 0.9);
        assert_eq!(update.status, Some(DocumentStatus::Active));
    }

    #[test]
    fn test_only_unknown_roles_fall_back_to_leadership() {
        let (update, _) = map_processing_result(
            result(serde_json::json!({
                "analysis": {"recommended_roles": {"roles": ["JANITOR"]}}
            })),
            today(),
        );

        assert_eq!(update.allowed_roles, vec![Role::Leadership]);
        assert_eq!(update.ai_confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_no_recommendation_defaults() {
        let (update, _) = map_processing_result(
            result(serde_json::json!({"analysis": {"summary_en": "s"}})),
            today(),
        );

        assert_eq!(update.allowed_roles, vec![Role::Leadership, Role::Engineer]);
        assert_eq!(update.ai_confidence, 0.75);
        assert_eq!(update.status, Some(DocumentStatus::Active));
    }

    #[test]
    fn test_low_confidence_quarantines() {
        let (update, _) = map_processing_result(
            result(serde_json::json!({
                "analysis": {"recommended_roles": {"roles": ["HR"], "confidence": "0.2"}}
            })),
            today(),
        );

        assert_eq!(update.status, Some(DocumentStatus::Quarantined));
        assert_eq!(update.ai_confidence, 0.2);
    }

    #[test]
    fn test_confidence_clamped() {
        let (update, _) = map_processing_result(
            result(serde_json::json!({
                "analysis": {"recommended_roles": {"roles": ["HR"], "confidence": 7}}
            })),
            today(),
        );

        assert_eq!(update.ai_confidence, 1.0);
    }

    #[test]
    fn test_retention_and_sensitivity() {
        let (update, _) = map_processing_result(
            result(serde_json::json!({
                "analysis": {
                    "sensitivity_level": "high",
                    "retention_recommendation": {"days": 30}
                }
            })),
            today(),
        );

        assert_eq!(update.sensitivity_level, Some(SensitivityLevel::High));
        assert_eq!(update.retention_days, Some(30));
        assert_eq!(update.expiry_date, NaiveDate::from_ymd_opt(2024, 7, 1));

        let (unknown, _) = map_processing_result(
            result(serde_json::json!({"analysis": {"sensitivity_level": "TOP_SECRET"}})),
            today(),
        );
        assert_eq!(unknown.sensitivity_level, None);
        assert_eq!(unknown.expiry_date, None);
    }

    #[test]
    fn test_languages_and_images() {
        let (update, images) = map_processing_result(
            result(serde_json::json!({
                "languages_detected": ["en"],
                "images": [
                    {"image_id": "p3", "page_number": 3, "image_data": "not base64!", "languages_detected": ["ml"]},
                    {"image_id": "p1", "page_number": 1, "image_data": "aGVsbG8=", "languages_detected": ["EN"]}
                ]
            })),
            today(),
        );

        assert_eq!(update.languages_detected, vec!["en", "ml"]);
        assert!(update.has_multilingual_content);
        assert_eq!(images[0].image_id, "p1");
        assert_eq!(images[0].image_data.as_deref(), Some("aGVsbG8="));
        assert_eq!(images[1].image_data, None);
    }

    struct FailingIntelligence;

    #[async_trait]
    impl IntelligenceClient for FailingIntelligence {
        async fn process_document(&self, _: &ProcessRequest) -> Result<ProcessingResult> {
            Err(AppError::upstream("intelligence", "connection refused"))
        }

        async fn chat_document(&self, _: &DocumentChatRequest) -> Result<String> {
            unreachable!()
        }

        async fn chat_global(&self, _: &GlobalChatRequest) -> Result<serde_json::Value> {
            unreachable!()
        }

        async fn translate(&self, _: &TranslateRequest) -> Result<serde_json::Value> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_failure_marks_enrichment_failed_and_keeps_status() {
        let current = document(&[Role::Hr]);
        let mut failed = current.clone();
        failed.enrichment_status = "FAILED".into();
        failed.enrichment_error = Some("intelligence request failed: connection refused".into());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![current.clone()]])
            .append_query_results([vec![current.clone()]])
            .append_query_results([vec![failed]]);
        let db = shared(db);
        let repo = Repository::new(DbPool::from_connection(db.clone()));
        let service = EnrichmentService::new(repo, Arc::new(FailingIntelligence));

        let err = service.enrich(current.id).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
        drop(service);

        let log = transaction_log(db);
        let update = &log[2].statements()[0];
        assert!(update.sql.starts_with(r#"UPDATE "documents""#), "{}", update.sql);
        assert!(update.sql.contains(r#""enrichment_status" = "#));
        assert!(update.sql.contains(r#""enrichment_error" = "#));
        assert!(!update.sql.contains(r#""status" = "#));
        assert!(!update.sql.contains(r#""allowed_roles" = "#));
    }

    struct QuarantiningIntelligence;

    #[async_trait]
    impl IntelligenceClient for QuarantiningIntelligence {
        async fn process_document(&self, _: &ProcessRequest) -> Result<ProcessingResult> {
            Ok(result(serde_json::json!({
                "extracted_text": "Offer letter",
                "analysis": {"recommended_roles": {"roles": ["HR"], "confidence": 0.1}}
            })))
        }

        async fn chat_document(&self, _: &DocumentChatRequest) -> Result<String> {
            unreachable!()
        }

        async fn chat_global(&self, _: &GlobalChatRequest) -> Result<serde_json::Value> {
            unreachable!()
        }

        async fn translate(&self, _: &TranslateRequest) -> Result<serde_json::Value> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_document_deleted_during_enrichment_stays_deleted() {
        let current = document(&[Role::Hr]);
        let mut deleted = current.clone();
        deleted.status = "DELETED".into();
        let mut enriched = deleted.clone();
        enriched.ai_confidence = Some(0.1);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![current.clone()]])
            .append_query_results([vec![deleted]])
            .append_query_results([vec![enriched]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 0 }]);
        let db = shared(db);
        let repo = Repository::new(DbPool::from_connection(db.clone()));
        let service = EnrichmentService::new(repo, Arc::new(QuarantiningIntelligence));

        let document = service.enrich(current.id).await.unwrap();
        assert_eq!(document.document_status(), DocumentStatus::Deleted);
        drop(service);

        let sql = statements(&transaction_log(db));
        let update = sql
            .iter()
            .find(|s| s.starts_with(r#"UPDATE "documents""#))
            .expect("document update");
        assert!(!update.contains(r#""status" = "#), "{}", update);
        assert!(update.contains(r#""ai_confidence" = "#), "{}", update);
    }
}
