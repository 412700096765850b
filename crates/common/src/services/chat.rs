//! Question answering over documents
//!
//! A question about one document is grounded in that document's extracted
//! text plus the OCR text of its page images, and answered by the
//! reasoning collaborator. Access is checked before the collaborator is
//! ever contacted.

use crate::access::ensure_access;
use crate::auth::{Principal, Role};
use crate::db::models::{Document, DocumentImage};
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::intelligence::{DocumentChatRequest, GlobalChatRequest, IntelligenceClient, TranslateRequest};
use crate::metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const MAX_QUESTION_CHARS: usize = 4000;
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatAnswer {
    pub document_id: Uuid,
    pub answer: String,
    pub language: String,
}

#[derive(Clone)]
pub struct ChatService {
    repo: Repository,
    intelligence: Arc<dyn IntelligenceClient>,
    max_context_chars: usize,
}

impl ChatService {
    pub fn new(
        repo: Repository,
        intelligence: Arc<dyn IntelligenceClient>,
        max_context_chars: usize,
    ) -> Self {
        Self {
            repo,
            intelligence,
            max_context_chars,
        }
    }

    /// Answer `question` about one document
    #[instrument(skip(self, principal, question))]
    pub async fn ask(
        &self,
        principal: Option<&Principal>,
        document_id: Uuid,
        question: &str,
        language: Option<&str>,
    ) -> Result<ChatAnswer> {
        let principal = principal.ok_or_else(|| AppError::Unauthorized {
            message: "Authentication required".to_string(),
        })?;

        let document = self
            .repo
            .find_document_by_id(document_id)
            .await?
            .filter(|d| !d.is_retired())
            .ok_or_else(|| AppError::DocumentNotFound {
                id: document_id.to_string(),
            })?;

        ensure_access(principal, &document)?;

        let question = validate_text("question", question)?;
        let language = resolve_language(language);

        let images = self.repo.list_images(document_id).await?;
        let document_text = build_context(&document, &images, self.max_context_chars);

        let request = DocumentChatRequest {
            document_id,
            document_text,
            question,
            language: language.clone(),
        };

        let start = Instant::now();
        let result = self.intelligence.chat_document(&request).await;
        let elapsed = start.elapsed().as_secs_f64();
        metrics::record_chat(elapsed, "document", result.is_ok());

        let answer = result.map_err(|e| {
            warn!(error = %e, "Document chat failed");
            e
        })?;

        info!(
            context_chars = request.document_text.chars().count(),
            elapsed_ms = (elapsed * 1000.0) as u64,
            "Document question answered"
        );

        Ok(ChatAnswer {
            document_id,
            answer,
            language,
        })
    }

    /// Forward a question across every document the principal's role
    /// may see; the collaborator's reply is returned as-is
    #[instrument(skip(self, principal, query))]
    pub async fn global_search(
        &self,
        principal: &Principal,
        query: &str,
        language: Option<&str>,
    ) -> Result<serde_json::Value> {
        let query = validate_text("query", query)?;

        let user_roles = if principal.is_admin() {
            Role::ALL.iter().map(|r| r.as_str().to_string()).collect()
        } else {
            vec![principal.role.as_str().to_string()]
        };

        let request = GlobalChatRequest {
            query,
            user_roles,
            language: resolve_language(language),
        };

        let start = Instant::now();
        let result = self.intelligence.chat_global(&request).await;
        metrics::record_chat(start.elapsed().as_secs_f64(), "global", result.is_ok());

        result
    }

    /// Translate free text for an authenticated caller. The target
    /// defaults to English and a blank source is left for detection.
    #[instrument(skip(self, principal, text), fields(role = %principal.role))]
    pub async fn translate(
        &self,
        principal: &Principal,
        text: &str,
        target_language: Option<&str>,
        source_language: Option<&str>,
    ) -> Result<serde_json::Value> {
        let request = TranslateRequest {
            text: validate_text("text", text)?,
            target_language: resolve_language(target_language),
            source_language: source_language
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        };

        let start = Instant::now();
        let result = self.intelligence.translate(&request).await;
        metrics::record_chat(start.elapsed().as_secs_f64(), "translate", result.is_ok());

        result.map_err(|e| {
            warn!(error = %e, "Translation failed");
            e
        })
    }
}

/// Trimmed, non-empty text of bounded length
fn validate_text(field: &str, text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::validation(field, format!("{} must not be empty", field)));
    }
    if text.chars().count() > MAX_QUESTION_CHARS {
        return Err(AppError::validation(
            field,
            format!("{} must be at most {} characters", field, MAX_QUESTION_CHARS),
        ));
    }
    Ok(text.to_string())
}

fn resolve_language(language: Option<&str>) -> String {
    language
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_string()
}

/// Extracted text followed by each image's OCR text in page order,
/// cut to at most `max_chars` characters
pub fn build_context(document: &Document, images: &[DocumentImage], max_chars: usize) -> String {
    let mut context = document.extracted_text.clone().unwrap_or_default();

    let mut pages: Vec<&DocumentImage> = images.iter().filter(|i| i.has_text()).collect();
    pages.sort_by_key(|i| i.page_number);

    for image in pages {
        if let Some(text) = image.text_content.as_deref() {
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&format!("[Page {}]\n{}", image.page_number, text.trim()));
        }
    }

    truncate_chars(context, max_chars)
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((byte_index, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_index);
    }
    text
}
