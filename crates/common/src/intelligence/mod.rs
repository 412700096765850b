//! Document-intelligence and reasoning collaborator client
//!
//! The collaborator extracts text, summaries, tags, role and retention
//! recommendations, embeddings and per-page images from an uploaded file,
//! and answers questions given a grounding context.

use crate::config::IntelligenceConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const SERVICE: &str = "intelligence";

/// Request to analyse a stored file
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRequest {
    pub file_path: String,
    pub mime_type: String,
    pub document_id: Uuid,
}

/// Analysis returned for a processed file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessingResult {
    #[serde(default)]
    pub extracted_text: Option<String>,

    #[serde(default)]
    pub analysis: Option<DocumentAnalysis>,

    #[serde(default)]
    pub embeddings: Option<Vec<f32>>,

    #[serde(default)]
    pub languages_detected: Vec<String>,

    #[serde(default)]
    pub images: Vec<ExtractedImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentAnalysis {
    #[serde(default)]
    pub summary_en: Option<String>,

    #[serde(default)]
    pub summary_ml: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub sensitivity_level: Option<String>,

    #[serde(default)]
    pub recommended_roles: Option<RoleRecommendation>,

    #[serde(default)]
    pub retention_recommendation: Option<RetentionRecommendation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleRecommendation {
    #[serde(default)]
    pub roles: Vec<String>,

    /// Number or numeric string, depending on the model
    #[serde(default)]
    pub confidence: Option<serde_json::Value>,
}

impl RoleRecommendation {
    /// Confidence as a number, `None` when absent or not numeric
    pub fn confidence_value(&self) -> Option<f64> {
        let value = match self.confidence.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|c| c.is_finite())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetentionRecommendation {
    #[serde(default)]
    pub days: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedImage {
    pub image_id: String,

    #[serde(default)]
    pub page_number: i32,

    /// Base64 image bytes
    #[serde(default)]
    pub image_data: Option<String>,

    #[serde(default)]
    pub image_format: Option<String>,

    #[serde(default)]
    pub text_content: Option<String>,

    #[serde(default)]
    pub languages_detected: Vec<String>,

    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentChatRequest {
    pub document_id: Uuid,
    pub document_text: String,
    pub question: String,
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DocumentChatResponse {
    answer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalChatRequest {
    pub query: String,
    pub user_roles: Vec<String>,
    pub language: String,
}

/// Free text to translate; the source language is detected when absent
#[derive(Debug, Clone, Serialize)]
pub struct TranslateRequest {
    pub text: String,
    pub target_language: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
}

/// Client for the intelligence collaborator
#[async_trait]
pub trait IntelligenceClient: Send + Sync {
    /// Analyse a stored file
    async fn process_document(&self, request: &ProcessRequest) -> Result<ProcessingResult>;

    /// Answer a question about one document, returning the answer text
    async fn chat_document(&self, request: &DocumentChatRequest) -> Result<String>;

    /// Ask across every document the given roles may see
    async fn chat_global(&self, request: &GlobalChatRequest) -> Result<serde_json::Value>;

    /// Translate free text; the collaborator's reply is passed through
    async fn translate(&self, request: &TranslateRequest) -> Result<serde_json::Value>;
}

/// HTTP implementation against the collaborator's JSON API
pub struct HttpIntelligenceClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIntelligenceClient {
    pub fn new(config: &IntelligenceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::upstream(SERVICE, format!("Request to {} failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                SERVICE,
                format!("{} returned {}: {}", path, status, body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::upstream(SERVICE, format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl IntelligenceClient for HttpIntelligenceClient {
    async fn process_document(&self, request: &ProcessRequest) -> Result<ProcessingResult> {
        self.post("/process-document", request).await
    }

    async fn chat_document(&self, request: &DocumentChatRequest) -> Result<String> {
        let response: DocumentChatResponse = self.post("/chat/document", request).await?;
        Ok(response.answer)
    }

    async fn chat_global(&self, request: &GlobalChatRequest) -> Result<serde_json::Value> {
        self.post("/chat/global", request).await
    }

    async fn translate(&self, request: &TranslateRequest) -> Result<serde_json::Value> {
        self.post("/translate", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String) -> HttpIntelligenceClient {
        HttpIntelligenceClient::new(&IntelligenceConfig {
            base_url,
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_confidence_accepts_number_or_string() {
        let numeric: RoleRecommendation =
            serde_json::from_value(serde_json::json!({"roles": ["HR"], "confidence": 0.4})).unwrap();
        let text: RoleRecommendation =
            serde_json::from_value(serde_json::json!({"roles": [], "confidence": " 0.25 "})).unwrap();
        let junk: RoleRecommendation =
            serde_json::from_value(serde_json::json!({"confidence": "high"})).unwrap();

        assert_eq!(numeric.confidence_value(), Some(0.4));
        assert_eq!(text.confidence_value(), Some(0.25));
        assert_eq!(junk.confidence_value(), None);
    }

    #[test]
    fn test_processing_result_tolerates_missing_sections() {
        let result: ProcessingResult =
            serde_json::from_value(serde_json::json!({"extracted_text": "hello"})).unwrap();

        assert_eq!(result.extracted_text.as_deref(), Some("hello"));
        assert!(result.analysis.is_none());
        assert!(result.images.is_empty());
    }

    #[tokio::test]
    async fn test_chat_document_returns_answer() {
        let router = Router::new().route(
            "/chat/document",
            post(|Json(body): Json<serde_json::Value>| async move {
                Json(serde_json::json!({
                    "answer": format!("asked: {}", body["question"].as_str().unwrap_or_default()),
                    "language": body["language"],
                }))
            }),
        );
        let client = client(serve(router).await);

        let answer = client
            .chat_document(&DocumentChatRequest {
                document_id: Uuid::now_v7(),
                document_text: "Invoice total: 4,200".into(),
                question: "What is the total?".into(),
                language: "en".into(),
            })
            .await
            .unwrap();

        assert_eq!(answer, "asked: What is the total?");
    }

    #[tokio::test]
    async fn test_translate_posts_text_and_target() {
        let router = Router::new().route(
            "/translate",
            post(|Json(body): Json<serde_json::Value>| async move {
                let target = body["target_language"].as_str().unwrap_or_default();
                let text = body["text"].as_str().unwrap_or_default();
                Json(serde_json::json!({
                    "translated_text": format!("[{}] {}", target, text),
                    "has_source": body.get("source_language").is_some(),
                }))
            }),
        );
        let client = client(serve(router).await);

        let reply = client
            .translate(&TranslateRequest {
                text: "Safety circular".into(),
                target_language: "ml".into(),
                source_language: None,
            })
            .await
            .unwrap();

        assert_eq!(reply["translated_text"], "[ml] Safety circular");
        assert_eq!(reply["has_source"], false);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_retryable() {
        let router = Router::new().route(
            "/chat/global",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model unavailable") }),
        );
        let client = client(serve(router).await);

        let err = client
            .chat_global(&GlobalChatRequest {
                query: "q".into(),
                user_roles: vec!["HR".into()],
                language: "en".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Upstream { .. }));
        assert!(err.is_retryable());
    }
}
