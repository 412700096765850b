//! Question answering handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use docvault_common::{
    auth::Principal,
    errors::Result,
    services::chat::ChatAnswer,
};

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    pub question: String,

    #[validate(length(max = 16))]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GlobalSearchRequest {
    pub query: String,

    #[validate(length(max = 16))]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TranslateTextRequest {
    pub text: String,

    #[validate(length(max = 16))]
    pub target_language: Option<String>,

    #[validate(length(max = 16))]
    pub source_language: Option<String>,
}

/// Ask a question about one document. An unauthenticated caller is
/// refused by the chat service, which owns the whole decision sequence.
pub async fn ask(
    State(state): State<AppState>,
    principal: Option<Principal>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatAnswer>> {
    request.validate()?;

    let answer = state
        .chat
        .ask(
            principal.as_ref(),
            id,
            &request.question,
            request.language.as_deref(),
        )
        .await?;

    Ok(Json(answer))
}

/// Question across every document the caller's role may see
pub async fn global_search(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<GlobalSearchRequest>,
) -> Result<Json<serde_json::Value>> {
    request.validate()?;

    let reply = state
        .chat
        .global_search(&principal, &request.query, request.language.as_deref())
        .await?;

    Ok(Json(reply))
}

/// Translate free text through the collaborator
pub async fn translate(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<TranslateTextRequest>,
) -> Result<Json<serde_json::Value>> {
    request.validate()?;

    let reply = state
        .chat
        .translate(
            &principal,
            &request.text,
            request.target_language.as_deref(),
            request.source_language.as_deref(),
        )
        .await?;

    Ok(Json(reply))
}
