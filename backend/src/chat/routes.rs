use actix_web::{web, HttpResponse, Scope};
use log::{error, info};
use shared::{ChatRequest, ChatResponse, Message, SessionsResponse, SourceDocument};

use super::index::IndexedChunk;
use super::memory::SessionStore;
use super::service::ChatHandle;
use super::LanguageModel;
use crate::error::ApiError;

const PREVIEW_CHARS: usize = 200;

pub fn scope<M: LanguageModel + 'static>() -> Scope {
    web::scope("/gpt")
        .route("/gpt", web::post().to(chat::<M>))
        .route("/sessions", web::get().to(list_sessions))
        .route("/sessions/{session_id}", web::delete().to(clear_session))
}

pub fn content_preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

fn source_documents(documents: Vec<IndexedChunk>) -> Vec<SourceDocument> {
    documents
        .into_iter()
        .enumerate()
        .map(|(i, doc)| SourceDocument {
            source_id: i + 1,
            content_preview: content_preview(&doc.content),
            metadata: doc.metadata,
        })
        .collect()
}

async fn chat<M: LanguageModel + 'static>(
    request: web::Json<ChatRequest>,
    handle: web::Data<ChatHandle<M>>,
    sessions: web::Data<SessionStore>,
) -> Result<HttpResponse, ApiError> {
    let ChatRequest {
        question,
        session_id,
    } = request.into_inner();
    if question.trim().is_empty() {
        return Err(ApiError::BadRequest("Question cannot be empty".into()));
    }

    let manager = handle.get()?;
    info!("Chat question for session {}", session_id);
    let answer = manager
        .get_response(&question, &session_id, &sessions)
        .await
        .map_err(|e| {
            error!("Chat request failed for session {}: {}", session_id, e);
            ApiError::from(e)
        })?;

    Ok(HttpResponse::Ok().json(ChatResponse {
        answer: answer.answer,
        session_id,
        sources: source_documents(answer.documents),
    }))
}

async fn list_sessions(sessions: web::Data<SessionStore>) -> Result<HttpResponse, ApiError> {
    let active_sessions = sessions.sessions()?;
    Ok(HttpResponse::Ok().json(SessionsResponse {
        total_sessions: active_sessions.len(),
        active_sessions,
    }))
}

async fn clear_session(
    path: web::Path<String>,
    sessions: web::Data<SessionStore>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    if !sessions.clear(&session_id)? {
        return Err(ApiError::NotFound(format!("Session {} not found", session_id)));
    }
    info!("Cleared chat session {}", session_id);
    Ok(HttpResponse::Ok().json(Message {
        message: format!("Session {} cleared", session_id),
    }))
}
