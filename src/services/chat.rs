use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{DatabaseProxy, StoreError};
use crate::error::CoreError;
use crate::services::llm_provider::TutorModel;
use crate::types::{ChatMessage, ChatRole, ChatSession};

pub const SESSION_LIST_LIMIT: usize = 50;
pub const MAX_SAVE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextType {
    Summary,
    Doubt,
    General,
}

impl ContextType {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("doubt") => Self::Doubt,
            Some("summary") => Self::Summary,
            Some(_) => Self::General,
        }
    }
}

pub fn system_prompt(context: ContextType, subject: Option<&str>) -> String {
    match context {
        ContextType::Summary => format!(
            "You are an expert AI tutor for {}. \
             Provide clear, concise summaries of educational topics. \
             Focus on key concepts and make them easy to understand for students.",
            subject.unwrap_or("various subjects")
        ),
        ContextType::Doubt => format!(
            "You are an AI tutor helping students with doubts and questions about {}. \
             Provide detailed explanations with examples. Be patient, encouraging, and thorough.",
            subject.unwrap_or("their subjects")
        ),
        ContextType::General => {
            "You are a helpful AI tutor. Assist students with their learning needs.".to_string()
        }
    }
}

/// A conversation that has not been saved yet.
pub fn new_session(
    user_id: &str,
    subject: Option<String>,
    topic: Option<String>,
    now: DateTime<Utc>,
) -> ChatSession {
    ChatSession {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        subject,
        topic,
        messages: Vec::new(),
        created_at: now,
        updated_at: now,
        version: 0,
    }
}

/// Pushes a message to the end of the log. `updated_at` never moves backwards,
/// even if the wall clock does.
pub fn push_message(session: &mut ChatSession, role: ChatRole, content: &str, now: DateTime<Utc>) {
    session.messages.push(ChatMessage {
        role,
        content: content.to_string(),
        timestamp: now,
    });
    session.updated_at = session.updated_at.max(now);
}

#[derive(Debug, Clone)]
pub struct AppendInput<'a> {
    pub session_id: Option<&'a str>,
    pub user_id: &'a str,
    pub subject: Option<&'a str>,
    pub topic: Option<&'a str>,
    pub role: ChatRole,
    pub text: &'a str,
}

/// Appends to the session named by `session_id`, or starts a new one owned by
/// the caller when the id is absent, unknown, or owned by someone else.
///
/// The session is re-read on every attempt and saved against the version it
/// was read at, so concurrent appends never drop each other's messages.
pub async fn append(
    proxy: &DatabaseProxy,
    input: AppendInput<'_>,
) -> Result<ChatSession, CoreError> {
    if input.text.trim().is_empty() {
        return Err(CoreError::validation("message must not be empty"));
    }

    for _ in 0..MAX_SAVE_ATTEMPTS {
        let existing = match input.session_id {
            Some(id) => proxy
                .get_chat_session(id)
                .await?
                .filter(|s| s.user_id == input.user_id),
            None => None,
        };
        let expected_version = existing.as_ref().map(|s| s.version);

        let now = Utc::now();
        let mut session = existing.unwrap_or_else(|| {
            new_session(
                input.user_id,
                input.subject.map(str::to_string),
                input.topic.map(str::to_string),
                now,
            )
        });
        push_message(&mut session, input.role, input.text, now);

        match proxy.save_chat_session(&session, expected_version).await {
            Ok(stored) => return Ok(stored),
            Err(StoreError::Conflict) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Err(CoreError::ConflictOnUpdate {
        attempts: MAX_SAVE_ATTEMPTS,
    })
}

pub async fn list_sessions(
    proxy: &DatabaseProxy,
    user_id: &str,
) -> Result<Vec<ChatSession>, CoreError> {
    Ok(proxy.list_chat_sessions(user_id, SESSION_LIST_LIMIT).await?)
}

pub async fn get_session(
    proxy: &DatabaseProxy,
    user_id: &str,
    session_id: &str,
) -> Result<ChatSession, CoreError> {
    proxy
        .get_chat_session(session_id)
        .await?
        .filter(|s| s.user_id == user_id)
        .ok_or_else(|| CoreError::not_found("chat session", session_id))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub context_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnResponse {
    pub response: String,
    pub session_id: String,
}

/// One tutoring exchange. The student's message is stored before the model is
/// asked, so a failed reply leaves the question in the log. The reply is
/// appended to whatever the session holds by then, not to the snapshot the
/// model saw.
pub async fn chat_turn(
    proxy: &DatabaseProxy,
    model: &dyn TutorModel,
    user_id: &str,
    request: &ChatTurnRequest,
) -> Result<ChatTurnResponse, CoreError> {
    let session = append(
        proxy,
        AppendInput {
            session_id: request.session_id.as_deref(),
            user_id,
            subject: request.subject.as_deref(),
            topic: request.topic.as_deref(),
            role: ChatRole::User,
            text: &request.message,
        },
    )
    .await?;

    let context = ContextType::parse(request.context_type.as_deref());
    let prompt = system_prompt(context, request.subject.as_deref());
    let reply = model
        .reply(&prompt, &session.messages)
        .await
        .map_err(|e| CoreError::Upstream(e.to_string()))?;
    if reply.trim().is_empty() {
        return Err(CoreError::Upstream("model returned an empty reply".to_string()));
    }

    append(
        proxy,
        AppendInput {
            session_id: Some(&session.id),
            user_id,
            subject: request.subject.as_deref(),
            topic: request.topic.as_deref(),
            role: ChatRole::Assistant,
            text: &reply,
        },
    )
    .await?;

    Ok(ChatTurnResponse {
        response: reply,
        session_id: session.id,
    })
}
