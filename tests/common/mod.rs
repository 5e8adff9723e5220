#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use serde_json::Value;

use tutor_backend_rust::db::DatabaseProxy;
use tutor_backend_rust::services::llm_provider::{LLMError, TutorModel};
use tutor_backend_rust::state::AppState;
use tutor_backend_rust::types::ChatMessage;

/// Echoes the last message back so tests can assert on the reply.
pub struct EchoTutor;

#[async_trait]
impl TutorModel for EchoTutor {
    async fn reply(
        &self,
        _system_prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String, LLMError> {
        let last = history.last().map(|m| m.content.as_str()).unwrap_or("");
        Ok(format!("echo: {last}"))
    }
}

pub struct OfflineTutor;

#[async_trait]
impl TutorModel for OfflineTutor {
    async fn reply(
        &self,
        _system_prompt: &str,
        _history: &[ChatMessage],
    ) -> Result<String, LLMError> {
        Err(LLMError::NotConfigured("LLM_API_KEY"))
    }
}

pub fn test_state_with(tutor: Arc<dyn TutorModel>) -> AppState {
    let proxy = DatabaseProxy::in_memory(Duration::from_secs(5));
    AppState::new(proxy, 5, tutor)
}

pub fn create_test_app() -> Router {
    tutor_backend_rust::build_app(test_state_with(Arc::new(EchoTutor)))
}

pub fn create_offline_tutor_app() -> Router {
    tutor_backend_rust::build_app(test_state_with(Arc::new(OfflineTutor)))
}

pub fn request(
    method: Method,
    uri: &str,
    user: Option<(&str, &str)>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = user {
        builder = builder.header("x-user-id", id).header("x-user-role", role);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Five-question quiz whose answer key is `[0, 1, 2, 3, 0]`.
pub fn quiz_payload(subject: &str, topic: &str) -> Value {
    let key = [0, 1, 2, 3, 0];
    let questions: Vec<Value> = key
        .iter()
        .enumerate()
        .map(|(idx, answer)| {
            serde_json::json!({
                "question": format!("Question {}", idx + 1),
                "options": ["A", "B", "C", "D"],
                "correctAnswer": answer,
                "explanation": "",
            })
        })
        .collect();

    serde_json::json!({
        "title": format!("{topic} basics"),
        "stream": "CBSE",
        "classLevel": 10,
        "subject": subject,
        "topic": topic,
        "difficulty": "beginner",
        "questions": questions,
    })
}
