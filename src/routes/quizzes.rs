use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use crate::middleware::AuthUser;
use crate::response::{ok, AppError};
use crate::routes::json_body;
use crate::services::quiz::{self, CreateQuizInput};
use crate::state::AppState;
use crate::types::QuizFilter;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quizzes", get(list_quizzes).post(create_quiz))
        .route("/quizzes/:id/attempt", post(submit_attempt))
}

async fn list_quizzes(
    State(state): State<AppState>,
    Query(filter): Query<QuizFilter>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = quiz::list_quizzes(state.db_proxy(), &filter).await?;
    Ok(ok(quizzes))
}

async fn create_quiz(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateQuizInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    if !user.role.can_author_content() {
        return Err(AppError::forbidden("only teachers and admins can create quizzes"));
    }
    let input = json_body(payload)?;

    let created = quiz::create_quiz(state.db_proxy(), &user.id, input).await?;
    tracing::info!(quiz_id = %created.id, user_id = %user.id, "quiz created");
    Ok((StatusCode::CREATED, ok(created)))
}

async fn submit_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(quiz_id): Path<String>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let answers = quiz::parse_answers(&body)?;

    let outcome = quiz::submit_attempt(state.ledger(), &quiz_id, &user.id, answers).await?;
    tracing::debug!(
        quiz_id = %quiz_id,
        user_id = %user.id,
        score = outcome.score,
        "quiz attempt recorded"
    );
    Ok(ok(outcome))
}
