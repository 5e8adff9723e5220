use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use crate::middleware::AuthUser;
use crate::response::{ok, AppError};
use crate::routes::json_body;
use crate::services::chat::{self, ChatTurnRequest};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(send_message))
        .route("/chat/sessions", get(list_sessions))
        .route("/chat/sessions/:id", get(get_session))
}

async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ChatTurnRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let turn = chat::chat_turn(state.db_proxy(), state.tutor(), &user.id, &request).await?;
    Ok(ok(turn))
}

async fn list_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = chat::list_sessions(state.db_proxy(), &user.id).await?;
    Ok(ok(sessions))
}

async fn get_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = chat::get_session(state.db_proxy(), &user.id, &session_id).await?;
    Ok(ok(session))
}
