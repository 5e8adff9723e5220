use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;

use crate::middleware::AuthUser;
use crate::response::{ok, AppError};
use crate::routes::json_body;
use crate::state::AppState;
use crate::types::{Classification, Stream};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/progress", get(list_progress))
        .route("/progress/study-time", post(record_study_time))
        .route("/progress/:subject", get(subject_progress))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudyTimeRequest {
    stream: Stream,
    class_level: i32,
    subject: String,
    topic: String,
    minutes: i64,
}

async fn list_progress(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let records = state.ledger().list_progress(&user.id).await?;
    Ok(ok(records))
}

async fn subject_progress(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(subject): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let records = state
        .ledger()
        .list_subject_progress(&user.id, &subject)
        .await?;
    Ok(ok(records))
}

async fn record_study_time(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<StudyTimeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let classification = Classification {
        stream: body.stream,
        class_level: body.class_level,
        subject: body.subject,
        topic: body.topic,
    };

    let updated = state
        .ledger()
        .record_study_time(&user.id, &classification, body.minutes)
        .await?;
    Ok(ok(updated))
}
