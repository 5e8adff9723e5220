mod chat;
mod dashboard;
mod health;
mod progress;
mod quizzes;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};

use crate::middleware::require_identity;
use crate::response::AppError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(quizzes::router())
        .merge(progress::router())
        .merge(dashboard::router())
        .merge(chat::router())
        .route_layer(middleware::from_fn(require_identity));

    Router::new()
        .nest("/health", health::router())
        .nest("/api", api)
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    AppError::not_found("route not found").into_response()
}

/// Unwraps a JSON body, turning axum's plain-text rejection into the error envelope.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            let status = rejection.status();
            let message = rejection.body_text();
            if status == StatusCode::UNSUPPORTED_MEDIA_TYPE {
                Err(AppError::validation("expected a JSON request body"))
            } else {
                Err(AppError::validation(message))
            }
        }
    }
}
