use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};

use crate::middleware::AuthUser;
use crate::response::{ok, AppError};
use crate::services::dashboard;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard/stats", get(stats))
}

async fn stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let summary = dashboard::summarize(state.db_proxy(), &user.id).await?;
    Ok(ok(summary))
}
