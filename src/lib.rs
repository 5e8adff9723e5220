pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod types;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::{DatabaseProxy, DbInitError};
use crate::services::llm_provider::LLMProvider;
use crate::state::AppState;

/// Wraps the router in the HTTP layers every deployment shares.
pub fn build_app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn create_app(config: &Config) -> Result<axum::Router, DbInitError> {
    let db_proxy = DatabaseProxy::from_config(&config.db).await?;

    let tutor = LLMProvider::from_env();
    if !tutor.is_available() {
        tracing::warn!("LLM_API_KEY not set, chat replies will fail with UPSTREAM_ERROR");
    }

    let state = AppState::new(db_proxy, config.max_upsert_attempts, Arc::new(tutor));
    Ok(build_app(state))
}
