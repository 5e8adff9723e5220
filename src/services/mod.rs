pub mod chat;
pub mod dashboard;
pub mod llm_provider;
pub mod progress;
pub mod quiz;
