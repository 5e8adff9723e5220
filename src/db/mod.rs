pub mod config;
pub mod memory;
pub mod sqlite;

mod schema;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::config::DbConfig;
use crate::db::memory::MemoryStore;
use crate::db::sqlite::SqliteStore;
use crate::types::{ChatSession, ProgressKey, Quiz, QuizAttempt, QuizFilter, TopicProgress};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conditional write lost a race")]
    Conflict,
    #[error("store call timed out")]
    Timeout,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("document encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Persistence boundary for every record this service owns.
///
/// `upsert_progress` and `save_chat_session` are conditional writes: with
/// `expected_version` set to `None` they insert and fail with
/// [`StoreError::Conflict`] if the key already exists; with `Some(v)` they
/// replace the record only while the stored version is still `v`. The stored
/// record comes back with its version bumped.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StoreError>;

    async fn get_quiz(&self, id: &str) -> Result<Option<Quiz>, StoreError>;

    async fn list_quizzes(
        &self,
        filter: &QuizFilter,
        limit: usize,
    ) -> Result<Vec<Quiz>, StoreError>;

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), StoreError>;

    async fn list_attempts(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<QuizAttempt>, StoreError>;

    async fn get_progress(&self, key: &ProgressKey) -> Result<Option<TopicProgress>, StoreError>;

    async fn upsert_progress(
        &self,
        progress: &TopicProgress,
        expected_version: Option<i64>,
    ) -> Result<TopicProgress, StoreError>;

    async fn list_progress(
        &self,
        user_id: &str,
        subject: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TopicProgress>, StoreError>;

    async fn get_chat_session(&self, id: &str) -> Result<Option<ChatSession>, StoreError>;

    async fn save_chat_session(
        &self,
        session: &ChatSession,
        expected_version: Option<i64>,
    ) -> Result<ChatSession, StoreError>;

    /// Most recently updated first.
    async fn list_chat_sessions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatSession>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Shared handle that bounds every store call by the configured timeout.
#[derive(Clone)]
pub struct DatabaseProxy {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl DatabaseProxy {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn in_memory(timeout: Duration) -> Self {
        Self::new(Arc::new(MemoryStore::new()), timeout)
    }

    pub async fn from_config(config: &DbConfig) -> Result<Self, DbInitError> {
        let store: Arc<dyn DocumentStore> = match config.database_url.as_deref() {
            Some(url) => Arc::new(SqliteStore::connect(url, config).await?),
            None => {
                tracing::warn!("DATABASE_URL not set, records are kept in memory only");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::new(store, config.store_timeout))
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        }
    }

    pub async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StoreError> {
        self.bounded(self.store.insert_quiz(quiz)).await
    }

    pub async fn get_quiz(&self, id: &str) -> Result<Option<Quiz>, StoreError> {
        self.bounded(self.store.get_quiz(id)).await
    }

    pub async fn list_quizzes(
        &self,
        filter: &QuizFilter,
        limit: usize,
    ) -> Result<Vec<Quiz>, StoreError> {
        self.bounded(self.store.list_quizzes(filter, limit)).await
    }

    pub async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), StoreError> {
        self.bounded(self.store.insert_attempt(attempt)).await
    }

    pub async fn list_attempts(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<QuizAttempt>, StoreError> {
        self.bounded(self.store.list_attempts(user_id, limit)).await
    }

    pub async fn get_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<TopicProgress>, StoreError> {
        self.bounded(self.store.get_progress(key)).await
    }

    pub async fn upsert_progress(
        &self,
        progress: &TopicProgress,
        expected_version: Option<i64>,
    ) -> Result<TopicProgress, StoreError> {
        self.bounded(self.store.upsert_progress(progress, expected_version))
            .await
    }

    pub async fn list_progress(
        &self,
        user_id: &str,
        subject: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TopicProgress>, StoreError> {
        self.bounded(self.store.list_progress(user_id, subject, limit))
            .await
    }

    pub async fn get_chat_session(&self, id: &str) -> Result<Option<ChatSession>, StoreError> {
        self.bounded(self.store.get_chat_session(id)).await
    }

    pub async fn save_chat_session(
        &self,
        session: &ChatSession,
        expected_version: Option<i64>,
    ) -> Result<ChatSession, StoreError> {
        self.bounded(self.store.save_chat_session(session, expected_version))
            .await
    }

    pub async fn list_chat_sessions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatSession>, StoreError> {
        self.bounded(self.store.list_chat_sessions(user_id, limit))
            .await
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(self.store.ping()).await
    }
}

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error("invalid database url: {0}")]
    Config(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
