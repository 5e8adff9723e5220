use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::db::{DocumentStore, StoreError};
use crate::types::{ChatSession, ProgressKey, Quiz, QuizAttempt, QuizFilter, TopicProgress};

/// Process-local store. Locks are never held across an await point, so every
/// call is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    quizzes: RwLock<Vec<Quiz>>,
    attempts: RwLock<Vec<QuizAttempt>>,
    progress: RwLock<BTreeMap<ProgressKey, TopicProgress>>,
    sessions: RwLock<HashMap<String, ChatSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StoreError> {
        self.quizzes.write().push(quiz.clone());
        Ok(())
    }

    async fn get_quiz(&self, id: &str) -> Result<Option<Quiz>, StoreError> {
        Ok(self.quizzes.read().iter().find(|q| q.id == id).cloned())
    }

    async fn list_quizzes(
        &self,
        filter: &QuizFilter,
        limit: usize,
    ) -> Result<Vec<Quiz>, StoreError> {
        Ok(self
            .quizzes
            .read()
            .iter()
            .filter(|q| filter.matches(q))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), StoreError> {
        self.attempts.write().push(attempt.clone());
        Ok(())
    }

    async fn list_attempts(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<QuizAttempt>, StoreError> {
        Ok(self
            .attempts
            .read()
            .iter()
            .filter(|a| a.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_progress(&self, key: &ProgressKey) -> Result<Option<TopicProgress>, StoreError> {
        Ok(self.progress.read().get(key).cloned())
    }

    async fn upsert_progress(
        &self,
        progress: &TopicProgress,
        expected_version: Option<i64>,
    ) -> Result<TopicProgress, StoreError> {
        let key = progress.key();
        let mut records = self.progress.write();
        let current = records.get(&key).map(|p| p.version);
        if current != expected_version {
            return Err(StoreError::Conflict);
        }

        let mut stored = progress.clone();
        stored.version = expected_version.map_or(1, |v| v + 1);
        records.insert(key, stored.clone());
        Ok(stored)
    }

    async fn list_progress(
        &self,
        user_id: &str,
        subject: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TopicProgress>, StoreError> {
        Ok(self
            .progress
            .read()
            .values()
            .filter(|p| p.user_id == user_id)
            .filter(|p| subject.map_or(true, |s| s == p.subject))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_chat_session(&self, id: &str) -> Result<Option<ChatSession>, StoreError> {
        Ok(self.sessions.read().get(id).cloned())
    }

    async fn save_chat_session(
        &self,
        session: &ChatSession,
        expected_version: Option<i64>,
    ) -> Result<ChatSession, StoreError> {
        let mut sessions = self.sessions.write();
        let current = sessions.get(&session.id).map(|s| s.version);
        if current != expected_version {
            return Err(StoreError::Conflict);
        }

        let mut stored = session.clone();
        stored.version = expected_version.map_or(1, |v| v + 1);
        sessions.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn list_chat_sessions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatSession>, StoreError> {
        let mut sessions: Vec<ChatSession> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::Stream;

    fn sample(user_id: &str, topic: &str) -> TopicProgress {
        TopicProgress {
            user_id: user_id.to_string(),
            stream: Stream::Cbse,
            class_level: 9,
            subject: "Math".to_string(),
            topic: topic.to_string(),
            mastery_level: 0.0,
            time_spent: 0,
            quiz_attempts: 0,
            average_score: 0.0,
            last_accessed: Utc::now(),
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_then_duplicate_insert_conflicts() {
        let store = MemoryStore::new();
        let stored = store
            .upsert_progress(&sample("u1", "Algebra"), None)
            .await
            .unwrap();
        assert_eq!(stored.version, 1);

        let err = store.upsert_progress(&sample("u1", "Algebra"), None).await;
        assert!(matches!(err, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let store = MemoryStore::new();
        let first = store
            .upsert_progress(&sample("u1", "Algebra"), None)
            .await
            .unwrap();
        let second = store.upsert_progress(&first, Some(first.version)).await.unwrap();
        assert_eq!(second.version, 2);

        let stale = store.upsert_progress(&first, Some(first.version)).await;
        assert!(matches!(stale, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn test_list_progress_scopes_by_user_and_subject() {
        let store = MemoryStore::new();
        store.upsert_progress(&sample("u1", "Algebra"), None).await.unwrap();
        store.upsert_progress(&sample("u1", "Geometry"), None).await.unwrap();
        store.upsert_progress(&sample("u2", "Algebra"), None).await.unwrap();

        let mine = store.list_progress("u1", None, 100).await.unwrap();
        assert_eq!(mine.len(), 2);
        let none = store.list_progress("u1", Some("Physics"), 100).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_chat_save_rejects_stale_snapshot() {
        let now = Utc::now();
        let session = ChatSession {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            subject: None,
            topic: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        let store = MemoryStore::new();
        let first = store.save_chat_session(&session, None).await.unwrap();
        assert_eq!(first.version, 1);
        assert!(matches!(
            store.save_chat_session(&session, None).await,
            Err(StoreError::Conflict)
        ));

        let second = store.save_chat_session(&first, Some(1)).await.unwrap();
        assert_eq!(second.version, 2);
        assert!(matches!(
            store.save_chat_session(&first, Some(1)).await,
            Err(StoreError::Conflict)
        ));
    }
}
