use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::db::config::DbConfig;
use crate::db::schema::{split_sql_statements, SCHEMA_VERSION, SQLITE_SCHEMA_SQL};
use crate::db::{DbInitError, DocumentStore, StoreError};
use crate::types::{ChatSession, ProgressKey, Quiz, QuizAttempt, QuizFilter, TopicProgress};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str, config: &DbConfig) -> Result<Self, DbInitError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DbInitError::Config(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(config.journal_mode.to_sqlx())
            .busy_timeout(config.busy_timeout);

        // Every pooled connection to `:memory:` would open its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        for stmt in split_sql_statements(SQLITE_SCHEMA_SQL) {
            sqlx::query(&stmt).execute(&self.pool).await?;
        }

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO "_db_metadata" ("key", "value")
            VALUES ('schema_version', ?)
            "#,
        )
        .bind(SCHEMA_VERSION)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_document<T: DeserializeOwned>(row: &SqliteRow) -> Result<T, StoreError> {
    let raw: String = row.try_get("document")?;
    serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn decode_all<T: DeserializeOwned>(rows: &[SqliteRow]) -> Result<Vec<T>, StoreError> {
    rows.iter().map(decode_document).collect()
}

// The "version" column is authoritative over the copy inside the document.
fn decode_progress(row: &SqliteRow) -> Result<TopicProgress, StoreError> {
    let mut progress: TopicProgress = decode_document(row)?;
    progress.version = row.try_get("version")?;
    Ok(progress)
}

fn decode_chat_session(row: &SqliteRow) -> Result<ChatSession, StoreError> {
    let mut session: ChatSession = decode_document(row)?;
    session.version = row.try_get("version")?;
    Ok(session)
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StoreError> {
        let document = serde_json::to_string(quiz)?;
        sqlx::query(
            r#"
            INSERT INTO "quizzes"
                ("id", "stream", "classLevel", "subject", "topic", "createdAt", "document")
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&quiz.id)
        .bind(quiz.stream.as_str())
        .bind(quiz.class_level)
        .bind(&quiz.subject)
        .bind(&quiz.topic)
        .bind(format_ts(&quiz.created_at))
        .bind(document)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_quiz(&self, id: &str) -> Result<Option<Quiz>, StoreError> {
        let row = sqlx::query(r#"SELECT "document" FROM "quizzes" WHERE "id" = ? LIMIT 1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_document).transpose()
    }

    async fn list_quizzes(
        &self,
        filter: &QuizFilter,
        limit: usize,
    ) -> Result<Vec<Quiz>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(r#"SELECT "document" FROM "quizzes" WHERE 1 = 1"#);
        if let Some(stream) = filter.stream {
            qb.push(r#" AND "stream" = "#).push_bind(stream.as_str());
        }
        if let Some(class_level) = filter.class_level {
            qb.push(r#" AND "classLevel" = "#).push_bind(class_level);
        }
        if let Some(subject) = filter.subject.as_deref() {
            qb.push(r#" AND "subject" = "#).push_bind(subject);
        }
        if let Some(topic) = filter.topic.as_deref() {
            qb.push(r#" AND "topic" = "#).push_bind(topic);
        }
        qb.push(r#" ORDER BY "createdAt" ASC LIMIT "#)
            .push_bind(limit as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        decode_all(&rows)
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), StoreError> {
        let document = serde_json::to_string(attempt)?;
        sqlx::query(
            r#"
            INSERT INTO "quiz_attempts" ("id", "quizId", "userId", "completedAt", "document")
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.quiz_id)
        .bind(&attempt.user_id)
        .bind(format_ts(&attempt.completed_at))
        .bind(document)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_attempts(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<QuizAttempt>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT "document" FROM "quiz_attempts"
            WHERE "userId" = ?
            ORDER BY "completedAt" ASC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        decode_all(&rows)
    }

    async fn get_progress(&self, key: &ProgressKey) -> Result<Option<TopicProgress>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT "version", "document" FROM "topic_progress"
            WHERE "userId" = ? AND "subject" = ? AND "topic" = ?
            LIMIT 1
            "#,
        )
        .bind(&key.user_id)
        .bind(&key.subject)
        .bind(&key.topic)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_progress).transpose()
    }

    async fn upsert_progress(
        &self,
        progress: &TopicProgress,
        expected_version: Option<i64>,
    ) -> Result<TopicProgress, StoreError> {
        let mut stored = progress.clone();
        stored.version = expected_version.map_or(1, |v| v + 1);
        let document = serde_json::to_string(&stored)?;

        let result = match expected_version {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO "topic_progress"
                        ("userId", "subject", "topic", "version", "document")
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT ("userId", "subject", "topic") DO NOTHING
                    "#,
                )
                .bind(&stored.user_id)
                .bind(&stored.subject)
                .bind(&stored.topic)
                .bind(stored.version)
                .bind(&document)
                .execute(&self.pool)
                .await?
            }
            Some(version) => {
                sqlx::query(
                    r#"
                    UPDATE "topic_progress" SET "version" = ?, "document" = ?
                    WHERE "userId" = ? AND "subject" = ? AND "topic" = ? AND "version" = ?
                    "#,
                )
                .bind(stored.version)
                .bind(&document)
                .bind(&stored.user_id)
                .bind(&stored.subject)
                .bind(&stored.topic)
                .bind(version)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(stored)
    }

    async fn list_progress(
        &self,
        user_id: &str,
        subject: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TopicProgress>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"SELECT "version", "document" FROM "topic_progress" WHERE "userId" = "#,
        );
        qb.push_bind(user_id);
        if let Some(subject) = subject {
            qb.push(r#" AND "subject" = "#).push_bind(subject);
        }
        qb.push(r#" ORDER BY "subject" ASC, "topic" ASC LIMIT "#)
            .push_bind(limit as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(decode_progress).collect()
    }

    async fn get_chat_session(&self, id: &str) -> Result<Option<ChatSession>, StoreError> {
        let row = sqlx::query(
            r#"SELECT "version", "document" FROM "chat_sessions" WHERE "id" = ? LIMIT 1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(decode_chat_session).transpose()
    }

    async fn save_chat_session(
        &self,
        session: &ChatSession,
        expected_version: Option<i64>,
    ) -> Result<ChatSession, StoreError> {
        let mut stored = session.clone();
        stored.version = expected_version.map_or(1, |v| v + 1);
        let document = serde_json::to_string(&stored)?;

        let result = match expected_version {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO "chat_sessions"
                        ("id", "userId", "updatedAt", "version", "document")
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT ("id") DO NOTHING
                    "#,
                )
                .bind(&stored.id)
                .bind(&stored.user_id)
                .bind(format_ts(&stored.updated_at))
                .bind(stored.version)
                .bind(&document)
                .execute(&self.pool)
                .await?
            }
            Some(version) => {
                sqlx::query(
                    r#"
                    UPDATE "chat_sessions" SET "updatedAt" = ?, "version" = ?, "document" = ?
                    WHERE "id" = ? AND "version" = ?
                    "#,
                )
                .bind(format_ts(&stored.updated_at))
                .bind(stored.version)
                .bind(&document)
                .bind(&stored.id)
                .bind(version)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(stored)
    }

    async fn list_chat_sessions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatSession>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT "version", "document" FROM "chat_sessions"
            WHERE "userId" = ?
            ORDER BY "updatedAt" DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode_chat_session).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
