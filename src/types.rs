use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stream {
    #[serde(rename = "ICSE")]
    Icse,
    #[serde(rename = "CBSE")]
    Cbse,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Icse => "ICSE",
            Self::Cbse => "CBSE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ICSE" => Some(Self::Icse),
            "CBSE" => Some(Self::Cbse),
            _ => None,
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Teacher,
    Admin,
    Parent,
}

impl UserRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            "admin" => Some(Self::Admin),
            "parent" => Some(Self::Parent),
            _ => None,
        }
    }

    pub fn can_author_content(&self) -> bool {
        matches!(self, Self::Teacher | Self::Admin)
    }
}

/// Curriculum placement shared by quizzes and progress records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub stream: Stream,
    pub class_level: i32,
    pub subject: String,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: u32,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub stream: Stream,
    pub class_level: i32,
    pub subject: String,
    pub topic: String,
    pub difficulty: DifficultyLevel,
    pub questions: Vec<QuizQuestion>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Quiz {
    pub fn classification(&self) -> Classification {
        Classification {
            stream: self.stream,
            class_level: self.class_level,
            subject: self.subject.clone(),
            topic: self.topic.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizFilter {
    pub stream: Option<Stream>,
    pub class_level: Option<i32>,
    pub subject: Option<String>,
    pub topic: Option<String>,
}

impl QuizFilter {
    pub fn matches(&self, quiz: &Quiz) -> bool {
        self.stream.map_or(true, |s| s == quiz.stream)
            && self.class_level.map_or(true, |c| c == quiz.class_level)
            && self.subject.as_deref().map_or(true, |s| s == quiz.subject)
            && self.topic.as_deref().map_or(true, |t| t == quiz.topic)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub answers: Vec<u32>,
    pub score: f64,
    pub completed_at: DateTime<Utc>,
}

/// Identifies the single live progress record for a student and topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgressKey {
    pub user_id: String,
    pub subject: String,
    pub topic: String,
}

impl ProgressKey {
    pub fn new(user_id: &str, subject: &str, topic: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            subject: subject.to_string(),
            topic: topic.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    pub user_id: String,
    pub stream: Stream,
    pub class_level: i32,
    pub subject: String,
    pub topic: String,
    pub mastery_level: f64,
    pub time_spent: i64,
    pub quiz_attempts: i64,
    pub average_score: f64,
    pub last_accessed: DateTime<Utc>,
    /// Bumped on every persisted write; conditional updates compare against it.
    #[serde(default)]
    pub version: i64,
}

impl TopicProgress {
    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(&self.user_id, &self.subject, &self.topic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Zero until first saved; bumped on every save like [`TopicProgress::version`].
    #[serde(default)]
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub score: f64,
    pub correct: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SubjectStats {
    pub topics_studied: i64,
    pub time_spent: i64,
    pub average_mastery: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DashboardSummary {
    pub total_topics_studied: i64,
    pub total_time_spent: i64,
    pub total_quizzes_completed: i64,
    pub average_quiz_score: f64,
    pub subject_stats: BTreeMap<String, SubjectStats>,
}
