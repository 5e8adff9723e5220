use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DatabaseProxy;
use crate::error::CoreError;
use crate::services::progress::ProgressLedger;
use crate::types::{
    DifficultyLevel, Quiz, QuizAttempt, QuizFilter, QuizQuestion, ScoreResult, Stream,
    OPTIONS_PER_QUESTION,
};

pub const QUIZ_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizInput {
    pub title: String,
    pub stream: Stream,
    pub class_level: i32,
    pub subject: String,
    pub topic: String,
    pub difficulty: DifficultyLevel,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutcome {
    pub score: f64,
    pub correct: usize,
    pub total: usize,
    pub attempt_id: String,
}

/// Grades `answers` against the quiz's key. Answers past the last question are
/// ignored and missing answers count as wrong.
pub fn score_answers(quiz: &Quiz, answers: &[u32]) -> ScoreResult {
    let total = quiz.questions.len();
    let correct = quiz
        .questions
        .iter()
        .zip(answers)
        .filter(|(question, answer)| question.correct_answer == **answer)
        .count();

    let score = if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64 * 100.0
    };

    ScoreResult {
        score,
        correct,
        total,
    }
}

/// Accepts only a JSON array of non-negative integers.
pub fn parse_answers(value: &serde_json::Value) -> Result<Vec<u32>, CoreError> {
    let items = value
        .as_array()
        .ok_or_else(|| CoreError::validation("answers must be an array"))?;

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            item.as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| {
                    CoreError::validation(format!("answer {idx} is not a valid option index"))
                })
        })
        .collect()
}

pub fn validate_quiz_input(input: &CreateQuizInput) -> Result<(), CoreError> {
    for (field, value) in [
        ("title", &input.title),
        ("subject", &input.subject),
        ("topic", &input.topic),
    ] {
        if value.trim().is_empty() {
            return Err(CoreError::validation(format!("{field} is required")));
        }
    }

    for (idx, question) in input.questions.iter().enumerate() {
        if question.options.len() != OPTIONS_PER_QUESTION {
            return Err(CoreError::validation(format!(
                "question {idx} must have exactly {OPTIONS_PER_QUESTION} options"
            )));
        }
        if question.correct_answer as usize >= OPTIONS_PER_QUESTION {
            return Err(CoreError::validation(format!(
                "question {idx} has correct answer outside 0..={}",
                OPTIONS_PER_QUESTION - 1
            )));
        }
    }

    Ok(())
}

pub async fn create_quiz(
    proxy: &DatabaseProxy,
    created_by: &str,
    input: CreateQuizInput,
) -> Result<Quiz, CoreError> {
    validate_quiz_input(&input)?;

    let quiz = Quiz {
        id: Uuid::new_v4().to_string(),
        title: input.title.trim().to_string(),
        stream: input.stream,
        class_level: input.class_level,
        subject: input.subject.trim().to_string(),
        topic: input.topic.trim().to_string(),
        difficulty: input.difficulty,
        questions: input.questions,
        created_by: created_by.to_string(),
        created_at: Utc::now(),
    };

    proxy.insert_quiz(&quiz).await?;
    Ok(quiz)
}

pub async fn list_quizzes(
    proxy: &DatabaseProxy,
    filter: &QuizFilter,
) -> Result<Vec<Quiz>, CoreError> {
    Ok(proxy.list_quizzes(filter, QUIZ_LIST_LIMIT).await?)
}

async fn load_quiz(proxy: &DatabaseProxy, quiz_id: &str) -> Result<Quiz, CoreError> {
    proxy
        .get_quiz(quiz_id)
        .await?
        .ok_or_else(|| CoreError::not_found("quiz", quiz_id))
}

/// Scores without recording anything.
pub async fn score_quiz(
    proxy: &DatabaseProxy,
    quiz_id: &str,
    answers: &[u32],
) -> Result<ScoreResult, CoreError> {
    let quiz = load_quiz(proxy, quiz_id).await?;
    Ok(score_answers(&quiz, answers))
}

/// Scores a submission, feeds the score to the ledger and then stores the
/// attempt. A ledger failure leaves no attempt behind, so resubmitting after a
/// retryable error records the submission once.
pub async fn submit_attempt(
    ledger: &ProgressLedger,
    quiz_id: &str,
    user_id: &str,
    answers: Vec<u32>,
) -> Result<AttemptOutcome, CoreError> {
    let proxy = ledger.proxy();
    let quiz = load_quiz(proxy, quiz_id).await?;
    let result = score_answers(&quiz, &answers);

    ledger
        .observe(user_id, &quiz.classification(), Some(result.score))
        .await?;

    let attempt = QuizAttempt {
        id: Uuid::new_v4().to_string(),
        quiz_id: quiz.id.clone(),
        user_id: user_id.to_string(),
        answers,
        score: result.score,
        completed_at: Utc::now(),
    };
    if let Err(err) = proxy.insert_attempt(&attempt).await {
        // Progress already absorbed the score; only the attempt log is short.
        tracing::warn!(
            quiz_id = %quiz.id,
            user_id,
            error = %err,
            "progress updated but attempt was not stored"
        );
        return Err(err.into());
    }

    Ok(AttemptOutcome {
        score: result.score,
        correct: result.correct,
        total: result.total,
        attempt_id: attempt.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct_answer: u32) -> QuizQuestion {
        QuizQuestion {
            question: "q".to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer,
            explanation: String::new(),
        }
    }

    fn quiz_with_key(key: &[u32]) -> Quiz {
        Quiz {
            id: "quiz-1".to_string(),
            title: "Fractions".to_string(),
            stream: Stream::Cbse,
            class_level: 8,
            subject: "Math".to_string(),
            topic: "Fractions".to_string(),
            difficulty: DifficultyLevel::Beginner,
            questions: key.iter().copied().map(question).collect(),
            created_by: "t1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_four_of_five_scores_eighty() {
        let quiz = quiz_with_key(&[0, 1, 2, 3, 0]);
        let result = score_answers(&quiz, &[0, 1, 1, 3, 0]);
        assert_eq!(result.correct, 4);
        assert_eq!(result.total, 5);
        assert!((result.score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_quiz_scores_zero() {
        let quiz = quiz_with_key(&[]);
        let result = score_answers(&quiz, &[0, 1, 2]);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.total, 0);
    }

    #[test]
    fn test_short_and_long_answer_sets() {
        let quiz = quiz_with_key(&[2, 2, 2]);
        assert_eq!(score_answers(&quiz, &[2]).correct, 1);
        assert_eq!(score_answers(&quiz, &[2, 2, 2, 2, 2, 2]).correct, 3);
    }

    #[test]
    fn test_parse_answers_rejects_non_integers() {
        assert_eq!(parse_answers(&serde_json::json!([0, 3, 1])).unwrap(), vec![0, 3, 1]);
        assert!(parse_answers(&serde_json::json!([0, 1.5])).is_err());
        assert!(parse_answers(&serde_json::json!([0, -1])).is_err());
        assert!(parse_answers(&serde_json::json!(["a"])).is_err());
        assert!(parse_answers(&serde_json::json!({"answers": []})).is_err());
    }

    #[test]
    fn test_quiz_validation() {
        let mut input = CreateQuizInput {
            title: "Fractions".into(),
            stream: Stream::Icse,
            class_level: 8,
            subject: "Math".into(),
            topic: "Fractions".into(),
            difficulty: DifficultyLevel::Beginner,
            questions: vec![question(3)],
        };
        assert!(validate_quiz_input(&input).is_ok());

        input.questions[0].correct_answer = 4;
        assert!(validate_quiz_input(&input).is_err());

        input.questions[0].correct_answer = 0;
        input.questions[0].options.pop();
        assert!(validate_quiz_input(&input).is_err());
    }

    #[tokio::test]
    async fn test_score_quiz_reads_without_recording() {
        let proxy = DatabaseProxy::in_memory(std::time::Duration::from_secs(1));
        let quiz = quiz_with_key(&[0, 1, 2, 3, 0]);
        proxy.insert_quiz(&quiz).await.unwrap();

        let result = score_quiz(&proxy, &quiz.id, &[0, 1, 1, 3, 0]).await.unwrap();
        assert_eq!(result.correct, 4);
        assert!(proxy.list_attempts("t1", 10).await.unwrap().is_empty());

        let missing = score_quiz(&proxy, "nope", &[0]).await.unwrap_err();
        assert!(matches!(missing, CoreError::NotFound { .. }));
    }
}
