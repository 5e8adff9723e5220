use std::collections::BTreeMap;

use crate::db::DatabaseProxy;
use crate::error::CoreError;
use crate::types::{DashboardSummary, QuizAttempt, SubjectStats, TopicProgress};

const DASHBOARD_FETCH_LIMIT: usize = 1000;

pub async fn summarize(
    proxy: &DatabaseProxy,
    user_id: &str,
) -> Result<DashboardSummary, CoreError> {
    let progress = proxy
        .list_progress(user_id, None, DASHBOARD_FETCH_LIMIT)
        .await?;
    let attempts = proxy.list_attempts(user_id, DASHBOARD_FETCH_LIMIT).await?;
    Ok(aggregate(&progress, &attempts))
}

pub fn aggregate(progress: &[TopicProgress], attempts: &[QuizAttempt]) -> DashboardSummary {
    let average_quiz_score = if attempts.is_empty() {
        0.0
    } else {
        let total: f64 = attempts.iter().map(|a| a.score).sum();
        round2(total / attempts.len() as f64)
    };

    // average_mastery holds the running sum until the final pass.
    let mut subject_stats: BTreeMap<String, SubjectStats> = BTreeMap::new();
    for record in progress {
        let stats = subject_stats
            .entry(record.subject.clone())
            .or_insert(SubjectStats {
                topics_studied: 0,
                time_spent: 0,
                average_mastery: 0.0,
            });
        stats.topics_studied += 1;
        stats.time_spent = stats.time_spent.saturating_add(record.time_spent);
        stats.average_mastery += record.mastery_level;
    }

    for stats in subject_stats.values_mut() {
        if stats.topics_studied > 0 {
            stats.average_mastery /= stats.topics_studied as f64;
        }
    }

    DashboardSummary {
        total_topics_studied: progress.len() as i64,
        total_time_spent: progress
            .iter()
            .fold(0i64, |total, p| total.saturating_add(p.time_spent)),
        total_quizzes_completed: attempts.len() as i64,
        average_quiz_score,
        subject_stats,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::Stream;

    fn progress(subject: &str, topic: &str, mastery: f64, minutes: i64) -> TopicProgress {
        TopicProgress {
            user_id: "u1".to_string(),
            stream: Stream::Cbse,
            class_level: 9,
            subject: subject.to_string(),
            topic: topic.to_string(),
            mastery_level: mastery,
            time_spent: minutes,
            quiz_attempts: 1,
            average_score: mastery,
            last_accessed: Utc::now(),
            version: 1,
        }
    }

    fn attempt(score: f64) -> QuizAttempt {
        QuizAttempt {
            id: uuid::Uuid::new_v4().to_string(),
            quiz_id: "q".to_string(),
            user_id: "u1".to_string(),
            answers: vec![],
            score,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_history_is_all_zero() {
        let summary = aggregate(&[], &[]);
        assert_eq!(summary.total_topics_studied, 0);
        assert_eq!(summary.total_time_spent, 0);
        assert_eq!(summary.total_quizzes_completed, 0);
        assert_eq!(summary.average_quiz_score, 0.0);
        assert!(summary.subject_stats.is_empty());
    }

    #[test]
    fn test_subject_grouping() {
        let records = [
            progress("Math", "Algebra", 80.0, 30),
            progress("Math", "Geometry", 60.0, 20),
            progress("Physics", "Optics", 40.0, 5),
        ];
        let summary = aggregate(&records, &[]);
        let math = &summary.subject_stats["Math"];
        assert_eq!(math.topics_studied, 2);
        assert_eq!(math.time_spent, 50);
        assert!((math.average_mastery - 70.0).abs() < 1e-9);
        assert_eq!(summary.total_time_spent, 55);
        assert_eq!(summary.subject_stats.len(), 2);
    }

    #[test]
    fn test_average_quiz_score_rounded() {
        let summary = aggregate(&[], &[attempt(100.0), attempt(66.666), attempt(0.0)]);
        assert_eq!(summary.total_quizzes_completed, 3);
        assert_eq!(summary.average_quiz_score, 55.56);
    }

    #[test]
    fn test_time_totals_saturate() {
        let records = [
            progress("Math", "Algebra", 50.0, i64::MAX),
            progress("Math", "Geometry", 50.0, 10),
        ];
        let summary = aggregate(&records, &[]);
        assert_eq!(summary.total_time_spent, i64::MAX);
        assert_eq!(summary.subject_stats["Math"].time_spent, i64::MAX);
    }
}
