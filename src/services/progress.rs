//! Per-(student, subject, topic) progress bookkeeping.
//!
//! The update rule lives in [`apply_observation`], which is pure. The ledger
//! wraps it in an optimistic read-modify-write loop against the store's
//! version-conditioned upsert, so concurrent observations on one key never
//! lose an increment.

use chrono::{DateTime, Utc};

use crate::db::{DatabaseProxy, StoreError};
use crate::error::CoreError;
use crate::types::{Classification, ProgressKey, TopicProgress};

pub const DEFAULT_MAX_UPSERT_ATTEMPTS: u32 = 5;
pub const PROGRESS_LIST_LIMIT: usize = 100;
/// Upper bound for one study-time observation: a full day.
pub const MAX_MINUTES_PER_OBSERVATION: i64 = 24 * 60;
const MASTERY_CAP: f64 = 100.0;

/// One activity event applied to a progress record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Quiz score percentage; `None` for passive study activity.
    pub score: Option<f64>,
    pub minutes_spent: i64,
}

impl Observation {
    pub fn scored(score: f64) -> Self {
        Self {
            score: Some(score),
            minutes_spent: 0,
        }
    }

    pub fn study_time(minutes_spent: i64) -> Self {
        Self {
            score: None,
            minutes_spent,
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        if let Some(score) = self.score {
            if !score.is_finite() {
                return Err(CoreError::validation("score must be a finite number"));
            }
        }
        if self.minutes_spent < 0 {
            return Err(CoreError::validation("minutes spent must not be negative"));
        }
        if self.minutes_spent > MAX_MINUTES_PER_OBSERVATION {
            return Err(CoreError::validation(format!(
                "minutes spent must be at most {MAX_MINUTES_PER_OBSERVATION}"
            )));
        }
        Ok(())
    }
}

/// Returns the record that results from applying `observation` to `prior`.
///
/// Classification is only taken from the caller when no prior record exists.
/// The returned record keeps the prior `version`; the store assigns the next one.
pub fn apply_observation(
    prior: Option<&TopicProgress>,
    user_id: &str,
    classification: &Classification,
    observation: &Observation,
    now: DateTime<Utc>,
) -> TopicProgress {
    match prior {
        Some(existing) => {
            let mut next = existing.clone();
            next.last_accessed = now;
            next.time_spent = next.time_spent.saturating_add(observation.minutes_spent);

            if let Some(score) = observation.score {
                let attempts_before = next.quiz_attempts;
                next.quiz_attempts += 1;
                next.average_score = (next.average_score * attempts_before as f64 + score)
                    / next.quiz_attempts as f64;
                next.mastery_level = next.average_score.min(MASTERY_CAP);
            }
            next
        }
        None => {
            let (quiz_attempts, average_score) = match observation.score {
                Some(score) => (1, score),
                None => (0, 0.0),
            };
            TopicProgress {
                user_id: user_id.to_string(),
                stream: classification.stream,
                class_level: classification.class_level,
                subject: classification.subject.clone(),
                topic: classification.topic.clone(),
                mastery_level: average_score.min(MASTERY_CAP),
                time_spent: observation.minutes_spent,
                quiz_attempts,
                average_score,
                last_accessed: now,
                version: 0,
            }
        }
    }
}

/// Sole writer of [`TopicProgress`] records.
#[derive(Clone)]
pub struct ProgressLedger {
    proxy: DatabaseProxy,
    max_attempts: u32,
}

impl ProgressLedger {
    pub fn new(proxy: DatabaseProxy, max_attempts: u32) -> Self {
        Self {
            proxy,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn proxy(&self) -> &DatabaseProxy {
        &self.proxy
    }

    /// Records a quiz result (`Some(score)`) or a bare visit (`None`).
    pub async fn observe(
        &self,
        user_id: &str,
        classification: &Classification,
        score: Option<f64>,
    ) -> Result<TopicProgress, CoreError> {
        let observation = Observation {
            score,
            minutes_spent: 0,
        };
        self.apply(user_id, classification, observation).await
    }

    pub async fn record_study_time(
        &self,
        user_id: &str,
        classification: &Classification,
        minutes: i64,
    ) -> Result<TopicProgress, CoreError> {
        self.apply(user_id, classification, Observation::study_time(minutes))
            .await
    }

    pub async fn apply(
        &self,
        user_id: &str,
        classification: &Classification,
        observation: Observation,
    ) -> Result<TopicProgress, CoreError> {
        observation.validate()?;
        validate_classification(classification)?;

        let key = ProgressKey::new(user_id, &classification.subject, &classification.topic);

        for _ in 0..self.max_attempts {
            let prior = self.proxy.get_progress(&key).await?;
            let next = apply_observation(
                prior.as_ref(),
                user_id,
                classification,
                &observation,
                Utc::now(),
            );

            match self
                .proxy
                .upsert_progress(&next, prior.as_ref().map(|p| p.version))
                .await
            {
                Ok(stored) => return Ok(stored),
                Err(StoreError::Conflict) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(CoreError::ConflictOnUpdate {
            attempts: self.max_attempts,
        })
    }

    pub async fn list_progress(&self, user_id: &str) -> Result<Vec<TopicProgress>, CoreError> {
        Ok(self
            .proxy
            .list_progress(user_id, None, PROGRESS_LIST_LIMIT)
            .await?)
    }

    pub async fn list_subject_progress(
        &self,
        user_id: &str,
        subject: &str,
    ) -> Result<Vec<TopicProgress>, CoreError> {
        Ok(self
            .proxy
            .list_progress(user_id, Some(subject), PROGRESS_LIST_LIMIT)
            .await?)
    }
}

fn validate_classification(classification: &Classification) -> Result<(), CoreError> {
    if classification.subject.trim().is_empty() || classification.topic.trim().is_empty() {
        return Err(CoreError::validation("subject and topic are required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stream;

    fn math_algebra() -> Classification {
        Classification {
            stream: Stream::Cbse,
            class_level: 10,
            subject: "Math".to_string(),
            topic: "Algebra".to_string(),
        }
    }

    fn apply(prior: Option<&TopicProgress>, observation: Observation) -> TopicProgress {
        apply_observation(prior, "u1", &math_algebra(), &observation, Utc::now())
    }

    #[test]
    fn test_first_scored_observation_seeds_record() {
        let record = apply(None, Observation::scored(80.0));
        assert_eq!(record.quiz_attempts, 1);
        assert_eq!(record.average_score, 80.0);
        assert_eq!(record.mastery_level, 80.0);
    }

    #[test]
    fn test_second_observation_takes_running_mean() {
        let first = apply(None, Observation::scored(80.0));
        let second = apply(Some(&first), Observation::scored(60.0));
        assert_eq!(second.quiz_attempts, 2);
        assert!((second.average_score - 70.0).abs() < 1e-9);
        assert!((second.mastery_level - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_unscored_first_observation_is_all_zero() {
        let record = apply(None, Observation::study_time(0));
        assert_eq!(record.quiz_attempts, 0);
        assert_eq!(record.average_score, 0.0);
        assert_eq!(record.mastery_level, 0.0);
    }

    #[test]
    fn test_zero_score_still_counts_as_attempt() {
        let record = apply(None, Observation::scored(0.0));
        assert_eq!(record.quiz_attempts, 1);
    }

    #[test]
    fn test_study_time_leaves_mastery_alone() {
        let now = Utc::now();
        let first = apply_observation(None, "u1", &math_algebra(), &Observation::scored(90.0), now);
        let later = now + chrono::Duration::minutes(5);
        let next = apply_observation(
            Some(&first),
            "u1",
            &math_algebra(),
            &Observation::study_time(25),
            later,
        );
        assert_eq!(next.quiz_attempts, 1);
        assert_eq!(next.mastery_level, 90.0);
        assert_eq!(next.time_spent, 25);
        assert_eq!(next.last_accessed, later);
    }

    #[test]
    fn test_classification_fixed_at_creation() {
        let first = apply(None, Observation::scored(50.0));
        let mut other = math_algebra();
        other.stream = Stream::Icse;
        other.class_level = 12;
        let next = apply_observation(
            Some(&first),
            "u1",
            &other,
            &Observation::scored(50.0),
            Utc::now(),
        );
        assert_eq!(next.stream, Stream::Cbse);
        assert_eq!(next.class_level, 10);
    }

    #[test]
    fn test_mastery_capped_when_average_overflows() {
        let first = apply(None, Observation::scored(150.0));
        assert_eq!(first.mastery_level, 100.0);
        let next = apply(Some(&first), Observation::scored(130.0));
        assert_eq!(next.mastery_level, 100.0);
        assert!(next.average_score > 100.0);
    }

    #[test]
    fn test_non_finite_score_rejected() {
        assert!(Observation::scored(f64::NAN).validate().is_err());
        assert!(Observation::study_time(-1).validate().is_err());
    }

    #[test]
    fn test_minutes_bounded_per_observation() {
        assert!(Observation::study_time(MAX_MINUTES_PER_OBSERVATION)
            .validate()
            .is_ok());
        assert!(Observation::study_time(MAX_MINUTES_PER_OBSERVATION + 1)
            .validate()
            .is_err());
        assert!(Observation::study_time(i64::MAX).validate().is_err());
    }

    #[test]
    fn test_time_spent_saturates_instead_of_wrapping() {
        let mut prior = apply(None, Observation::study_time(10));
        prior.time_spent = i64::MAX - 5;
        let next = apply(Some(&prior), Observation::study_time(MAX_MINUTES_PER_OBSERVATION));
        assert_eq!(next.time_spent, i64::MAX);
    }
}
