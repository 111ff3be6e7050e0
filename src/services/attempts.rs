// src/services/attempts.rs

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        analytics::{QuestionStat, QuizAnalytics},
        attempt::{Attempt, Eligibility, NewAttempt, SubmittedAnswer},
        quiz::Quiz,
    },
    services::scoring,
    store::Store,
};

/// Persists quiz attempts and maintains each quiz's rolling statistics.
///
/// Scoring happens fully before persistence; the statistics recomputation
/// runs after the attempt insert and reads the full attempt set at that
/// moment. Concurrent submissions may interleave their recomputations -
/// last writer wins on the statistics fields, and a momentarily stale
/// average is acceptable. The attempt row itself is never lost.
#[derive(Clone)]
pub struct AttemptService {
    store: Arc<dyn Store>,
}

impl AttemptService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Whether the student may take the quiz, and how many attempts remain.
    pub async fn eligibility(
        &self,
        quiz_id: i64,
        student_id: i64,
    ) -> Result<Eligibility, AppError> {
        let quiz = self
            .store
            .quiz_by_id(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

        let attempts_used = self.store.attempt_count(quiz_id, student_id).await?;

        if !quiz.is_published() {
            return Ok(Eligibility {
                can_take: false,
                attempts_used,
                attempts_remaining: 0,
                reason: Some("unavailable"),
            });
        }

        let attempts_remaining = (quiz.max_attempts as i64 - attempts_used).max(0);
        if attempts_remaining == 0 {
            return Ok(Eligibility {
                can_take: false,
                attempts_used,
                attempts_remaining: 0,
                reason: Some("attempts_exhausted"),
            });
        }

        Ok(Eligibility {
            can_take: true,
            attempts_used,
            attempts_remaining,
            reason: None,
        })
    }

    /// Scores and persists one submission.
    ///
    /// Preconditions: the quiz exists, is published, and the student has
    /// attempts left. Violations surface as NotFound / Unavailable /
    /// AttemptsExhausted; none are retried here.
    pub async fn submit(
        &self,
        quiz_id: i64,
        student_id: i64,
        answers: HashMap<Uuid, SubmittedAnswer>,
        time_spent_secs: i32,
    ) -> Result<Attempt, AppError> {
        let quiz = self
            .store
            .quiz_by_id(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

        if !quiz.is_published() {
            return Err(AppError::Unavailable("Quiz is not published".to_string()));
        }

        let attempts_used = self.store.attempt_count(quiz_id, student_id).await?;
        if attempts_used >= quiz.max_attempts as i64 {
            return Err(AppError::AttemptsExhausted(format!(
                "All {} attempts used for this quiz",
                quiz.max_attempts
            )));
        }

        let breakdown = scoring::score(&quiz.questions.0, &answers);
        let passed = breakdown.percentage >= quiz.passing_score;

        let attempt = self
            .store
            .insert_attempt(NewAttempt {
                quiz_id,
                student_id,
                answers,
                breakdown: breakdown.results,
                score: breakdown.percentage,
                earned_points: breakdown.earned_points,
                total_points: breakdown.total_points,
                correct_count: breakdown.correct_count,
                time_spent_secs,
                passed,
            })
            .await?;

        // Rolling statistics are eventually consistent: recompute from the
        // full attempt set and patch. A failure here must not lose the
        // attempt that was already persisted.
        if let Err(e) = self.refresh_quiz_stats(quiz_id).await {
            tracing::warn!(quiz_id, error = %e, "failed to refresh quiz statistics");
        }

        Ok(attempt)
    }

    async fn refresh_quiz_stats(&self, quiz_id: i64) -> Result<(), AppError> {
        let attempts = self.store.attempts_for_quiz(quiz_id).await?;
        let total = attempts.len() as i64;
        let average = if total > 0 {
            attempts.iter().map(|a| a.score as f64).sum::<f64>() / total as f64
        } else {
            0.0
        };
        self.store.patch_quiz_stats(quiz_id, total, average).await
    }

    /// Aggregate attempt statistics for the owning tutor.
    pub async fn quiz_analytics(
        &self,
        quiz_id: i64,
        tutor_id: i64,
    ) -> Result<QuizAnalytics, AppError> {
        let quiz = self
            .store
            .quiz_by_id(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

        if quiz.tutor_id != tutor_id {
            return Err(AppError::Forbidden(
                "Only the owning tutor can view quiz analytics".to_string(),
            ));
        }

        let attempts = self.store.attempts_for_quiz(quiz_id).await?;
        Ok(aggregate_quiz(&quiz, &attempts))
    }
}

/// Pure aggregation over a quiz's full attempt set. An empty set degrades
/// to zeros rather than an error.
fn aggregate_quiz(quiz: &Quiz, attempts: &[Attempt]) -> QuizAnalytics {
    let total_attempts = attempts.len() as i64;

    let average_score = if total_attempts > 0 {
        attempts.iter().map(|a| a.score as f64).sum::<f64>() / total_attempts as f64
    } else {
        0.0
    };

    let pass_rate = if total_attempts > 0 {
        let passed = attempts.iter().filter(|a| a.passed).count();
        ((passed as f64 / total_attempts as f64) * 100.0).round() as i32
    } else {
        0
    };

    let mut score_distribution = [0i64; 5];
    for attempt in attempts {
        let bucket = match attempt.score {
            0..=59 => 0,
            60..=69 => 1,
            70..=79 => 2,
            80..=89 => 3,
            _ => 4,
        };
        score_distribution[bucket] += 1;
    }

    let question_stats = quiz
        .questions
        .0
        .iter()
        .map(|question| {
            let mut answered = 0i64;
            let mut correct = 0i64;
            for attempt in attempts {
                if let Some(result) = attempt
                    .breakdown
                    .0
                    .iter()
                    .find(|r| r.question_id == question.id)
                {
                    answered += 1;
                    if result.correct {
                        correct += 1;
                    }
                }
            }
            let correct_rate = if answered > 0 {
                ((correct as f64 / answered as f64) * 100.0).round() as i32
            } else {
                0
            };
            QuestionStat {
                question_id: question.id,
                prompt: question.prompt.clone(),
                attempts: answered,
                correct_rate,
            }
        })
        .collect();

    QuizAnalytics {
        quiz_id: quiz.id,
        total_attempts,
        average_score,
        pass_rate,
        score_distribution,
        question_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::course::status;
    use crate::models::quiz::{NewQuiz, Question, QuestionKind};
    use crate::store::MemoryStore;

    fn published_quiz(max_attempts: i32, passing_score: i32) -> NewQuiz {
        NewQuiz {
            course_id: 1,
            tutor_id: 1,
            title: "Basics".to_string(),
            description: String::new(),
            questions: vec![
                Question {
                    id: Uuid::new_v4(),
                    prompt: "2 + 2 = 4?".to_string(),
                    points: 10,
                    explanation: None,
                    kind: QuestionKind::TrueFalse { answer: true },
                },
                Question {
                    id: Uuid::new_v4(),
                    prompt: "Pick the even number".to_string(),
                    points: 10,
                    explanation: None,
                    kind: QuestionKind::SingleChoice {
                        options: vec!["3".into(), "4".into()],
                        answer: 1,
                    },
                },
            ],
            time_limit_minutes: None,
            max_attempts,
            passing_score,
            shuffle_questions: false,
            shuffle_options: false,
            show_results: true,
            show_answers: false,
            status: status::PUBLISHED.to_string(),
        }
    }

    #[tokio::test]
    async fn submit_scores_and_refreshes_stats() {
        let store = Arc::new(MemoryStore::new());
        let service = AttemptService::new(store.clone());
        let quiz = store.insert_quiz(published_quiz(3, 60)).await.unwrap();
        let q = &quiz.questions.0;

        let answers = HashMap::from([
            (q[0].id, SubmittedAnswer::Flag(true)),
            (q[1].id, SubmittedAnswer::Choice(1)),
        ]);
        let attempt = service.submit(quiz.id, 42, answers, 120).await.unwrap();

        assert_eq!(attempt.score, 100);
        assert!(attempt.passed);
        assert_eq!(attempt.correct_count, 2);

        let refreshed = store.quiz_by_id(quiz.id).await.unwrap().unwrap();
        assert_eq!(refreshed.total_attempts, 1);
        assert_eq!(refreshed.average_score, 100.0);
    }

    #[tokio::test]
    async fn failing_score_sets_passed_false() {
        let store = Arc::new(MemoryStore::new());
        let service = AttemptService::new(store.clone());
        let quiz = store.insert_quiz(published_quiz(3, 60)).await.unwrap();
        let q = &quiz.questions.0;

        let answers = HashMap::from([(q[0].id, SubmittedAnswer::Flag(true))]);
        let attempt = service.submit(quiz.id, 42, answers, 30).await.unwrap();

        assert_eq!(attempt.score, 50);
        assert!(!attempt.passed);
    }

    #[tokio::test]
    async fn attempt_quota_is_enforced() {
        let store = Arc::new(MemoryStore::new());
        let service = AttemptService::new(store.clone());
        let quiz = store.insert_quiz(published_quiz(1, 60)).await.unwrap();

        service
            .submit(quiz.id, 42, HashMap::new(), 10)
            .await
            .unwrap();

        let eligibility = service.eligibility(quiz.id, 42).await.unwrap();
        assert!(!eligibility.can_take);
        assert_eq!(eligibility.attempts_used, 1);
        assert_eq!(eligibility.attempts_remaining, 0);
        assert_eq!(eligibility.reason, Some("attempts_exhausted"));

        let err = service
            .submit(quiz.id, 42, HashMap::new(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AttemptsExhausted(_)));

        // Another student is unaffected by the first student's quota.
        let other = service.eligibility(quiz.id, 43).await.unwrap();
        assert!(other.can_take);
    }

    #[tokio::test]
    async fn unpublished_quiz_is_unavailable() {
        let store = Arc::new(MemoryStore::new());
        let service = AttemptService::new(store.clone());
        let mut new_quiz = published_quiz(3, 60);
        new_quiz.status = status::DRAFT.to_string();
        let quiz = store.insert_quiz(new_quiz).await.unwrap();

        let eligibility = service.eligibility(quiz.id, 42).await.unwrap();
        assert!(!eligibility.can_take);
        assert_eq!(eligibility.reason, Some("unavailable"));

        let err = service
            .submit(quiz.id, 42, HashMap::new(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));
    }

    #[tokio::test]
    async fn missing_quiz_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let service = AttemptService::new(store);

        let err = service.eligibility(999, 42).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn rolling_average_tracks_all_attempts() {
        let store = Arc::new(MemoryStore::new());
        let service = AttemptService::new(store.clone());
        let quiz = store.insert_quiz(published_quiz(5, 60)).await.unwrap();
        let q = &quiz.questions.0;

        // 100% then 0%.
        let full = HashMap::from([
            (q[0].id, SubmittedAnswer::Flag(true)),
            (q[1].id, SubmittedAnswer::Choice(1)),
        ]);
        service.submit(quiz.id, 1, full, 10).await.unwrap();
        service.submit(quiz.id, 2, HashMap::new(), 10).await.unwrap();

        let refreshed = store.quiz_by_id(quiz.id).await.unwrap().unwrap();
        assert_eq!(refreshed.total_attempts, 2);
        assert_eq!(refreshed.average_score, 50.0);
    }

    #[tokio::test]
    async fn quiz_analytics_requires_ownership() {
        let store = Arc::new(MemoryStore::new());
        let service = AttemptService::new(store.clone());
        let quiz = store.insert_quiz(published_quiz(3, 60)).await.unwrap();

        let err = service.quiz_analytics(quiz.id, 999).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let analytics = service.quiz_analytics(quiz.id, 1).await.unwrap();
        assert_eq!(analytics.total_attempts, 0);
        assert_eq!(analytics.pass_rate, 0);
    }

    #[tokio::test]
    async fn quiz_analytics_aggregates_attempts() {
        let store = Arc::new(MemoryStore::new());
        let service = AttemptService::new(store.clone());
        let quiz = store.insert_quiz(published_quiz(5, 60)).await.unwrap();
        let q = &quiz.questions.0;

        let full = HashMap::from([
            (q[0].id, SubmittedAnswer::Flag(true)),
            (q[1].id, SubmittedAnswer::Choice(1)),
        ]);
        let half = HashMap::from([(q[0].id, SubmittedAnswer::Flag(true))]);
        service.submit(quiz.id, 1, full, 10).await.unwrap();
        service.submit(quiz.id, 2, half, 10).await.unwrap();

        let analytics = service.quiz_analytics(quiz.id, 1).await.unwrap();
        assert_eq!(analytics.total_attempts, 2);
        assert_eq!(analytics.average_score, 75.0);
        assert_eq!(analytics.pass_rate, 50);
        // One attempt in 0-59, one in 90-100.
        assert_eq!(analytics.score_distribution, [1, 0, 0, 0, 1]);
        // First question answered correctly by both attempts.
        assert_eq!(analytics.question_stats[0].correct_rate, 100);
        assert_eq!(analytics.question_stats[1].correct_rate, 50);
    }
}
