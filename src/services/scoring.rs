// src/services/scoring.rs

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::models::{
    attempt::{QuestionResult, ScoreBreakdown, SubmittedAnswer},
    quiz::{Question, QuestionKind},
};

/// Grades a submission against the quiz's question list.
///
/// Pure function: no I/O, no side effects. The per-question rules:
/// * single choice / true-false: exact equality with the key.
/// * multi select: the submitted index set must equal the key set exactly;
///   subsets and supersets earn nothing.
/// * short answer: trimmed, case-insensitive match against the reference.
/// * essay: never auto-scored; earns zero and is flagged for manual review.
///
/// An answer whose JSON shape does not fit the question's type is scored
/// incorrect (zero points) and logged at debug level. Unanswered questions
/// score zero. A quiz with zero total points grades to 0%, never a division
/// error.
pub fn score(
    questions: &[Question],
    answers: &HashMap<Uuid, SubmittedAnswer>,
) -> ScoreBreakdown {
    let mut earned_points = 0;
    let mut total_points = 0;
    let mut correct_count = 0;
    let mut results = Vec::with_capacity(questions.len());

    for question in questions {
        total_points += question.points;

        let needs_review = matches!(question.kind, QuestionKind::Essay);
        let correct = grade_question(question, answers.get(&question.id));
        let earned = if correct { question.points } else { 0 };

        if correct {
            earned_points += question.points;
            correct_count += 1;
        }

        results.push(QuestionResult {
            question_id: question.id,
            correct,
            earned_points: earned,
            possible_points: question.points,
            needs_review,
        });
    }

    let percentage = if total_points > 0 {
        ((earned_points as f64 / total_points as f64) * 100.0).round() as i32
    } else {
        0
    };

    ScoreBreakdown {
        percentage,
        earned_points,
        total_points,
        correct_count,
        results,
    }
}

fn grade_question(question: &Question, answer: Option<&SubmittedAnswer>) -> bool {
    let Some(answer) = answer else {
        return false;
    };

    match (&question.kind, answer) {
        (QuestionKind::SingleChoice { answer: key, .. }, SubmittedAnswer::Choice(submitted)) => {
            submitted == key
        }
        (QuestionKind::TrueFalse { answer: key }, SubmittedAnswer::Flag(submitted)) => {
            submitted == key
        }
        (QuestionKind::MultiSelect { answers: key, .. }, SubmittedAnswer::Selection(submitted)) => {
            // Set equality; no partial credit for subsets or supersets.
            let key: BTreeSet<usize> = key.iter().copied().collect();
            let submitted: BTreeSet<usize> = submitted.iter().copied().collect();
            submitted == key
        }
        (QuestionKind::ShortAnswer { answer: key }, SubmittedAnswer::Text(submitted)) => {
            submitted.trim().to_lowercase() == key.trim().to_lowercase()
        }
        (QuestionKind::Essay, _) => false,
        (_, submitted) => {
            tracing::debug!(
                question_id = %question.id,
                question_type = question.kind_name(),
                ?submitted,
                "answer shape does not match question type; scored as incorrect"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(points: i32, kind: QuestionKind) -> Question {
        Question {
            id: Uuid::new_v4(),
            prompt: "q".to_string(),
            points,
            explanation: None,
            kind,
        }
    }

    fn single(points: i32, options: usize, answer: usize) -> Question {
        question(
            points,
            QuestionKind::SingleChoice {
                options: (0..options).map(|i| format!("opt {i}")).collect(),
                answer,
            },
        )
    }

    #[test]
    fn perfect_single_choice() {
        let q = single(10, 4, 2);
        let answers = HashMap::from([(q.id, SubmittedAnswer::Choice(2))]);

        let result = score(&[q], &answers);
        assert_eq!(result.percentage, 100);
        assert_eq!(result.earned_points, 10);
        assert_eq!(result.correct_count, 1);
        assert!(result.results[0].correct);
    }

    #[test]
    fn wrong_single_choice_scores_zero() {
        let q = single(10, 4, 2);
        let answers = HashMap::from([(q.id, SubmittedAnswer::Choice(3))]);

        let result = score(&[q], &answers);
        assert_eq!(result.percentage, 0);
        assert_eq!(result.earned_points, 0);
    }

    #[test]
    fn true_false_exact_match() {
        let q = question(10, QuestionKind::TrueFalse { answer: true });
        let answers = HashMap::from([(q.id, SubmittedAnswer::Flag(true))]);

        let result = score(&[q], &answers);
        assert!(result.results[0].correct);
        assert_eq!(result.results[0].earned_points, 10);
    }

    #[test]
    fn multi_select_requires_exact_set() {
        let q = question(
            5,
            QuestionKind::MultiSelect {
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                answers: vec![0, 1, 2],
            },
        );

        // Strict subset: no partial credit.
        let subset = HashMap::from([(q.id, SubmittedAnswer::Selection(vec![0, 1]))]);
        assert_eq!(score(std::slice::from_ref(&q), &subset).earned_points, 0);

        // Superset: still wrong.
        let superset = HashMap::from([(q.id, SubmittedAnswer::Selection(vec![0, 1, 2, 3]))]);
        assert_eq!(score(std::slice::from_ref(&q), &superset).earned_points, 0);

        // Exact set, order-insensitive.
        let exact = HashMap::from([(q.id, SubmittedAnswer::Selection(vec![2, 0, 1]))]);
        let result = score(&[q], &exact);
        assert_eq!(result.earned_points, 5);
        assert_eq!(result.percentage, 100);
    }

    #[test]
    fn short_answer_trims_and_case_folds() {
        let q = question(
            10,
            QuestionKind::ShortAnswer {
                answer: "Gradient Descent".to_string(),
            },
        );
        let answers = HashMap::from([(
            q.id,
            SubmittedAnswer::Text("  gradient descent  ".to_string()),
        )]);

        let result = score(&[q], &answers);
        assert!(result.results[0].correct);
    }

    #[test]
    fn essay_is_flagged_not_scored() {
        let q = question(20, QuestionKind::Essay);
        let answers = HashMap::from([(q.id, SubmittedAnswer::Text("my essay".to_string()))]);

        let result = score(&[q], &answers);
        assert!(!result.results[0].correct);
        assert!(result.results[0].needs_review);
        assert_eq!(result.earned_points, 0);
        // Essay points still count toward the total.
        assert_eq!(result.total_points, 20);
    }

    #[test]
    fn zero_total_points_scores_zero_percent() {
        let result = score(&[], &HashMap::new());
        assert_eq!(result.percentage, 0);
        assert_eq!(result.total_points, 0);
    }

    #[test]
    fn mismatched_answer_shape_scores_zero() {
        let q = single(10, 4, 1);
        let answers = HashMap::from([(q.id, SubmittedAnswer::Text("one".to_string()))]);

        let result = score(&[q], &answers);
        assert_eq!(result.earned_points, 0);
        assert!(!result.results[0].correct);
    }

    #[test]
    fn unanswered_questions_score_zero() {
        let q1 = single(10, 4, 0);
        let q2 = single(10, 4, 1);
        let answers = HashMap::from([(q1.id, SubmittedAnswer::Choice(0))]);

        let result = score(&[q1, q2], &answers);
        assert_eq!(result.correct_count, 1);
        assert_eq!(result.percentage, 50);
    }

    #[test]
    fn percentage_rounds_to_nearest() {
        // 2 of 3 equal-weight questions: 66.67 rounds to 67.
        let qs: Vec<Question> = (0..3).map(|_| single(10, 4, 0)).collect();
        let answers = HashMap::from([
            (qs[0].id, SubmittedAnswer::Choice(0)),
            (qs[1].id, SubmittedAnswer::Choice(0)),
            (qs[2].id, SubmittedAnswer::Choice(3)),
        ]);

        let result = score(&qs, &answers);
        assert_eq!(result.percentage, 67);
    }
}
