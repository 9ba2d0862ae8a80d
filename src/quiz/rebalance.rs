//! Answer rebalancer
//!
//! Moves each question's correct option to the least-used position so far.
//! Distractors keep their relative order, so the result is deterministic.

use tracing::info;

use super::model::{Question, Quiz, QuizValidationError, OPTION_COUNT};
use super::quality::position_counts;

/// Index of the smallest count, lowest index on ties.
fn least_used(counts: &[usize; OPTION_COUNT]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate().skip(1) {
        if c < counts[best] {
            best = i;
        }
    }
    best
}

/// Move the correct option of `question` to `target`.
fn place_answer(question: &Question, from: usize, target: usize) -> Question {
    let mut options = question.options.clone();
    let answer = options.remove(from);
    options.insert(target, answer);
    Question { question: question.question.clone(), options, answer: question.answer.clone() }
}

/// Greedy single-pass rebalance. Invalid quizzes are rejected untouched.
pub fn rebalance(quiz: &Quiz) -> Result<Quiz, QuizValidationError> {
    quiz.validate()?;

    let mut running = [0usize; OPTION_COUNT];
    let mut moved = 0;
    let mut questions = Vec::with_capacity(quiz.len());
    for question in &quiz.questions {
        let target = least_used(&running);
        running[target] += 1;
        // validate() guarantees the answer matches an option
        match question.answer_index() {
            Some(from) if from != target => {
                moved += 1;
                questions.push(place_answer(question, from, target));
            }
            _ => questions.push(question.clone()),
        }
    }

    let rebalanced = Quiz::new(questions);
    info!(
        "Rebalanced quiz: moved {} of {} answers, positions {:?} -> {:?}",
        moved,
        quiz.len(),
        position_counts(quiz),
        position_counts(&rebalanced)
    );
    Ok(rebalanced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::quality::evenness_score;

    fn q(answer_at: usize) -> Question {
        let options: Vec<String> = ["w", "x", "y", "z"].iter().map(|s| s.to_string()).collect();
        Question { question: format!("q{}", answer_at), answer: options[answer_at].clone(), options }
    }

    #[test]
    fn test_least_used_tie_breaks_low() {
        assert_eq!(least_used(&[0, 0, 0, 0]), 0);
        assert_eq!(least_used(&[1, 0, 0, 1]), 1);
        assert_eq!(least_used(&[2, 2, 1, 1]), 2);
    }

    #[test]
    fn test_distractor_order_kept() {
        let moved = place_answer(&q(0), 0, 2);
        assert_eq!(moved.options, vec!["x", "y", "w", "z"]);
        assert_eq!(moved.answer, "w");
        let moved = place_answer(&q(3), 3, 1);
        assert_eq!(moved.options, vec!["w", "z", "x", "y"]);
    }

    #[test]
    fn test_all_first_becomes_uniform() {
        let quiz = Quiz::new(vec![q(0), q(0), q(0), q(0)]);
        let out = rebalance(&quiz).unwrap();
        assert_eq!(position_counts(&out), [1, 1, 1, 1]);
        assert_eq!(evenness_score(&position_counts(&out)), 1.0);
    }

    #[test]
    fn test_deterministic() {
        let quiz = Quiz::new(vec![q(2), q(2), q(1), q(3), q(0), q(2)]);
        assert_eq!(rebalance(&quiz).unwrap(), rebalance(&quiz).unwrap());
    }

    #[test]
    fn test_invalid_quiz_rejected() {
        let mut bad = q(0);
        bad.answer = "nope".to_string();
        assert!(rebalance(&Quiz::new(vec![bad])).is_err());
    }
}
