//! Quiz answer-position quality and rebalancing

use learnmap::quiz::quality::{best_achievable, evenness_score, position_counts};
use learnmap::quiz::{rebalance, Question, Quiz, QuizQualityChecker};

fn question(i: usize, answer_at: usize) -> Question {
    let options: Vec<String> = (0..4).map(|k| format!("q{} option {}", i, k)).collect();
    Question { question: format!("Question {}", i), answer: options[answer_at].clone(), options }
}

fn quiz_from_positions(positions: &[usize]) -> Quiz {
    Quiz::new(positions.iter().enumerate().map(|(i, &p)| question(i, p)).collect())
}

/// Every answer-position sequence of length `n`
fn all_sequences(n: usize) -> Vec<Vec<usize>> {
    (0..4usize.pow(n as u32))
        .map(|mut code| {
            (0..n)
                .map(|_| {
                    let digit = code % 4;
                    code /= 4;
                    digit
                })
                .collect()
        })
        .collect()
}

#[test]
fn test_scenario_a_all_first() {
    let quiz = quiz_from_positions(&[0, 0, 0, 0]);
    let checker = QuizQualityChecker::default();

    let before = checker.check(&quiz).unwrap();
    assert_eq!(before.score, 0.0);
    assert!(before.imbalanced);

    let balanced = rebalance(&quiz).unwrap();
    assert_eq!(position_counts(&balanced), [1, 1, 1, 1]);
    let after = checker.check(&balanced).unwrap();
    assert_eq!(after.score, 1.0);
    assert!(!after.imbalanced);
}

#[test]
fn test_rebalance_preserves_meaning() {
    let quiz = quiz_from_positions(&[3, 3, 1, 3, 0, 3, 2, 3, 3]);
    let balanced = rebalance(&quiz).unwrap();

    assert_eq!(balanced.len(), quiz.len());
    for (orig, new) in quiz.questions.iter().zip(&balanced.questions) {
        assert_eq!(orig.question, new.question);
        assert_eq!(orig.answer, new.answer);
        let mut a = orig.options.clone();
        let mut b = new.options.clone();
        a.sort();
        b.sort();
        assert_eq!(a, b);

        // Distractors keep their relative order
        let distractors = |q: &Question| -> Vec<String> {
            q.options.iter().filter(|o| **o != q.answer).cloned().collect()
        };
        assert_eq!(distractors(orig), distractors(new));
    }
    assert!(balanced.validate().is_ok());
}

#[test]
fn test_rebalance_never_regresses_and_meets_threshold() {
    let checker = QuizQualityChecker::new(0.9, 0.1);
    for n in 1..=5 {
        for positions in all_sequences(n) {
            let quiz = quiz_from_positions(&positions);
            let before = checker.check(&quiz).unwrap();
            let after = checker.check(&rebalance(&quiz).unwrap()).unwrap();
            assert!(after.score + 1e-12 >= before.score, "{:?}", positions);
            assert!(!after.imbalanced, "{:?} still imbalanced after rebalance", positions);
            assert!((after.score - best_achievable(n)).abs() < 1e-12, "{:?}", positions);
        }
    }
}

#[test]
fn test_rebalance_is_deterministic() {
    let quiz = quiz_from_positions(&[2, 0, 2, 2, 1, 0, 3]);
    assert_eq!(rebalance(&quiz).unwrap(), rebalance(&quiz).unwrap());
}

#[test]
fn test_feasibility_tolerance_for_small_quizzes() {
    let checker = QuizQualityChecker::new(1.0, 0.1);

    // n = 1..3 can never be uniform; the best placement still passes
    assert!(!checker.check(&quiz_from_positions(&[2])).unwrap().imbalanced);
    assert!(!checker.check(&quiz_from_positions(&[0, 1])).unwrap().imbalanced);
    assert!(!checker.check(&quiz_from_positions(&[0, 1, 2])).unwrap().imbalanced);

    // Anything worse than the best placement fails
    assert!(checker.check(&quiz_from_positions(&[0, 0])).unwrap().imbalanced);
    assert!(checker.check(&quiz_from_positions(&[0, 0, 1])).unwrap().imbalanced);

    assert!((checker.effective_threshold(3) - 2.0 / 3.0).abs() < 1e-12);
    assert!((checker.effective_threshold(2) - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(checker.effective_threshold(8), 1.0);
}

#[test]
fn test_single_question_scores() {
    // One answer is necessarily concentrated on one position
    assert_eq!(evenness_score(&[1, 0, 0, 0]), 0.0);
    assert_eq!(best_achievable(1), 0.0);
}

#[test]
fn test_invalid_quiz_is_rejected_before_checking() {
    let mut bad = question(0, 1);
    bad.options[2] = bad.options[0].clone();
    let quiz = Quiz::new(vec![bad]);
    assert!(QuizQualityChecker::default().check(&quiz).is_err());
    assert!(rebalance(&quiz).is_err());
}

#[test]
fn test_yaml_quiz_end_to_end() {
    let text = r#"
- question: "Which keyword declares a constant?"
  options: ["const", "let", "static mut", "fn"]
  answer: "const"
- question: "What does `&` create?"
  options: ["a reference", "a box", "a thread", "a macro"]
  answer: "a reference"
- question: "Which trait enables `{:?}`?"
  options: ["Debug", "Display", "Clone", "Copy"]
  answer: "Debug"
- question: "Where do owned Strings store their bytes?"
  options: ["on the heap", "in registers", "on disk", "in the binary"]
  answer: "on the heap"
"#;
    let quiz = Quiz::from_yaml_str(text).unwrap();
    let checker = QuizQualityChecker::default();
    assert!(checker.check(&quiz).unwrap().imbalanced);

    let balanced = rebalance(&quiz).unwrap();
    let reparsed = Quiz::from_yaml_str(&balanced.to_yaml_string().unwrap()).unwrap();
    assert_eq!(reparsed, balanced);
    assert_eq!(position_counts(&reparsed), [1, 1, 1, 1]);
}
