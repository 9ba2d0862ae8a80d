//! Quiz model - structural validation of generated quizzes
//!
//! A quiz document is a YAML (or JSON) list of
//! `{ question, options: [4 distinct strings], answer }` where `answer` is
//! the exact text of one option. Questions written with lettered options
//! (`options: {A: .., B: .., C: .., D: ..}`, `answer: B`) are normalised
//! into the list form.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::fmt;

pub const OPTION_COUNT: usize = 4;
pub const OPTION_LETTERS: [&str; OPTION_COUNT] = ["A", "B", "C", "D"];
const REQUIRED_KEYS: [&str; 3] = ["question", "options", "answer"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

impl Question {
    /// 0-based position of the correct option, if the answer matches one.
    pub fn answer_index(&self) -> Option<usize> {
        self.options.iter().position(|o| *o == self.answer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quiz {
    pub questions: Vec<Question>,
}

/// Why a question (or the whole document) was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    NotAList,
    Empty,
    NotAMapping,
    MissingKey(&'static str),
    /// A required key is present but has the wrong type
    InvalidField(&'static str),
    WrongOptionCount(usize),
    DuplicateOptions,
    AnswerNotInOptions,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::NotAList => write!(f, "quiz document must be a list of questions"),
            IssueKind::Empty => write!(f, "quiz contains no questions"),
            IssueKind::NotAMapping => write!(f, "question must be a mapping"),
            IssueKind::MissingKey(key) => write!(f, "missing required key '{}'", key),
            IssueKind::InvalidField(key) => write!(f, "field '{}' has the wrong type", key),
            IssueKind::WrongOptionCount(n) => write!(f, "expected {} options, found {}", OPTION_COUNT, n),
            IssueKind::DuplicateOptions => write!(f, "options are not distinct"),
            IssueKind::AnswerNotInOptions => write!(f, "answer does not match any option"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionIssue {
    /// 0-based question index; `None` for document-level problems
    pub index: Option<usize>,
    pub kind: IssueKind,
}

impl fmt::Display for QuestionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "question {}: {}", i + 1, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Every structural problem found in a quiz
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid quiz: {}", render_issues(.issues))]
pub struct QuizValidationError {
    pub issues: Vec<QuestionIssue>,
}

fn render_issues(issues: &[QuestionIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl QuizValidationError {
    fn document(kind: IssueKind) -> Self {
        Self { issues: vec![QuestionIssue { index: None, kind }] }
    }
}

/// Parse failures before structural validation even starts
#[derive(Debug, thiserror::Error)]
pub enum QuizParseError {
    #[error("quiz is not valid YAML: {0}")]
    Syntax(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] QuizValidationError),
}

fn check_question(index: usize, q: &Question, issues: &mut Vec<QuestionIssue>) {
    let mut push = |kind| issues.push(QuestionIssue { index: Some(index), kind });
    if q.options.len() != OPTION_COUNT {
        push(IssueKind::WrongOptionCount(q.options.len()));
    }
    let distinct: HashSet<&str> = q.options.iter().map(String::as_str).collect();
    if distinct.len() != q.options.len() {
        push(IssueKind::DuplicateOptions);
    }
    if q.answer_index().is_none() {
        push(IssueKind::AnswerNotInOptions);
    }
}

impl Quiz {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Check every question; all problems are reported together.
    pub fn validate(&self) -> Result<(), QuizValidationError> {
        if self.questions.is_empty() {
            return Err(QuizValidationError::document(IssueKind::Empty));
        }
        let mut issues = Vec::new();
        for (i, q) in self.questions.iter().enumerate() {
            check_question(i, q, &mut issues);
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(QuizValidationError { issues })
        }
    }

    /// Parse and validate a quiz document.
    pub fn from_yaml_str(text: &str) -> Result<Quiz, QuizParseError> {
        let value: Value = serde_yaml::from_str(text)?;
        Ok(Quiz::from_value(&value)?)
    }

    /// Build a validated quiz from an untyped document, reporting missing
    /// keys per question.
    pub fn from_value(value: &Value) -> Result<Quiz, QuizValidationError> {
        let items = value
            .as_sequence()
            .ok_or_else(|| QuizValidationError::document(IssueKind::NotAList))?;

        let mut issues = Vec::new();
        let mut questions = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_mapping() {
                Some(map) => {
                    if let Some(q) = read_question(i, map, &mut issues) {
                        questions.push(q);
                    }
                }
                None => issues.push(QuestionIssue { index: Some(i), kind: IssueKind::NotAMapping }),
            }
        }

        if !issues.is_empty() {
            return Err(QuizValidationError { issues });
        }
        let quiz = Quiz::new(questions);
        quiz.validate()?;
        Ok(quiz)
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Score chosen option indices against the answer key.
    /// Missing or out-of-range choices count as wrong.
    pub fn grade(&self, choices: &[usize]) -> Grade {
        let correct = self
            .questions
            .iter()
            .zip(choices)
            .filter(|(q, &choice)| q.answer_index() == Some(choice))
            .count();
        Grade::new(correct, self.questions.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grade {
    pub correct: usize,
    pub total: usize,
    pub percent: f64,
}

impl Grade {
    fn new(correct: usize, total: usize) -> Self {
        let percent = if total == 0 { 0.0 } else { correct as f64 * 100.0 / total as f64 };
        Self { correct, total, percent }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn read_question(index: usize, map: &Mapping, issues: &mut Vec<QuestionIssue>) -> Option<Question> {
    let before = issues.len();
    let mut issue = |kind| issues.push(QuestionIssue { index: Some(index), kind });

    for key in REQUIRED_KEYS {
        if !map.contains_key(key) {
            issue(IssueKind::MissingKey(key));
        }
    }
    let question = map.get("question").and_then(scalar_text);
    let answer = map.get("answer").and_then(scalar_text);
    if map.contains_key("question") && question.is_none() {
        issue(IssueKind::InvalidField("question"));
    }
    if map.contains_key("answer") && answer.is_none() {
        issue(IssueKind::InvalidField("answer"));
    }

    let mut lettered = false;
    let options = match map.get("options") {
        None => None,
        Some(Value::Sequence(seq)) => {
            let texts: Option<Vec<String>> = seq.iter().map(scalar_text).collect();
            if texts.is_none() {
                issue(IssueKind::InvalidField("options"));
            }
            texts
        }
        Some(Value::Mapping(lettered_map)) => {
            lettered = true;
            let texts = lettered_options(lettered_map);
            if texts.is_none() {
                issue(IssueKind::InvalidField("options"));
            }
            texts
        }
        Some(_) => {
            issue(IssueKind::InvalidField("options"));
            None
        }
    };

    if issues.len() != before {
        return None;
    }
    let (question, options, mut answer) = (question?, options?, answer?);

    // Lettered form: an answer like "B" names the option, not its text
    if lettered && !options.contains(&answer) {
        if let Some(pos) = OPTION_LETTERS.iter().position(|l| l.eq_ignore_ascii_case(answer.trim())) {
            answer = options[pos].clone();
        }
    }
    Some(Question { question, options, answer })
}

/// `{A: .., B: .., C: .., D: ..}` in letter order; any other key set is rejected.
fn lettered_options(map: &Mapping) -> Option<Vec<String>> {
    if map.len() != OPTION_COUNT {
        return None;
    }
    OPTION_LETTERS
        .iter()
        .map(|letter| map.get(*letter).and_then(scalar_text))
        .collect()
}
