//! Multiple-choice quizzes: validation, answer-position quality and rebalancing

pub mod analysis;
pub mod model;
pub mod monitor;
pub mod quality;
pub mod rebalance;

pub use analysis::{analyze_document, DocumentAnalysis};
pub use model::{Grade, IssueKind, Question, QuestionIssue, Quiz, QuizParseError, QuizValidationError};
pub use monitor::{QualityMonitor, QualityRecord};
pub use quality::{QualityReport, QuizQualityChecker};
pub use rebalance::rebalance;
