//! learnmap - Personal Learning Tracker Library
//!
//! Tracks what you are learning across topics:
//! - a versioned, multi-topic concept map with per-concept progress
//! - transparent upgrade of older single-topic map files
//! - multiple-choice quizzes with answer-position quality checks and
//!   deterministic rebalancing
//!
//! # Example
//!
//! ```ignore
//! use learnmap::concept_map::{ConceptMapStore, ConceptNode};
//!
//! let mut store = ConceptMapStore::load("workspace/concept_map.json")?;
//! store.add_topic("rust", "Rust")?;
//! store.add_concept("rust", "borrowing", ConceptNode::new("Borrowing"))?;
//! store.update_mastery("rust", "borrowing", 80.0)?;
//! store.save()?;
//! ```

pub mod cli;
pub mod commands;
pub mod concept_map;
pub mod config;
pub mod llm;
pub mod quiz;
pub mod slug;
pub mod workspace;

pub use concept_map::{ConceptMapStore, ConceptNode, StoreError, Topic};
pub use config::Config;
pub use llm::{Prompt, TextGenerator};
pub use quiz::{rebalance, QualityReport, Quiz, QuizQualityChecker, QuizValidationError};
pub use slug::slugify;
pub use workspace::{ConceptRef, Workspace};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library info
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info() {
        assert_eq!(info(), format!("learnmap v{}", VERSION));
    }
}
