//! Workspace layout and concept references
//!
//! ```text
//! <root>/concept_map.json
//! <root>/<topic>/explanation/<concept>.md
//! <root>/<topic>/quizzes/<concept>.yml
//! <root>/<topic>/quality_reports/<concept>_quality_<stamp>.txt
//! <root>/quality_monitor/quality_data.json
//! ```

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::concept_map::{ConceptMapStore, StoreError, StoreResult};
use crate::config::Config;
use crate::quiz::QualityMonitor;
use crate::slug::slugify;

#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    root: PathBuf,
    map_file: String,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, map_file: impl Into<String>) -> Self {
        Self { root: root.into(), map_file: map_file.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.workspace.dir, &config.workspace.map_file)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn map_path(&self) -> PathBuf {
        self.root.join(&self.map_file)
    }

    pub fn open_store(&self) -> StoreResult<ConceptMapStore> {
        ConceptMapStore::load(self.map_path())
    }

    pub fn topic_dir(&self, topic_id: &str) -> PathBuf {
        self.root.join(topic_id)
    }

    pub fn explanation_path(&self, topic_id: &str, concept_id: &str) -> PathBuf {
        self.topic_dir(topic_id).join("explanation").join(format!("{}.md", concept_id))
    }

    pub fn quiz_path(&self, topic_id: &str, concept_id: &str) -> PathBuf {
        self.topic_dir(topic_id).join("quizzes").join(format!("{}.yml", concept_id))
    }

    pub fn quality_reports_dir(&self, topic_id: &str) -> PathBuf {
        self.topic_dir(topic_id).join("quality_reports")
    }

    pub fn monitor(&self) -> QualityMonitor {
        QualityMonitor::new(&self.root)
    }
}

/// A concept named on the command line: `"topic/concept name"` or just a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptRef {
    pub topic_id: Option<String>,
    pub concept_id: String,
}

impl ConceptRef {
    /// Split on the first `/`; both parts are slugified.
    pub fn parse(text: &str) -> Self {
        match text.split_once('/') {
            Some((topic, concept)) => Self {
                topic_id: Some(slugify(topic)).filter(|t| !t.is_empty()),
                concept_id: slugify(concept),
            },
            None => Self { topic_id: None, concept_id: slugify(text) },
        }
    }

    /// Resolve to `(topic_id, concept_id)` against the store.
    ///
    /// Without an explicit topic the first topic owning the id is used.
    pub fn resolve(&self, store: &ConceptMapStore) -> StoreResult<(String, String)> {
        let not_found = |topic: &str| StoreError::ConceptNotFound {
            topic_id: topic.to_string(),
            concept_id: self.concept_id.clone(),
        };

        match &self.topic_id {
            Some(topic) => {
                if !store.topic_exists(topic) {
                    return Err(StoreError::TopicNotFound(topic.clone()));
                }
                store
                    .get_concept(topic, &self.concept_id)
                    .map(|_| (topic.clone(), self.concept_id.clone()))
                    .ok_or_else(|| not_found(topic))
            }
            None => {
                let owners = store.concept_owners(&self.concept_id);
                if owners.len() > 1 {
                    warn!(
                        "'{}' is ambiguous (topics: {}); using '{}'. Write topic/concept to choose.",
                        self.concept_id,
                        owners.join(", "),
                        owners[0]
                    );
                }
                owners
                    .first()
                    .map(|topic| (topic.to_string(), self.concept_id.clone()))
                    .ok_or_else(|| not_found(""))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept_map::ConceptNode;

    #[test]
    fn test_paths() {
        let ws = Workspace::new("/ws", "concept_map.json");
        assert_eq!(ws.map_path(), PathBuf::from("/ws/concept_map.json"));
        assert_eq!(ws.explanation_path("rust", "borrowing"), PathBuf::from("/ws/rust/explanation/borrowing.md"));
        assert_eq!(ws.quiz_path("rust", "borrowing"), PathBuf::from("/ws/rust/quizzes/borrowing.yml"));
        assert_eq!(ws.quality_reports_dir("rust"), PathBuf::from("/ws/rust/quality_reports"));
        assert_eq!(
            ws.monitor().path(),
            Path::new("/ws/quality_monitor/quality_data.json")
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            ConceptRef::parse("Rust Lang/Move Semantics"),
            ConceptRef { topic_id: Some("rust-lang".into()), concept_id: "move-semantics".into() }
        );
        assert_eq!(ConceptRef::parse("Borrowing"), ConceptRef { topic_id: None, concept_id: "borrowing".into() });
        assert_eq!(ConceptRef::parse("/x").topic_id, None);
    }

    #[test]
    fn test_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConceptMapStore::load(dir.path().join("map.json")).unwrap();
        store.add_topic("a", "A").unwrap();
        store.add_topic("b", "B").unwrap();
        store.add_concept("a", "x", ConceptNode::new("X")).unwrap();
        store.add_concept("b", "x", ConceptNode::new("X")).unwrap();
        store.add_concept("b", "y", ConceptNode::new("Y")).unwrap();

        assert_eq!(ConceptRef::parse("x").resolve(&store).unwrap(), ("a".into(), "x".into()));
        assert_eq!(ConceptRef::parse("b/x").resolve(&store).unwrap(), ("b".into(), "x".into()));
        assert_eq!(ConceptRef::parse("Y").resolve(&store).unwrap(), ("b".into(), "y".into()));
        assert!(matches!(
            ConceptRef::parse("a/y").resolve(&store),
            Err(StoreError::ConceptNotFound { ref topic_id, .. }) if topic_id == "a"
        ));
        assert!(matches!(ConceptRef::parse("zz/x").resolve(&store), Err(StoreError::TopicNotFound(_))));
        assert!(matches!(
            ConceptRef::parse("nope").resolve(&store),
            Err(StoreError::ConceptNotFound { ref topic_id, .. }) if topic_id.is_empty()
        ));
    }
}
