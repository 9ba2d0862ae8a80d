//! Concept-map drafts produced by the text generator
//!
//! The generator is asked for `{ main_concept, learning_modules: [...] }`.
//! Model output is often wrapped in code fences or carries trailing commas,
//! so parsing tries progressively looser readings before giving up.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{StoreError, StoreResult};
use super::model::ConceptNode;
use super::store::ConceptMapStore;
use crate::llm::strip_code_fences;
use crate::slug::slugify;

static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",(\s*[}\]])").expect("static trailing comma pattern"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDraft {
    pub main_concept: String,
    #[serde(default)]
    pub learning_modules: Vec<ModuleDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDraft {
    pub module_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub concepts: Vec<String>,
}

impl MapDraft {
    pub fn concept_count(&self) -> usize {
        self.learning_modules.iter().map(|m| m.concepts.len()).sum()
    }
}

fn try_parse(text: &str) -> Option<MapDraft> {
    if let Ok(draft) = serde_json::from_str::<MapDraft>(text) {
        return Some(draft);
    }
    let cleaned = TRAILING_COMMA.replace_all(text, "$1");
    serde_json::from_str::<MapDraft>(&cleaned).ok()
}

/// Parse a generator response into a draft, or `None` if no reading works.
pub fn parse_draft(response: &str) -> Option<MapDraft> {
    let body = strip_code_fences(response);
    if let Some(draft) = try_parse(body) {
        return Some(draft);
    }
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    debug!("Retrying map parse on extracted JSON span");
    try_parse(&body[start..=end])
}

/// What [`apply_draft`] changed in the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplySummary {
    pub topic_id: String,
    pub topic_created: bool,
    pub modules_added: usize,
    pub concepts_added: usize,
    /// Names that were already present or produced an empty id
    pub skipped: Vec<String>,
}

/// Merge a draft into the topic named by its own `main_concept`.
pub fn apply_draft(store: &mut ConceptMapStore, draft: &MapDraft) -> StoreResult<ApplySummary> {
    let topic_id = slugify(&draft.main_concept);
    if topic_id.is_empty() {
        return Err(StoreError::Validation(format!(
            "main concept '{}' does not produce a usable topic id",
            draft.main_concept
        )));
    }
    apply_draft_to(store, &topic_id, draft.main_concept.trim(), draft)
}

/// Merge a draft into `topic_id`, creating it as `topic_name` when absent.
///
/// Each module becomes a node whose children are its concept ids, and each
/// concept becomes a fresh leaf. Existing ids are never overwritten.
pub fn apply_draft_to(
    store: &mut ConceptMapStore,
    topic_id: &str,
    topic_name: &str,
    draft: &MapDraft,
) -> StoreResult<ApplySummary> {
    if topic_id.trim().is_empty() {
        return Err(StoreError::Validation("topic id must not be empty".to_string()));
    }

    let mut summary = ApplySummary {
        topic_created: store.ensure_topic(topic_id, topic_name)?,
        topic_id: topic_id.to_string(),
        ..Default::default()
    };

    for module in &draft.learning_modules {
        let children: Vec<String> = module
            .concepts
            .iter()
            .map(|name| slugify(name))
            .filter(|id| !id.is_empty())
            .collect();

        let module_id = slugify(&module.module_name);
        if module_id.is_empty() {
            warn!("Skipping module '{}' with empty id", module.module_name);
            summary.skipped.push(module.module_name.clone());
        } else {
            let mut node = ConceptNode::new(module.module_name.trim()).with_children(children);
            if !module.description.trim().is_empty() {
                node = node.with_description(module.description.trim());
            }
            if store.add_concept_if_absent(topic_id, &module_id, node)? {
                summary.modules_added += 1;
            } else {
                summary.skipped.push(module.module_name.clone());
            }
        }

        for name in &module.concepts {
            let concept_id = slugify(name);
            if concept_id.is_empty() {
                warn!("Skipping concept '{}' with empty id", name);
                summary.skipped.push(name.clone());
                continue;
            }
            if store.add_concept_if_absent(topic_id, &concept_id, ConceptNode::new(name.trim()))? {
                summary.concepts_added += 1;
            } else {
                summary.skipped.push(name.clone());
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "main_concept": "Rust Ownership",
      "learning_modules": [
        {"module_name": "Basics", "description": "Core rules", "concepts": ["Move Semantics", "Borrowing"]},
        {"module_name": "Lifetimes", "description": "", "concepts": ["Lifetime Elision"]}
      ]
    }"#;

    #[test]
    fn test_parse_plain_json() {
        let draft = parse_draft(SAMPLE).unwrap();
        assert_eq!(draft.main_concept, "Rust Ownership");
        assert_eq!(draft.learning_modules.len(), 2);
        assert_eq!(draft.concept_count(), 3);
    }

    #[test]
    fn test_parse_fenced_with_trailing_commas() {
        let text = "```json\n{\"main_concept\": \"X\", \"learning_modules\": [{\"module_name\": \"M\", \"concepts\": [\"a\", \"b\",],},],}\n```";
        let draft = parse_draft(text).unwrap();
        assert_eq!(draft.learning_modules[0].concepts, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_embedded_in_prose() {
        let text = format!("Here is your map:\n{}\nGood luck!", SAMPLE);
        assert!(parse_draft(&text).is_some());
        assert!(parse_draft("no json here").is_none());
    }

    #[test]
    fn test_apply_draft_builds_hierarchy() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConceptMapStore::load(dir.path().join("map.json")).unwrap();
        let draft = parse_draft(SAMPLE).unwrap();

        let summary = apply_draft(&mut store, &draft).unwrap();
        assert_eq!(summary.topic_id, "rust-ownership");
        assert!(summary.topic_created);
        assert_eq!(summary.modules_added, 2);
        assert_eq!(summary.concepts_added, 3);

        let basics = store.get_concept("rust-ownership", "basics").unwrap();
        assert_eq!(basics.children, vec!["move-semantics", "borrowing"]);
        assert_eq!(basics.description.as_deref(), Some("Core rules"));
        assert!(store.get_concept("rust-ownership", "lifetimes").unwrap().description.is_none());
        assert!(store.get_concept("rust-ownership", "lifetime-elision").is_some());
    }

    #[test]
    fn test_apply_draft_twice_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConceptMapStore::load(dir.path().join("map.json")).unwrap();
        let draft = parse_draft(SAMPLE).unwrap();
        apply_draft(&mut store, &draft).unwrap();
        store.update_mastery("rust-ownership", "borrowing", 75.0).unwrap();

        let summary = apply_draft(&mut store, &draft).unwrap();
        assert!(!summary.topic_created);
        assert_eq!(summary.concepts_added, 0);
        assert_eq!(summary.skipped.len(), 5);
        assert_eq!(
            store.get_concept("rust-ownership", "borrowing").unwrap().mastery.best_score_percent,
            75.0
        );
    }

    #[test]
    fn test_apply_draft_to_named_topic() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConceptMapStore::load(dir.path().join("map.json")).unwrap();
        store.add_topic("rust", "Rust").unwrap();
        let draft = parse_draft(SAMPLE).unwrap();

        let summary = apply_draft_to(&mut store, "rust", "Rust", &draft).unwrap();
        assert_eq!(summary.topic_id, "rust");
        assert!(!summary.topic_created);
        assert!(store.get_concept("rust", "borrowing").is_some());
        assert!(!store.topic_exists("rust-ownership"));
        assert!(matches!(
            apply_draft_to(&mut store, " ", "Blank", &draft),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_apply_draft_rejects_empty_topic_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConceptMapStore::load(dir.path().join("map.json")).unwrap();
        let draft = MapDraft { main_concept: "???".to_string(), learning_modules: vec![] };
        assert!(matches!(apply_draft(&mut store, &draft), Err(StoreError::Validation(_))));
    }
}
