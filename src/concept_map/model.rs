//! Concept-map entities
//!
//! The persisted document is `{ "topics": {...}, "metadata": {...} }`.
//! Unknown fields written by other tool versions are carried through
//! `extra` so that loading and saving never drops them.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::error::{StoreError, StoreResult};
use super::graph::Relationships;
use super::ordered::OrderedMap;

/// Schema generation written by this crate
pub const CURRENT_VERSION: &str = "2.0";

/// Synthetic topic that receives the concepts of a legacy document
pub const DEFAULT_TOPIC_ID: &str = "default";
pub const DEFAULT_TOPIC_NAME: &str = "Default Topic";

/// Sentinel for "never attempted"
pub const NEVER_ATTEMPTED: f64 = -1.0;

pub const STATUS_EXPLAINED: &str = "explained";
pub const STATUS_QUIZ_GENERATED: &str = "quiz_generated";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mastery {
    #[serde(default = "never_attempted")]
    pub best_score_percent: f64,
}

fn never_attempted() -> f64 {
    NEVER_ATTEMPTED
}

impl Default for Mastery {
    fn default() -> Self {
        Self { best_score_percent: NEVER_ATTEMPTED }
    }
}

impl Mastery {
    pub fn is_attempted(&self) -> bool {
        self.best_score_percent >= 0.0
    }
}

/// One learnable unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Child concept ids or names; a child does not have to resolve to a node
    #[serde(default)]
    pub children: Vec<String>,
    /// Boolean progress flags plus whatever else older tools recorded here
    /// (e.g. a `last_quiz_time` string)
    #[serde(default)]
    pub status: OrderedMap<Value>,
    #[serde(default)]
    pub mastery: Mastery,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Relationships>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConceptNode {
    /// A fresh node with both standard status flags cleared and no attempt recorded.
    pub fn new(name: impl Into<String>) -> Self {
        let mut status = OrderedMap::new();
        status.insert(STATUS_EXPLAINED, Value::Bool(false));
        status.insert(STATUS_QUIZ_GENERATED, Value::Bool(false));
        Self {
            name: name.into(),
            description: None,
            children: Vec::new(),
            status,
            mastery: Mastery::default(),
            relationships: None,
            extra: Map::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<String>) -> Self {
        self.children = children;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Build a node from an untyped payload. `name` is required; every
    /// other field falls back to its default.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| StoreError::Validation("concept payload must be an object".to_string()))?;
        match obj.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => {}
            Some(_) => {
                return Err(StoreError::Validation("concept 'name' must be a non-empty string".to_string()))
            }
            None => return Err(StoreError::Validation("concept payload is missing 'name'".to_string())),
        }
        let mut node: ConceptNode = serde_json::from_value(value)
            .map_err(|e| StoreError::Validation(format!("malformed concept payload: {}", e)))?;
        for key in [STATUS_EXPLAINED, STATUS_QUIZ_GENERATED] {
            if !node.status.contains_key(key) {
                node.status.insert(key, Value::Bool(false));
            }
        }
        Ok(node)
    }

    /// Flag lookup; an absent or non-boolean entry reads as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.status.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn is_explained(&self) -> bool {
        self.flag(STATUS_EXPLAINED)
    }

    pub fn is_quiz_generated(&self) -> bool {
        self.flag(STATUS_QUIZ_GENERATED)
    }
}

/// A named container of concepts. The topic id is its key in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(default = "Utc::now", deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub concepts: OrderedMap<ConceptNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
            concepts: OrderedMap::new(),
            extra: Map::new(),
        }
    }

    pub fn stats(&self) -> TopicStats {
        TopicStats::from_concepts(self.concepts.values())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub version: String,
    #[serde(default = "Utc::now", deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", alias = "last_updated", deserialize_with = "deserialize_timestamp")]
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub active_topics: Vec<String>,
}

impl Metadata {
    pub fn current() -> Self {
        let now = Utc::now();
        Self {
            version: CURRENT_VERSION.to_string(),
            created_at: now,
            last_modified: now,
            active_topics: Vec::new(),
        }
    }
}

/// The root persisted object in the current schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub topics: OrderedMap<Topic>,
    pub metadata: Metadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoreDocument {
    pub fn empty() -> Self {
        Self {
            topics: OrderedMap::new(),
            metadata: Metadata::current(),
            extra: Map::new(),
        }
    }

    /// Make `metadata.active_topics` equal the topic key set.
    pub fn sync_active_topics(&mut self) {
        self.metadata.active_topics = self.topics.keys().map(str::to_string).collect();
    }
}

/// Learning progress summary for one topic
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopicStats {
    pub total: usize,
    pub explained: usize,
    pub quizzed: usize,
    pub attempted: usize,
    /// Mean best score over attempted concepts; `None` when nothing was attempted
    pub mean_mastery: Option<f64>,
}

impl TopicStats {
    pub fn from_concepts<'a>(concepts: impl Iterator<Item = &'a ConceptNode>) -> Self {
        let mut stats = TopicStats::default();
        let mut score_sum = 0.0;
        for concept in concepts {
            stats.total += 1;
            if concept.is_explained() {
                stats.explained += 1;
            }
            if concept.is_quiz_generated() {
                stats.quizzed += 1;
            }
            if concept.mastery.is_attempted() {
                stats.attempted += 1;
                score_sum += concept.mastery.best_score_percent;
            }
        }
        if stats.attempted > 0 {
            stats.mean_mastery = Some(score_sum / stats.attempted as f64);
        }
        stats
    }
}

/// Accept RFC 3339 as written by this crate, or the naive local ISO
/// timestamps found in older documents.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_concept_defaults() {
        let node = ConceptNode::new("Closures");
        assert!(!node.is_explained());
        assert!(!node.is_quiz_generated());
        assert_eq!(node.mastery.best_score_percent, NEVER_ATTEMPTED);
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_from_value_requires_name() {
        let err = ConceptNode::from_value(json!({"children": []})).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = ConceptNode::from_value(json!({"name": 3})).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let node = ConceptNode::from_value(json!({"name": "Loops"})).unwrap();
        assert_eq!(node.name, "Loops");
        assert!(node.status.contains_key(STATUS_EXPLAINED));
        assert_eq!(node.mastery.best_score_percent, NEVER_ATTEMPTED);
    }

    #[test]
    fn test_unknown_fields_are_preserved() {
        let raw = json!({
            "name": "Iterators",
            "children": ["adapters"],
            "status": {"explained": true},
            "mastery": {"best_score_percent": 40},
            "graph_metadata": {"difficulty": 2}
        });
        let node: ConceptNode = serde_json::from_value(raw).unwrap();
        assert_eq!(node.extra.get("graph_metadata"), Some(&json!({"difficulty": 2})));
        assert_eq!(node.mastery.best_score_percent, 40.0);

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["graph_metadata"]["difficulty"], 2);
    }

    #[test]
    fn test_status_keeps_non_boolean_entries() {
        let raw = json!({
            "name": "Traits",
            "status": {"explained": true, "last_quiz_time": "2024-05-01T10:00:00.123456"}
        });
        let node = ConceptNode::from_value(raw).unwrap();
        assert!(node.is_explained());
        assert!(!node.is_quiz_generated());
        assert!(!node.flag("last_quiz_time"));
        assert_eq!(node.status.get("last_quiz_time"), Some(&json!("2024-05-01T10:00:00.123456")));

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["status"]["last_quiz_time"], "2024-05-01T10:00:00.123456");
        assert!(back.get("relationships").is_none());
    }

    #[test]
    fn test_naive_timestamp_accepted() {
        assert!(parse_timestamp("2024-03-01T10:20:30.123456").is_some());
        assert!(parse_timestamp("2024-03-01T10:20:30Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_topic_stats() {
        let mut topic = Topic::new("Rust");
        let mut a = ConceptNode::new("A");
        a.status.insert(STATUS_EXPLAINED, Value::Bool(true));
        a.mastery.best_score_percent = 80.0;
        let mut b = ConceptNode::new("B");
        b.status.insert(STATUS_QUIZ_GENERATED, Value::Bool(true));
        b.mastery.best_score_percent = 60.0;
        topic.concepts.insert("a", a);
        topic.concepts.insert("b", b);
        topic.concepts.insert("c", ConceptNode::new("C"));

        let stats = topic.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.explained, 1);
        assert_eq!(stats.quizzed, 1);
        assert_eq!(stats.attempted, 2);
        assert_eq!(stats.mean_mastery, Some(70.0));
    }
}
