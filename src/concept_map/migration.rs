//! Legacy migration - one-shot upgrade of older concept-map documents
//!
//! Two older shapes are recognised:
//! - the flat legacy map `{ concept_id: ConceptNode, ... }` with no wrapper,
//!   which becomes a single `"default"` topic;
//! - a wrapped `{ topics, metadata }` document stamped with another schema
//!   version, whose topics are kept and whose metadata is reset to the
//!   current version.
//!
//! Every migration first copies the original bytes to a sibling backup.
//! If the copy fails nothing else happens and the original stays readable.

use chrono::Utc;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::{StoreError, StoreResult};
use super::model::{
    ConceptNode, Metadata, StoreDocument, Topic, CURRENT_VERSION, DEFAULT_TOPIC_ID, DEFAULT_TOPIC_NAME,
};
use super::ordered::OrderedMap;
use super::store::write_document;

const BACKUP_SUFFIX: &str = ".backup";

/// A parsed document, classified by schema generation
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedDocument {
    /// Already in the current schema
    Current(StoreDocument),
    /// Flat legacy concept map
    Legacy(OrderedMap<ConceptNode>),
    /// Wrapped document from another schema version
    Outdated {
        version: Option<String>,
        topics: OrderedMap<Topic>,
        created_at: Option<chrono::DateTime<Utc>>,
        extra: Map<String, Value>,
    },
    /// `{}`: nothing stored yet
    Empty,
}

impl LoadedDocument {
    pub fn needs_migration(&self) -> bool {
        matches!(self, LoadedDocument::Legacy(_) | LoadedDocument::Outdated { .. })
    }
}

/// Shape probe on the untyped document, before any typed parsing.
fn looks_like_legacy(obj: &Map<String, Value>) -> bool {
    !obj.is_empty()
        && !obj.contains_key("topics")
        && !obj.contains_key("metadata")
        && obj
            .values()
            .all(|v| v.as_object().map(|node| node.contains_key("name")).unwrap_or(false))
}

/// Classify raw JSON into a [`LoadedDocument`]. `path` is only used for error context.
pub fn classify(path: &Path, raw: Value) -> StoreResult<LoadedDocument> {
    let corrupt = |reason: String| StoreError::CorruptStore { path: path.to_path_buf(), reason };

    let mut obj = match raw {
        Value::Object(obj) => obj,
        other => return Err(corrupt(format!("expected a JSON object, found {}", json_kind(&other)))),
    };

    if obj.is_empty() {
        return Ok(LoadedDocument::Empty);
    }

    if looks_like_legacy(&obj) {
        let concepts: OrderedMap<ConceptNode> = serde_json::from_value(Value::Object(obj))
            .map_err(|e| corrupt(format!("legacy concept entry is malformed: {}", e)))?;
        return Ok(LoadedDocument::Legacy(concepts));
    }

    if !obj.contains_key("topics") {
        return Err(corrupt("document has neither a 'topics' map nor legacy concept entries".to_string()));
    }

    let version = obj
        .get("metadata")
        .and_then(|m| m.get("version"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if version.as_deref() == Some(CURRENT_VERSION) {
        let document: StoreDocument = serde_json::from_value(Value::Object(obj))
            .map_err(|e| corrupt(e.to_string()))?;
        return Ok(LoadedDocument::Current(document));
    }

    let topics_raw = obj.remove("topics").unwrap_or(Value::Object(Map::new()));
    let topics: OrderedMap<Topic> =
        serde_json::from_value(topics_raw).map_err(|e| corrupt(format!("topics are malformed: {}", e)))?;
    let created_at = obj
        .remove("metadata")
        .and_then(|m| m.get("created_at").and_then(Value::as_str).and_then(super::model::parse_timestamp));

    Ok(LoadedDocument::Outdated { version, topics, created_at, extra: obj })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Wrap a legacy concept map into a single default topic.
pub fn migrate_legacy(concepts: OrderedMap<ConceptNode>) -> StoreDocument {
    let mut topic = Topic::new(DEFAULT_TOPIC_NAME);
    topic.concepts = concepts;

    let mut document = StoreDocument::empty();
    document.topics.insert(DEFAULT_TOPIC_ID, topic);
    document.sync_active_topics();
    document
}

/// Keep the topics of an outdated wrapped document under current metadata.
pub fn restamp(
    topics: OrderedMap<Topic>,
    created_at: Option<chrono::DateTime<Utc>>,
    extra: Map<String, Value>,
) -> StoreDocument {
    let mut metadata = Metadata::current();
    if let Some(created_at) = created_at {
        metadata.created_at = created_at;
    }
    let mut document = StoreDocument { topics, metadata, extra };
    document.sync_active_topics();
    document
}

/// Sibling backup path. An existing backup is never overwritten; later
/// migrations get `.backup.1`, `.backup.2`, ...
pub fn backup_path(path: &Path) -> PathBuf {
    let base = format!(
        "{}{}",
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        BACKUP_SUFFIX
    );
    let first = path.with_file_name(&base);
    if !first.exists() {
        return first;
    }
    let mut n = 1;
    loop {
        let candidate = path.with_file_name(format!("{}.{}", base, n));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Result of a migration run
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub document: StoreDocument,
    pub backup: PathBuf,
}

/// One-shot upgrade of the document stored at `path`
pub struct LegacyMigrationEngine<'a> {
    path: &'a Path,
}

impl<'a> LegacyMigrationEngine<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self { path }
    }

    /// Back up, transform and persist. Returns `None` when `loaded` is
    /// already current (or empty), which makes repeated runs no-ops.
    pub fn run(&self, loaded: LoadedDocument) -> StoreResult<Option<MigrationOutcome>> {
        let (document, backup) = match loaded {
            LoadedDocument::Current(_) | LoadedDocument::Empty => {
                debug!("No migration needed for {}", self.path.display());
                return Ok(None);
            }
            LoadedDocument::Legacy(concepts) => {
                let backup = self.backup()?;
                info!(
                    "Migrating legacy concept map {} ({} concepts) into topic '{}'",
                    self.path.display(),
                    concepts.len(),
                    DEFAULT_TOPIC_ID
                );
                (migrate_legacy(concepts), backup)
            }
            LoadedDocument::Outdated { version, topics, created_at, extra } => {
                let backup = self.backup()?;
                info!(
                    "Restamping concept map {} from version {} to {}",
                    self.path.display(),
                    version.as_deref().unwrap_or("<none>"),
                    CURRENT_VERSION
                );
                (restamp(topics, created_at, extra), backup)
            }
        };

        write_document(self.path, &document)?;
        Ok(Some(MigrationOutcome { document, backup }))
    }

    fn backup(&self) -> StoreResult<PathBuf> {
        let target = backup_path(self.path);
        std::fs::copy(self.path, &target).map_err(|e| StoreError::Migration {
            path: self.path.to_path_buf(),
            reason: format!("could not write backup {}: {}", target.display(), e),
        })?;
        info!("Backed up {} to {}", self.path.display(), target.display());
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p() -> PathBuf {
        PathBuf::from("concept_map.json")
    }

    #[test]
    fn test_classify_shapes() {
        assert_eq!(classify(&p(), json!({})).unwrap(), LoadedDocument::Empty);

        let legacy = classify(&p(), json!({"a": {"name": "A"}, "b": {"name": "B"}})).unwrap();
        match legacy {
            LoadedDocument::Legacy(concepts) => {
                assert_eq!(concepts.keys().collect::<Vec<_>>(), vec!["a", "b"]);
            }
            other => panic!("expected legacy, got {:?}", other),
        }

        let outdated = classify(
            &p(),
            json!({"metadata": {"version": "3.0"}, "topics": {"t": {"name": "T", "concepts": {}}}}),
        )
        .unwrap();
        assert!(outdated.needs_migration());
        assert!(matches!(outdated, LoadedDocument::Outdated { version: Some(ref v), .. } if v == "3.0"));
    }

    #[test]
    fn test_classify_rejects_unrecognised() {
        for raw in [json!([1, 2]), json!("text"), json!({"x": 1}), json!({"metadata": {"version": "2.0"}})] {
            let err = classify(&p(), raw).unwrap_err();
            assert!(matches!(err, StoreError::CorruptStore { .. }));
        }
    }

    #[test]
    fn test_migrate_legacy_wraps_everything() {
        let concepts: OrderedMap<ConceptNode> =
            [("x".to_string(), ConceptNode::new("X")), ("y".to_string(), ConceptNode::new("Y"))]
                .into_iter()
                .collect();
        let doc = migrate_legacy(concepts.clone());
        assert_eq!(doc.metadata.version, CURRENT_VERSION);
        assert_eq!(doc.metadata.active_topics, vec![DEFAULT_TOPIC_ID.to_string()]);
        let topic = doc.topics.get(DEFAULT_TOPIC_ID).unwrap();
        assert_eq!(topic.name, DEFAULT_TOPIC_NAME);
        assert_eq!(topic.concepts, concepts);
    }

    #[test]
    fn test_backup_path_never_reuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concept_map.json");
        assert_eq!(backup_path(&path), dir.path().join("concept_map.json.backup"));
        std::fs::write(dir.path().join("concept_map.json.backup"), "old").unwrap();
        assert_eq!(backup_path(&path), dir.path().join("concept_map.json.backup.1"));
    }

    #[test]
    fn test_backup_failure_aborts_before_write() {
        let dir = tempfile::tempdir().unwrap();
        // Path does not exist, so the copy fails
        let path = dir.path().join("missing.json");
        let engine = LegacyMigrationEngine::new(&path);
        let err = engine.run(LoadedDocument::Legacy(OrderedMap::new())).unwrap_err();
        assert!(matches!(err, StoreError::Migration { .. }));
        assert!(!path.exists());
    }
}
