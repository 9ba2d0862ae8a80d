//! Concept map store - sole owner of the on-disk concept-map document
//!
//! The store is constructed with an explicit path and holds the whole
//! document in memory for the life of a command. Every mutation validates
//! its preconditions before touching state, so a failed call leaves the
//! document exactly as it was. Nothing reaches disk until [`ConceptMapStore::save`].

use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::error::{StoreError, StoreResult};
use super::graph::{graph_for, GraphData, RelationshipKind, Relationships};
use super::migration::{classify, LegacyMigrationEngine, LoadedDocument};
use super::model::{ConceptNode, StoreDocument, Topic, TopicStats, DEFAULT_TOPIC_ID};
use super::ordered::OrderedMap;
use super::persist::atomic_write;

/// Serialize and atomically replace the document at `path`.
pub(crate) fn write_document(path: &Path, document: &StoreDocument) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(document)
        .map_err(|e| StoreError::Validation(format!("could not serialize concept map: {}", e)))?;
    atomic_write(path, &bytes).map_err(|e| StoreError::io(path, e))
}

pub struct ConceptMapStore {
    path: PathBuf,
    document: StoreDocument,
    migration_backup: Option<PathBuf>,
}

impl ConceptMapStore {
    /// Load the document at `path`, migrating older layouts in place.
    ///
    /// A missing or blank file yields an empty store; nothing is written
    /// until [`save`](Self::save).
    pub fn load(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let mut store = Self {
            path,
            document: StoreDocument::empty(),
            migration_backup: None,
        };
        store.reload()?;
        Ok(store)
    }

    /// Re-read the document from disk, discarding unsaved changes.
    pub fn reload(&mut self) -> StoreResult<()> {
        if !self.path.exists() {
            debug!("Concept map {} does not exist yet", self.path.display());
            self.document = StoreDocument::empty();
            return Ok(());
        }

        let bytes = std::fs::read(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            self.document = StoreDocument::empty();
            return Ok(());
        }

        let raw: Value = serde_json::from_slice(&bytes).map_err(|e| StoreError::CorruptStore {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let loaded = classify(&self.path, raw)?;
        self.document = match loaded {
            LoadedDocument::Current(document) => document,
            LoadedDocument::Empty => StoreDocument::empty(),
            migratable => {
                let outcome = LegacyMigrationEngine::new(&self.path).run(migratable)?;
                match outcome {
                    Some(outcome) => {
                        self.migration_backup = Some(outcome.backup);
                        outcome.document
                    }
                    None => StoreDocument::empty(),
                }
            }
        };
        Ok(())
    }

    /// Persist the document. `active_topics` is recomputed from the topic
    /// keys and `last_modified` is set to now.
    pub fn save(&mut self) -> StoreResult<()> {
        self.document.sync_active_topics();
        self.document.metadata.last_modified = Utc::now();
        write_document(&self.path, &self.document)?;
        debug!("Saved concept map {} ({} topics)", self.path.display(), self.document.topics.len());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &StoreDocument {
        &self.document
    }

    /// Backup written by a migration during the last load, if any
    pub fn migration_backup(&self) -> Option<&Path> {
        self.migration_backup.as_deref()
    }

    // --- Topics ---

    pub fn add_topic(&mut self, id: &str, name: &str) -> StoreResult<()> {
        if id.trim().is_empty() {
            return Err(StoreError::Validation("topic id must not be empty".to_string()));
        }
        if self.document.topics.contains_key(id) {
            return Err(StoreError::TopicExists(id.to_string()));
        }
        self.document.topics.insert(id, Topic::new(name));
        self.document.sync_active_topics();
        info!("Added topic '{}' ({})", id, name);
        Ok(())
    }

    /// Add the topic unless it already exists. Returns whether it was created.
    pub fn ensure_topic(&mut self, id: &str, name: &str) -> StoreResult<bool> {
        match self.add_topic(id, name) {
            Ok(()) => Ok(true),
            Err(StoreError::TopicExists(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn topic_exists(&self, id: &str) -> bool {
        self.document.topics.contains_key(id)
    }

    pub fn get_topic(&self, id: &str) -> Option<&Topic> {
        self.document.topics.get(id)
    }

    pub fn list_topics(&self) -> &OrderedMap<Topic> {
        &self.document.topics
    }

    /// Remove a topic together with all of its concepts.
    pub fn remove_topic(&mut self, id: &str) -> StoreResult<Topic> {
        let topic = self
            .document
            .topics
            .remove(id)
            .ok_or_else(|| StoreError::TopicNotFound(id.to_string()))?;
        self.document.sync_active_topics();
        info!("Removed topic '{}' with {} concepts", id, topic.concepts.len());
        Ok(topic)
    }

    pub fn topic_stats(&self, id: &str) -> StoreResult<TopicStats> {
        self.get_topic(id)
            .map(Topic::stats)
            .ok_or_else(|| StoreError::TopicNotFound(id.to_string()))
    }

    /// `"default"` if present, else the first topic in insertion order.
    pub fn get_default_topic_id(&self) -> Option<&str> {
        if self.topic_exists(DEFAULT_TOPIC_ID) {
            return Some(DEFAULT_TOPIC_ID);
        }
        self.document.topics.first_key()
    }

    // --- Concepts ---

    /// Insert a concept; an existing concept with the same id is replaced.
    pub fn add_concept(&mut self, topic_id: &str, concept_id: &str, node: ConceptNode) -> StoreResult<()> {
        if concept_id.trim().is_empty() {
            return Err(StoreError::Validation("concept id must not be empty".to_string()));
        }
        let topic = self
            .document
            .topics
            .get_mut(topic_id)
            .ok_or_else(|| StoreError::TopicNotFound(topic_id.to_string()))?;
        if topic.concepts.insert(concept_id, node).is_some() {
            debug!("Replaced concept '{}' in topic '{}'", concept_id, topic_id);
        }
        Ok(())
    }

    /// Insert a concept from an untyped payload; `name` is required.
    pub fn add_concept_value(&mut self, topic_id: &str, concept_id: &str, payload: Value) -> StoreResult<()> {
        if !self.topic_exists(topic_id) {
            return Err(StoreError::TopicNotFound(topic_id.to_string()));
        }
        let node = ConceptNode::from_value(payload)?;
        self.add_concept(topic_id, concept_id, node)
    }

    /// Insert only when the id is free. Returns whether the concept was added.
    pub fn add_concept_if_absent(
        &mut self,
        topic_id: &str,
        concept_id: &str,
        node: ConceptNode,
    ) -> StoreResult<bool> {
        let exists = self
            .get_topic(topic_id)
            .ok_or_else(|| StoreError::TopicNotFound(topic_id.to_string()))?
            .concepts
            .contains_key(concept_id);
        if exists {
            return Ok(false);
        }
        self.add_concept(topic_id, concept_id, node)?;
        Ok(true)
    }

    pub fn get_concept(&self, topic_id: &str, concept_id: &str) -> Option<&ConceptNode> {
        self.get_topic(topic_id)?.concepts.get(concept_id)
    }

    fn concept_mut(&mut self, topic_id: &str, concept_id: &str) -> StoreResult<&mut ConceptNode> {
        self.document
            .topics
            .get_mut(topic_id)
            .and_then(|topic| topic.concepts.get_mut(concept_id))
            .ok_or_else(|| StoreError::ConceptNotFound {
                topic_id: topic_id.to_string(),
                concept_id: concept_id.to_string(),
            })
    }

    pub fn update_status(&mut self, topic_id: &str, concept_id: &str, key: &str, value: bool) -> StoreResult<()> {
        if key.trim().is_empty() {
            return Err(StoreError::Validation("status key must not be empty".to_string()));
        }
        let concept = self.concept_mut(topic_id, concept_id)?;
        concept.status.insert(key, Value::Bool(value));
        debug!("Status {}/{}: {} = {}", topic_id, concept_id, key, value);
        Ok(())
    }

    /// Record a quiz score. The stored best only ever increases; a lower
    /// score is accepted and ignored. Returns the best score after the call.
    pub fn update_mastery(&mut self, topic_id: &str, concept_id: &str, score_percent: f64) -> StoreResult<f64> {
        if !(0.0..=100.0).contains(&score_percent) {
            return Err(StoreError::Validation(format!(
                "score {} for {}/{} is outside 0..=100",
                score_percent, topic_id, concept_id
            )));
        }
        let concept = self.concept_mut(topic_id, concept_id)?;
        let mastery = &mut concept.mastery;
        if !mastery.is_attempted() || score_percent > mastery.best_score_percent {
            mastery.best_score_percent = score_percent;
            info!("New best score for {}/{}: {}", topic_id, concept_id, score_percent);
        }
        Ok(mastery.best_score_percent)
    }

    /// Topics owning a concept with this exact id, in topic insertion order.
    pub fn concept_owners(&self, concept_id: &str) -> Vec<&str> {
        self.document
            .topics
            .iter()
            .filter(|(_, topic)| topic.concepts.contains_key(concept_id))
            .map(|(id, _)| id)
            .collect()
    }

    /// First topic, in insertion order, containing `concept_id`.
    ///
    /// When several topics own the id the earliest-inserted one always wins.
    pub fn get_topic_by_concept(&self, concept_id: &str) -> Option<&str> {
        let owners = self.concept_owners(concept_id);
        if owners.len() > 1 {
            warn!(
                "Concept '{}' exists in topics {:?}; using '{}'",
                concept_id, owners, owners[0]
            );
        }
        owners.first().copied()
    }

    /// All concepts across topics keyed by concept id.
    ///
    /// Collisions resolve like [`get_topic_by_concept`](Self::get_topic_by_concept):
    /// the node from the earliest-inserted topic is kept.
    pub fn get_all_concepts_flat(&self) -> OrderedMap<ConceptNode> {
        let mut flat = OrderedMap::new();
        for topic in self.document.topics.values() {
            for (id, node) in topic.concepts.iter() {
                if !flat.contains_key(id) {
                    flat.insert(id, node.clone());
                }
            }
        }
        flat
    }

    /// The topic to act in: `topic_id` when given, otherwise the owner of `concept_id`.
    fn owning_topic(&self, concept_id: &str, topic_id: Option<&str>) -> StoreResult<String> {
        let resolved = match topic_id {
            Some(id) => id,
            None => self.get_topic_by_concept(concept_id).ok_or_else(|| StoreError::ConceptNotFound {
                topic_id: String::new(),
                concept_id: concept_id.to_string(),
            })?,
        };
        if !self.topic_exists(resolved) {
            return Err(StoreError::TopicNotFound(resolved.to_string()));
        }
        Ok(resolved.to_string())
    }

    /// Add a `kind` edge from `source` to `target`. The target need not exist.
    /// Returns false when the edge was already present.
    pub fn add_relationship(
        &mut self,
        source: &str,
        target: &str,
        kind: RelationshipKind,
        topic_id: Option<&str>,
    ) -> StoreResult<bool> {
        if target.trim().is_empty() {
            return Err(StoreError::Validation("relationship target must not be empty".to_string()));
        }
        let topic_id = self.owning_topic(source, topic_id)?;
        let concept = self.concept_mut(&topic_id, source)?;
        let added = concept.relationships.get_or_insert_with(Relationships::default).add(kind, target);
        if added {
            debug!("Relationship {}/{} -[{}]-> {}", topic_id, source, kind, target);
        }
        Ok(added)
    }

    /// Returns false when there was no such edge.
    pub fn remove_relationship(
        &mut self,
        source: &str,
        target: &str,
        kind: RelationshipKind,
        topic_id: Option<&str>,
    ) -> StoreResult<bool> {
        let topic_id = self.owning_topic(source, topic_id)?;
        let concept = self.concept_mut(&topic_id, source)?;
        let removed = match concept.relationships.as_mut() {
            Some(relationships) => relationships.remove(kind, target),
            None => false,
        };
        if removed {
            debug!("Removed relationship {}/{} -[{}]-> {}", topic_id, source, kind, target);
        }
        Ok(removed)
    }

    /// All outgoing edges of a concept; empty lists when none were recorded.
    pub fn get_concept_relationships(&self, concept_id: &str, topic_id: Option<&str>) -> StoreResult<Relationships> {
        let topic_id = self.owning_topic(concept_id, topic_id)?;
        let concept = self.get_concept(&topic_id, concept_id).ok_or_else(|| StoreError::ConceptNotFound {
            topic_id: topic_id.clone(),
            concept_id: concept_id.to_string(),
        })?;
        Ok(concept.relationships.clone().unwrap_or_default())
    }

    pub fn get_graph_data(&self, topic_id: &str) -> StoreResult<GraphData> {
        let topic = self
            .get_topic(topic_id)
            .ok_or_else(|| StoreError::TopicNotFound(topic_id.to_string()))?;
        Ok(graph_for(topic))
    }
}
