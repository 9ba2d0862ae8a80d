//! Multi-topic concept map
//!
//! A versioned JSON document holding topics, each with its own concept
//! tree and per-concept learning state. Older single-topic documents are
//! migrated transparently when loaded.

pub mod draft;
pub mod error;
pub mod graph;
pub mod migration;
pub mod model;
pub mod ordered;
pub mod persist;
pub mod store;
pub mod validator;

pub use draft::{apply_draft, apply_draft_to, parse_draft, ApplySummary, MapDraft, ModuleDraft};
pub use error::{StoreError, StoreResult};
pub use graph::{EdgeStyle, GraphData, GraphEdge, GraphNode, RelationshipKind, Relationships};
pub use migration::{LegacyMigrationEngine, LoadedDocument, MigrationOutcome};
pub use model::{
    ConceptNode, Mastery, Metadata, StoreDocument, Topic, TopicStats, CURRENT_VERSION, DEFAULT_TOPIC_ID,
    DEFAULT_TOPIC_NAME, NEVER_ATTEMPTED, STATUS_EXPLAINED, STATUS_QUIZ_GENERATED,
};
pub use ordered::OrderedMap;
pub use store::ConceptMapStore;
pub use validator::{check_name, review_draft, NameIssue, NameReview};
