//! Knowledge-graph relationships between concepts
//!
//! Each concept may list outgoing edges of four kinds. Targets are concept
//! ids and do not have to exist yet.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::error::StoreError;
use super::model::Topic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    Prerequisites,
    Dependencies,
    Related,
    Enables,
}

impl RelationshipKind {
    pub const ALL: [RelationshipKind; 4] = [
        RelationshipKind::Prerequisites,
        RelationshipKind::Dependencies,
        RelationshipKind::Related,
        RelationshipKind::Enables,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Prerequisites => "prerequisites",
            RelationshipKind::Dependencies => "dependencies",
            RelationshipKind::Related => "related",
            RelationshipKind::Enables => "enables",
        }
    }

    pub fn edge_style(&self) -> EdgeStyle {
        let (color, line, arrow) = match self {
            RelationshipKind::Prerequisites => ("#FF6B6B", "solid", "to"),
            RelationshipKind::Dependencies => ("#4ECDC4", "dashed", "to"),
            RelationshipKind::Related => ("#45B7D1", "dotted", "none"),
            RelationshipKind::Enables => ("#96CEB4", "solid", "to"),
        };
        EdgeStyle { color, line, arrow }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the plural key names and their singular forms.
impl FromStr for RelationshipKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prerequisites" | "prerequisite" => Ok(RelationshipKind::Prerequisites),
            "dependencies" | "dependency" => Ok(RelationshipKind::Dependencies),
            "related" => Ok(RelationshipKind::Related),
            "enables" | "enable" => Ok(RelationshipKind::Enables),
            other => Err(StoreError::Validation(format!(
                "unsupported relationship type '{}' (expected prerequisites, dependencies, related or enables)",
                other
            ))),
        }
    }
}

/// Outgoing edges of one concept, by kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationships {
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub related: Vec<String>,
    #[serde(default)]
    pub enables: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Relationships {
    pub fn targets(&self, kind: RelationshipKind) -> &[String] {
        match kind {
            RelationshipKind::Prerequisites => &self.prerequisites,
            RelationshipKind::Dependencies => &self.dependencies,
            RelationshipKind::Related => &self.related,
            RelationshipKind::Enables => &self.enables,
        }
    }

    fn targets_mut(&mut self, kind: RelationshipKind) -> &mut Vec<String> {
        match kind {
            RelationshipKind::Prerequisites => &mut self.prerequisites,
            RelationshipKind::Dependencies => &mut self.dependencies,
            RelationshipKind::Related => &mut self.related,
            RelationshipKind::Enables => &mut self.enables,
        }
    }

    /// Add an edge; returns false when it was already there.
    pub fn add(&mut self, kind: RelationshipKind, target: &str) -> bool {
        let list = self.targets_mut(kind);
        if list.iter().any(|t| t == target) {
            return false;
        }
        list.push(target.to_string());
        true
    }

    /// Remove an edge; returns false when it did not exist.
    pub fn remove(&mut self, kind: RelationshipKind, target: &str) -> bool {
        let list = self.targets_mut(kind);
        let before = list.len();
        list.retain(|t| t != target);
        list.len() != before
    }

    pub fn is_empty(&self) -> bool {
        RelationshipKind::ALL.iter().all(|k| self.targets(*k).is_empty())
    }

    /// Every edge in kind order, then target order.
    pub fn edges(&self) -> impl Iterator<Item = (RelationshipKind, &str)> {
        RelationshipKind::ALL
            .into_iter()
            .flat_map(move |kind| self.targets(kind).iter().map(move |t| (kind, t.as_str())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeStyle {
    pub color: &'static str,
    #[serde(rename = "style")]
    pub line: &'static str,
    pub arrow: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub difficulty: i64,
    pub importance: i64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    pub style: EdgeStyle,
}

/// Nodes and edges of one topic, ready for a graph renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Node attributes come from the optional `graph_metadata` object
/// (`difficulty` and `importance` default to 1).
pub fn graph_for(topic: &Topic) -> GraphData {
    let mut graph = GraphData::default();
    for (id, concept) in topic.concepts.iter() {
        let meta = concept.extra.get("graph_metadata");
        let level = |key: &str| meta.and_then(|m| m.get(key)).and_then(Value::as_i64).unwrap_or(1);
        let tags = meta
            .and_then(|m| m.get("tags"))
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        graph.nodes.push(GraphNode {
            id: id.to_string(),
            name: concept.name.clone(),
            difficulty: level("difficulty"),
            importance: level("importance"),
            tags,
        });

        if let Some(relationships) = &concept.relationships {
            for (kind, target) in relationships.edges() {
                graph.edges.push(GraphEdge {
                    from: id.to_string(),
                    to: target.to_string(),
                    kind,
                    style: kind.edge_style(),
                });
            }
        }
    }
    graph
}
