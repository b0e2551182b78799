//! Declarative violation graph and its compilation into executable rules.
//!
//! Only `violation` nodes and `violation_link` relationships are read; every other node or
//! relationship type is carried through deserialization and ignored by the compiler.

mod checks;
mod compiler;

pub use checks::CheckOperator;
pub use compiler::{compile, CompiledRule};

use super::loader::RuleLoadError;
use serde::{Deserialize, Serialize};

pub const VIOLATION_NODE: &str = "violation";
pub const VIOLATION_LINK: &str = "violation_link";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub relationships: Vec<GraphRelationship>,
}

impl KnowledgeGraph {
    pub fn from_json(text: &str) -> Result<Self, RuleLoadError> {
        serde_json::from_str(text).map_err(RuleLoadError::json("knowledge graph"))
    }

    pub fn violation_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|node| node.kind == VIOLATION_NODE)
    }

    pub fn violation_links(&self) -> impl Iterator<Item = &GraphRelationship> {
        self.relationships
            .iter()
            .filter(|relationship| relationship.kind == VIOLATION_LINK)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields_impacted: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    /// Violation code this link fires.
    #[serde(default, alias = "target", alias = "violation")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<ConceptCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<CheckDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
}

/// Semantic condition: the field must resolve to one of the listed concepts.
///
/// Concept tokens are `ontology.concept` or a bare `concept`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptCondition {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concepts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontology: Option<String>,
}

impl ConceptCondition {
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.concept
            .iter()
            .chain(self.concepts.iter())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDefinition {
    pub field: String,
    #[serde(alias = "op")]
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}
