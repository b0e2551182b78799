use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const FIELD_RULES_FILE: &str = "field_rules.json";
pub const ONTOLOGIES_FILE: &str = "ontologies.json";
pub const KNOWLEDGE_GRAPH_FILE: &str = "knowledge_graph.json";
pub const VIOLATIONS_FILE: &str = "violations.json";

/// Configuration errors raised while building the rule registries.
#[derive(Debug, thiserror::Error)]
pub enum RuleLoadError {
    #[error("failed to read rule document {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed {document} document: {source}")]
    Json {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("field rule #{index} is invalid: {reason}")]
    InvalidFieldRule { index: usize, reason: String },
    #[error("field rule #{index} has an invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("field rule #{index} references unknown normalizer '{name}'")]
    UnknownNormalizer { index: usize, name: String },
    #[error("ontology '{id}' is defined more than once")]
    DuplicateOntology { id: String },
    #[error("ontology '{ontology}' defines concept '{id}' more than once")]
    DuplicateConcept { ontology: String, id: String },
    #[error("ontology '{ontology}' contains a concept without an id")]
    EmptyConcept { ontology: String },
    #[error("ontology '{ontology}': synonym '{synonym}' belongs to both '{first}' and '{second}'")]
    OverlappingSynonym {
        ontology: String,
        synonym: String,
        first: String,
        second: String,
    },
    #[error("field '{field}' has two default ontologies ('{first}' and '{second}')")]
    ConflictingFieldDefault {
        field: String,
        first: String,
        second: String,
    },
    #[error("knowledge graph relationship {relationship} references invalid field path '{path}'")]
    InvalidFieldPath { relationship: String, path: String },
    #[error("knowledge graph relationship {relationship}: '{operator}' check on '{field}' has a non-numeric threshold")]
    InvalidCheck {
        relationship: String,
        field: String,
        operator: String,
    },
    #[error("violation code '{code}' is defined more than once")]
    DuplicateViolationCode { code: String },
}

impl RuleLoadError {
    pub(crate) fn json(document: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Self::Json { document, source }
    }
}

/// The four rule documents the engine is built from, as JSON text.
#[derive(Debug, Clone)]
pub struct RuleSources {
    pub field_rules: String,
    pub ontologies: String,
    pub knowledge_graph: String,
    pub violations: String,
}

impl RuleSources {
    /// Rule base compiled into the crate.
    pub fn embedded() -> Self {
        Self {
            field_rules: include_str!("../../assets/field_rules.json").to_string(),
            ontologies: include_str!("../../assets/ontologies.json").to_string(),
            knowledge_graph: include_str!("../../assets/knowledge_graph.json").to_string(),
            violations: include_str!("../../assets/violations.json").to_string(),
        }
    }

    /// Embedded rule base with any documents present in `dir` taking precedence.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, RuleLoadError> {
        let dir = dir.as_ref();
        let mut sources = Self::embedded();
        override_from(dir, FIELD_RULES_FILE, &mut sources.field_rules)?;
        override_from(dir, ONTOLOGIES_FILE, &mut sources.ontologies)?;
        override_from(dir, KNOWLEDGE_GRAPH_FILE, &mut sources.knowledge_graph)?;
        override_from(dir, VIOLATIONS_FILE, &mut sources.violations)?;
        Ok(sources)
    }
}

fn override_from(dir: &Path, name: &str, slot: &mut String) -> Result<(), RuleLoadError> {
    let path = dir.join(name);
    match fs::read_to_string(&path) {
        Ok(text) => {
            tracing::debug!(path = %path.display(), "rule document override loaded");
            *slot = text;
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(RuleLoadError::Io { path, source }),
    }
}
