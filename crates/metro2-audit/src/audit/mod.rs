//! Metro-2 tradeline extraction and compliance auditing.
//!
//! [`AuditEngine`] owns the build-once registries: label rules, ontologies, the compiled
//! knowledge graph and the violation catalog. Auditing a document is a pure function of
//! the document and those registries, so one engine can be shared across threads.

pub mod catalog;
pub mod fields;
pub mod graph;
pub mod loader;
pub mod normalizer;
pub mod ontology;
pub mod parser;
pub mod report;
pub mod rules;
pub mod validators;

#[cfg(test)]
mod tests;

pub use catalog::{ViolationCatalog, ViolationExtra, ViolationMetadata, ViolationRecord};
pub use fields::{BureauFields, CanonicalField, FieldKey, FieldPath, FieldValue, InvalidFieldName};
pub use graph::{CompiledRule, KnowledgeGraph};
pub use loader::{RuleLoadError, RuleSources};
pub use ontology::OntologyMapper;
pub use report::{AuditReport, AuditSummary, PerBureau, Tradeline};
pub use rules::{FieldRule, FieldRuleRegistry};

use rayon::prelude::*;
use std::sync::Arc;
use tracing::info;

/// Three-bureau report with two tradelines, used by the demo and handler tests.
pub const SAMPLE_REPORT_HTML: &str = include_str!("../../assets/sample_report.html");

pub struct AuditEngine {
    rules: FieldRuleRegistry,
    ontologies: Arc<OntologyMapper>,
    compiled: Vec<CompiledRule>,
    catalog: ViolationCatalog,
}

impl AuditEngine {
    /// Engine over the rule base embedded in the crate.
    pub fn standard() -> Result<Self, RuleLoadError> {
        Self::from_sources(&RuleSources::embedded())
    }

    pub fn from_sources(sources: &RuleSources) -> Result<Self, RuleLoadError> {
        let rules = FieldRuleRegistry::from_json(&sources.field_rules)?;
        let ontologies = OntologyMapper::from_json(&sources.ontologies)?;
        let graph = KnowledgeGraph::from_json(&sources.knowledge_graph)?;
        let catalog = ViolationCatalog::from_json(&sources.violations)?;
        Self::from_parts(rules, ontologies, &graph, catalog)
    }

    pub fn from_parts(
        rules: FieldRuleRegistry,
        ontologies: OntologyMapper,
        knowledge_graph: &KnowledgeGraph,
        catalog: ViolationCatalog,
    ) -> Result<Self, RuleLoadError> {
        let ontologies = Arc::new(ontologies);
        let compiled = graph::compile(knowledge_graph, &ontologies)?;

        info!(
            field_rules = rules.len(),
            ontologies = ontologies.len(),
            compiled_rules = compiled.len(),
            violation_codes = catalog.len(),
            "audit engine ready"
        );

        Ok(Self {
            rules,
            ontologies,
            compiled,
            catalog,
        })
    }

    /// Parses every tradeline table and attaches bureau-tagged violations.
    ///
    /// Bureau columns that produced no fields are not validated.
    pub fn audit(&self, document: &str) -> AuditReport {
        let mut report = parser::parse(document, &self.rules);

        for tradeline in &mut report.tradelines {
            let violations: Vec<ViolationRecord> = tradeline
                .per_bureau()
                .iter()
                .filter(|(_, fields)| !fields.is_empty())
                .flat_map(|(bureau, fields)| {
                    self.validate(fields)
                        .into_iter()
                        .map(move |violation| violation.with_bureau(bureau))
                })
                .collect();
            tradeline.push_violations(violations);
        }

        report
    }

    /// Audits documents in parallel; results keep input order.
    pub fn audit_batch(&self, documents: &[&str]) -> Vec<AuditReport> {
        documents
            .par_iter()
            .map(|document| self.audit(document))
            .collect()
    }

    /// Static validators in registration order, then compiled graph rules in relationship
    /// order. Duplicate codes from both paths are kept.
    pub fn validate(&self, fields: &BureauFields) -> Vec<ViolationRecord> {
        let static_hits = validators::validate(fields)
            .into_iter()
            .map(|code| self.catalog.enrich(code, None));

        let graph_hits = self
            .compiled
            .iter()
            .filter(|rule| rule.evaluate(fields))
            .map(|rule| self.catalog.enrich(rule.code(), Some(rule.build_extra(fields))));

        static_hits.chain(graph_hits).collect()
    }

    pub fn enrich(&self, code: &str, extra: Option<ViolationExtra>) -> ViolationRecord {
        self.catalog.enrich(code, extra)
    }

    /// Builds a field map from raw strings, normalizing each value the way the rule table
    /// would for its key. Keys no rule targets are kept as trimmed text.
    pub fn fields_from_raw<I, K, V>(&self, raw: I) -> Result<BureauFields, InvalidFieldName>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut fields = BureauFields::new();
        for (name, value) in raw {
            let key = FieldKey::parse(name.as_ref())?;
            let raw_value = normalizer::clean_cell_text(value.as_ref());
            let normalized = match self.rules.rule_for_key(&key) {
                Some(rule) => rule.normalize(&raw_value),
                None => normalizer::Normalizer::Identity.apply(&raw_value),
            };
            fields.insert(key, normalized, raw_value);
        }
        Ok(fields)
    }

    pub fn field_rules(&self) -> &FieldRuleRegistry {
        &self.rules
    }

    pub fn ontologies(&self) -> &OntologyMapper {
        &self.ontologies
    }

    pub fn compiled_rules(&self) -> &[CompiledRule] {
        &self.compiled
    }

    pub fn catalog(&self) -> &ViolationCatalog {
        &self.catalog
    }
}
