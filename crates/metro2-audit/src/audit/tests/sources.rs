use super::common::*;
use crate::audit::loader::{RuleLoadError, RuleSources};
use crate::audit::AuditEngine;

#[test]
fn embedded_rule_base_compiles_every_link() {
    let engine = standard_engine();
    assert!(engine.field_rules().len() >= 20);
    assert_eq!(engine.ontologies().len(), 3);
    assert_eq!(engine.compiled_rules().len(), 6);
    assert_eq!(engine.catalog().len(), 9);
    for rule in engine.compiled_rules() {
        assert!(
            engine.catalog().metadata(rule.code()).is_some(),
            "graph code {} has no metadata",
            rule.code()
        );
    }
}

#[test]
fn malformed_documents_fail_construction() {
    let mut sources = RuleSources::embedded();
    sources.field_rules = r#"[{"patterns": ["Balance:"], "key": "balance", "keys": ["past_due"]}]"#.to_string();
    assert!(matches!(
        AuditEngine::from_sources(&sources),
        Err(RuleLoadError::InvalidFieldRule { index: 0, .. })
    ));

    let mut sources = RuleSources::embedded();
    sources.ontologies = r#"[{"id": "s", "concepts": [
        {"id": "open", "synonyms": ["Active"]},
        {"id": "current", "synonyms": ["active"]}
    ]}]"#
        .to_string();
    assert!(matches!(
        AuditEngine::from_sources(&sources),
        Err(RuleLoadError::OverlappingSynonym { .. })
    ));

    let mut sources = RuleSources::embedded();
    sources.knowledge_graph = "{ not json".to_string();
    assert!(matches!(
        AuditEngine::from_sources(&sources),
        Err(RuleLoadError::Json { document: "knowledge graph", .. })
    ));
}
