use crate::audit::catalog::ViolationCatalog;
use crate::audit::fields::{BureauFields, CanonicalField, FieldValue};
use crate::audit::graph::KnowledgeGraph;
use crate::audit::ontology::OntologyMapper;
use crate::audit::rules::FieldRuleRegistry;
use crate::audit::AuditEngine;

pub(super) fn standard_engine() -> AuditEngine {
    AuditEngine::standard().expect("embedded rule base loads")
}

/// Small self-contained rule base with one graph rule over a status ontology.
pub(super) fn closed_balance_engine() -> AuditEngine {
    let rules = FieldRuleRegistry::from_json(
        r#"[
            {"patterns": ["Status:"], "key": "account_status"},
            {"patterns": ["Balance / Past Due:"], "keys": ["balance", "past_due"], "normalizer": "currency"}
        ]"#,
    )
    .expect("rules");
    let ontologies = OntologyMapper::from_json(
        r#"[{"id": "status", "field": "account_status", "concepts": [
            {"id": "open", "synonyms": ["Open"]},
            {"id": "closed", "synonyms": ["Closed"]}
        ]}]"#,
    )
    .expect("ontologies");
    let graph = KnowledgeGraph::from_json(
        r#"{
            "nodes": [{"type": "violation", "code": "CLOSED_WITH_PAST_DUE", "category": "balance",
                       "evidenceFields": ["past_due"]}],
            "relationships": [{"type": "violation_link", "code": "CLOSED_WITH_PAST_DUE",
                "when": [{"field": "account_status", "concept": "status.closed"}],
                "checks": [{"field": "past_due", "operator": "gt", "value": 0}]}]
        }"#,
    )
    .expect("graph");
    let catalog = ViolationCatalog::from_json(
        r#"[{"code": "CLOSED_WITH_PAST_DUE", "id": 5, "violation": "Closed account with past due",
             "severity": 4, "fcraSection": "§ 623(a)(1)"}]"#,
    )
    .expect("catalog");

    AuditEngine::from_parts(rules, ontologies, &graph, catalog).expect("engine builds")
}

pub(super) fn status_fields(status: &str) -> BureauFields {
    BureauFields::new().with(CanonicalField::AccountStatus, FieldValue::text(status))
}

pub(super) fn bureau_table(rows: &[(&str, &str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(label, tu, eqf)| format!("<tr><td>{label}</td><td>{tu}</td><td>{eqf}</td></tr>"))
        .collect();
    format!("<table><tr><th></th><th>TransUnion</th><th>Equifax</th></tr>{body}</table>")
}
