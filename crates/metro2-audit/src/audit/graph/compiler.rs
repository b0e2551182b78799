use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::checks::CheckOperator;
use super::{CheckDefinition, ConceptCondition, GraphNode, GraphRelationship, KnowledgeGraph};
use crate::audit::catalog::{normalize_code, ViolationExtra};
use crate::audit::fields::{BureauFields, FieldPath, FieldValue};
use crate::audit::loader::RuleLoadError;
use crate::audit::ontology::OntologyMapper;

type Predicate = Box<dyn Fn(&BureauFields) -> bool + Send + Sync>;

/// A `violation_link` turned into predicates plus an evidence builder.
pub struct CompiledRule {
    id: String,
    code: String,
    when: Vec<Predicate>,
    checks: Vec<Predicate>,
    base: ViolationExtra,
    evidence: Vec<FieldPath>,
}

impl CompiledRule {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Violation code emitted when the rule fires.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// All concept conditions and all checks must hold.
    pub fn evaluate(&self, fields: &BureauFields) -> bool {
        self.when.iter().all(|predicate| predicate(fields))
            && self.checks.iter().all(|predicate| predicate(fields))
    }

    /// Node metadata plus an `evidence` map of the non-blank evidence fields.
    pub fn build_extra(&self, fields: &BureauFields) -> ViolationExtra {
        let evidence: BTreeMap<String, FieldValue> = self
            .evidence
            .iter()
            .filter_map(|path| {
                let value = fields.resolve(path)?;
                (!value.is_blank()).then(|| (path.as_str().to_string(), value.into_owned()))
            })
            .collect();

        ViolationExtra {
            evidence: (!evidence.is_empty()).then_some(evidence),
            ..self.base.clone()
        }
    }
}

impl fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("id", &self.id)
            .field("code", &self.code)
            .field("when", &self.when.len())
            .field("checks", &self.checks.len())
            .finish()
    }
}

/// Compiles every usable `violation_link` in relationship order.
///
/// Dangling codes, links without a usable check, unknown operators and concept conditions
/// without tokens are dropped. An unparseable field path or a non-numeric threshold on a
/// numeric operator is an error.
pub fn compile(
    graph: &KnowledgeGraph,
    mapper: &Arc<OntologyMapper>,
) -> Result<Vec<CompiledRule>, RuleLoadError> {
    let nodes: HashMap<String, &GraphNode> = graph
        .violation_nodes()
        .filter_map(|node| node.code.as_deref().map(|code| (normalize_code(code), node)))
        .collect();

    let mut compiled = Vec::new();
    for (index, relationship) in graph.relationships.iter().enumerate() {
        if relationship.kind != super::VIOLATION_LINK {
            continue;
        }
        let rule_id = relationship
            .id
            .clone()
            .unwrap_or_else(|| format!("relationship-{index}"));
        if let Some(rule) = compile_link(rule_id, relationship, &nodes, mapper)? {
            compiled.push(rule);
        }
    }

    Ok(compiled)
}

fn compile_link(
    rule_id: String,
    relationship: &GraphRelationship,
    nodes: &HashMap<String, &GraphNode>,
    mapper: &Arc<OntologyMapper>,
) -> Result<Option<CompiledRule>, RuleLoadError> {
    let Some(code) = relationship.code.as_deref() else {
        debug!(rule = %rule_id, "violation link without a code discarded");
        return Ok(None);
    };
    let Some(node) = nodes.get(&normalize_code(code)) else {
        debug!(rule = %rule_id, code, "violation link references unknown violation node");
        return Ok(None);
    };

    let path = |raw: &str| {
        FieldPath::parse(raw).map_err(|_| RuleLoadError::InvalidFieldPath {
            relationship: rule_id.clone(),
            path: raw.to_string(),
        })
    };

    let mut when = Vec::new();
    for condition in &relationship.when {
        let field = path(&condition.field)?;
        if let Some(predicate) = concept_predicate(&rule_id, condition, field, mapper) {
            when.push(predicate);
        }
    }

    let mut checks = Vec::new();
    for check in &relationship.checks {
        let field = path(&check.field)?;
        if let Some(predicate) = check_predicate(&rule_id, check, field)? {
            checks.push(predicate);
        }
    }

    if checks.is_empty() {
        debug!(rule = %rule_id, code, "violation link has no usable checks; discarded");
        return Ok(None);
    }

    let evidence_names = if relationship.evidence.is_empty() {
        &node.evidence_fields
    } else {
        &relationship.evidence
    };
    let evidence = evidence_names
        .iter()
        .map(|name| path(name))
        .collect::<Result<Vec<_>, _>>()?;

    let base = ViolationExtra {
        detail: node.detail.clone(),
        category: node.category.clone(),
        fields_impacted: node.fields_impacted.clone(),
        scope: node.scope.clone(),
        ..ViolationExtra::default()
    };

    Ok(Some(CompiledRule {
        code: normalize_code(code),
        id: rule_id,
        when,
        checks,
        base,
        evidence,
    }))
}

/// One acceptable concept: the ontology to query and the concept id it must resolve to.
/// `ontology` is `None` when neither the token, the condition nor the field names one.
struct AllowedConcept {
    ontology: Option<String>,
    concept: String,
}

fn concept_predicate(
    rule_id: &str,
    condition: &ConceptCondition,
    field: FieldPath,
    mapper: &Arc<OntologyMapper>,
) -> Option<Predicate> {
    let field_name = field.key().as_str().to_string();
    let fallback = condition
        .ontology
        .clone()
        .or_else(|| mapper.default_ontology_for(&field_name).map(|o| o.id().to_string()));

    let allowed: Vec<AllowedConcept> = condition
        .tokens()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| match token.split_once('.') {
            Some((ontology, concept)) => AllowedConcept {
                ontology: Some(ontology.to_string()),
                concept: concept.to_string(),
            },
            None => AllowedConcept {
                ontology: fallback.clone(),
                concept: token.to_string(),
            },
        })
        .collect();

    if allowed.is_empty() {
        debug!(rule = rule_id, field = %field_name, "concept condition has no concept tokens; dropped");
        return None;
    }

    for entry in &allowed {
        let known = entry
            .ontology
            .as_deref()
            .and_then(|id| mapper.ontology(id))
            .is_some_and(|ontology| ontology.has_concept(&entry.concept));
        if !known {
            debug!(
                rule = rule_id,
                ontology = entry.ontology.as_deref().unwrap_or("-"),
                concept = %entry.concept,
                field = %field_name,
                "concept token names no loaded concept; it never matches"
            );
        }
    }

    let mapper = Arc::clone(mapper);
    Some(Box::new(move |fields: &BureauFields| {
        let Some(text) = concept_text(fields, &field) else {
            return false;
        };
        allowed.iter().any(|entry| {
            entry.ontology.as_deref().is_some_and(|ontology| {
                mapper
                    .resolve_concept(Some(ontology), &text, None)
                    .is_some_and(|concept| concept == entry.concept)
            })
        })
    }))
}

/// Raw cell text of the field, or the normalized text when no raw string was kept.
fn concept_text(fields: &BureauFields, field: &FieldPath) -> Option<String> {
    let entry = fields.entry(field.key())?;
    if !entry.raw.trim().is_empty() {
        return Some(entry.raw.clone());
    }
    entry.value.as_text().map(|text| text.into_owned())
}

fn check_predicate(
    rule_id: &str,
    check: &CheckDefinition,
    field: FieldPath,
) -> Result<Option<Predicate>, RuleLoadError> {
    let operator = CheckOperator::parse(&check.operator, check.value.as_ref()).map_err(|_| {
        RuleLoadError::InvalidCheck {
            relationship: rule_id.to_string(),
            field: check.field.clone(),
            operator: check.operator.clone(),
        }
    })?;
    let Some(operator) = operator else {
        debug!(rule = rule_id, operator = %check.operator, "unsupported check operator dropped");
        return Ok(None);
    };

    Ok(Some(Box::new(move |fields: &BureauFields| {
        let value = fields.resolve(&field);
        operator.holds(value.as_deref())
    })))
}
