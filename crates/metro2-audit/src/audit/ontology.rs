use super::loader::RuleLoadError;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Deserialize)]
pub struct OntologyDefinition {
    pub id: String,
    /// Field this ontology answers for when a condition names no ontology.
    #[serde(default)]
    pub field: Option<String>,
    pub concepts: Vec<ConceptDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConceptDefinition {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// Trim + lowercase. Synonyms are compared by equality on this form only.
pub fn normalize_synonym(value: &str) -> String {
    value.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct Concept {
    id: String,
    label: Option<String>,
    synonyms: HashSet<String>,
}

impl Concept {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn accepts(&self, normalized: &str) -> bool {
        self.synonyms.contains(normalized)
    }
}

#[derive(Debug, Clone)]
pub struct Ontology {
    id: String,
    field: Option<String>,
    concepts: Vec<Concept>,
}

impl Ontology {
    fn compile(definition: OntologyDefinition) -> Result<Self, RuleLoadError> {
        let mut owners: HashMap<String, String> = HashMap::new();
        let mut concepts = Vec::with_capacity(definition.concepts.len());

        for concept in definition.concepts {
            let concept_id = concept.id.trim().to_string();
            if concept_id.is_empty() {
                return Err(RuleLoadError::EmptyConcept {
                    ontology: definition.id.clone(),
                });
            }

            let mut synonyms = HashSet::new();
            for synonym in std::iter::once(&concept_id).chain(concept.synonyms.iter()) {
                let normalized = normalize_synonym(synonym);
                if normalized.is_empty() {
                    continue;
                }
                match owners.get(&normalized) {
                    Some(first) if *first != concept_id => {
                        return Err(RuleLoadError::OverlappingSynonym {
                            ontology: definition.id.clone(),
                            synonym: normalized,
                            first: first.clone(),
                            second: concept_id.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        owners.insert(normalized.clone(), concept_id.clone());
                    }
                }
                synonyms.insert(normalized);
            }

            if concepts.iter().any(|existing: &Concept| existing.id == concept_id) {
                return Err(RuleLoadError::DuplicateConcept {
                    ontology: definition.id.clone(),
                    id: concept_id,
                });
            }

            concepts.push(Concept {
                id: concept_id,
                label: concept.label,
                synonyms,
            });
        }

        Ok(Self {
            id: definition.id,
            field: definition.field,
            concepts,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn concepts(&self) -> &[Concept] {
        &self.concepts
    }

    pub fn has_concept(&self, concept_id: &str) -> bool {
        self.concepts.iter().any(|concept| concept.id == concept_id)
    }

    /// Concept whose synonym set contains the normalized value. Blank values never resolve.
    pub fn resolve(&self, raw: &str) -> Option<&str> {
        let normalized = normalize_synonym(raw);
        if normalized.is_empty() {
            return None;
        }
        self.concepts
            .iter()
            .find(|concept| concept.accepts(&normalized))
            .map(|concept| concept.id.as_str())
    }
}

/// Build-once registry resolving raw field text to ontology concept ids.
#[derive(Debug, Clone, Default)]
pub struct OntologyMapper {
    ontologies: Vec<Ontology>,
    by_id: HashMap<String, usize>,
    field_defaults: HashMap<String, usize>,
}

impl OntologyMapper {
    pub fn from_definitions(definitions: Vec<OntologyDefinition>) -> Result<Self, RuleLoadError> {
        let mut mapper = Self::default();

        for definition in definitions {
            let ontology = Ontology::compile(definition)?;
            let index = mapper.ontologies.len();

            if mapper.by_id.contains_key(&ontology.id) {
                return Err(RuleLoadError::DuplicateOntology {
                    id: ontology.id.clone(),
                });
            }

            if let Some(field) = ontology.field.as_deref() {
                if let Some(&existing) = mapper.field_defaults.get(field) {
                    return Err(RuleLoadError::ConflictingFieldDefault {
                        field: field.to_string(),
                        first: mapper.ontologies[existing].id.clone(),
                        second: ontology.id.clone(),
                    });
                }
                mapper.field_defaults.insert(field.to_string(), index);
            }

            mapper.by_id.insert(ontology.id.clone(), index);
            mapper.ontologies.push(ontology);
        }

        Ok(mapper)
    }

    pub fn from_json(text: &str) -> Result<Self, RuleLoadError> {
        let definitions: Vec<OntologyDefinition> =
            serde_json::from_str(text).map_err(RuleLoadError::json("ontology"))?;
        Self::from_definitions(definitions)
    }

    pub fn ontology(&self, id: &str) -> Option<&Ontology> {
        self.by_id.get(id).map(|&index| &self.ontologies[index])
    }

    pub fn default_ontology_for(&self, field: &str) -> Option<&Ontology> {
        self.field_defaults
            .get(field)
            .map(|&index| &self.ontologies[index])
    }

    /// Explicit ontology first, then the field's default ontology; `None` when neither
    /// exists or no concept accepts the value.
    pub fn resolve_concept(
        &self,
        ontology_id: Option<&str>,
        raw: &str,
        field: Option<&str>,
    ) -> Option<&str> {
        let ontology = ontology_id
            .and_then(|id| self.ontology(id))
            .or_else(|| field.and_then(|field| self.default_ontology_for(field)))?;
        ontology.resolve(raw)
    }

    pub fn ontologies(&self) -> &[Ontology] {
        &self.ontologies
    }

    pub fn len(&self) -> usize {
        self.ontologies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ontologies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> OntologyMapper {
        OntologyMapper::from_json(
            r#"[
                {
                    "id": "account_status",
                    "field": "account_status",
                    "concepts": [
                        {"id": "open", "synonyms": ["Open", "Active"]},
                        {"id": "charged_off", "synonyms": ["Charge-off", "Chargeoff", "CO"]}
                    ]
                },
                {
                    "id": "portfolio",
                    "concepts": [{"id": "revolving", "synonyms": ["Credit Card"]}]
                }
            ]"#,
        )
        .expect("valid ontologies")
    }

    #[test]
    fn synonyms_match_case_and_whitespace_insensitively() {
        let mapper = mapper();
        assert_eq!(
            mapper.resolve_concept(Some("account_status"), "  CHARGE-OFF ", None),
            Some("charged_off")
        );
        assert_eq!(
            mapper.resolve_concept(Some("account_status"), "open", None),
            Some("open")
        );
    }

    #[test]
    fn concept_matching_is_exact_not_substring() {
        let mapper = mapper();
        assert_eq!(
            mapper.resolve_concept(Some("account_status"), "reopened", None),
            None
        );
        assert_eq!(
            mapper.resolve_concept(Some("account_status"), "Re-Opened", None),
            None
        );
    }

    #[test]
    fn field_default_applies_when_no_ontology_is_named() {
        let mapper = mapper();
        assert_eq!(
            mapper.resolve_concept(None, "Active", Some("account_status")),
            Some("open")
        );
        assert_eq!(
            mapper.resolve_concept(Some("missing"), "Active", Some("account_status")),
            Some("open")
        );
        assert_eq!(mapper.resolve_concept(None, "Active", Some("remarks")), None);
        assert_eq!(mapper.resolve_concept(None, "Active", None), None);
    }

    #[test]
    fn blank_values_never_resolve() {
        let mapper = mapper();
        assert_eq!(
            mapper.resolve_concept(Some("account_status"), "   ", None),
            None
        );
    }

    #[test]
    fn overlapping_synonyms_are_rejected() {
        let error = OntologyMapper::from_json(
            r#"[{"id": "status", "concepts": [
                {"id": "closed", "synonyms": ["paid"]},
                {"id": "paid", "synonyms": []}
            ]}]"#,
        )
        .expect_err("overlap");

        match error {
            RuleLoadError::OverlappingSynonym {
                synonym,
                first,
                second,
                ..
            } => {
                assert_eq!(synonym, "paid");
                assert_eq!(first, "closed");
                assert_eq!(second, "paid");
            }
            other => panic!("expected overlap error, got {other:?}"),
        }
    }

    #[test]
    fn repeated_concept_ids_are_rejected() {
        let error = OntologyMapper::from_json(
            r#"[{"id": "status", "concepts": [
                {"id": "closed", "synonyms": ["Closed"]},
                {"id": "closed", "synonyms": ["Paid and Closed"]}
            ]}]"#,
        )
        .expect_err("duplicate concept");

        match error {
            RuleLoadError::DuplicateConcept { ontology, id } => {
                assert_eq!(ontology, "status");
                assert_eq!(id, "closed");
            }
            other => panic!("expected duplicate concept error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_ontologies_and_field_defaults_are_rejected() {
        let duplicate = OntologyMapper::from_json(
            r#"[{"id": "a", "concepts": []}, {"id": "a", "concepts": []}]"#,
        );
        assert!(matches!(
            duplicate,
            Err(RuleLoadError::DuplicateOntology { .. })
        ));

        let conflicting = OntologyMapper::from_json(
            r#"[{"id": "a", "field": "x", "concepts": []}, {"id": "b", "field": "x", "concepts": []}]"#,
        );
        assert!(matches!(
            conflicting,
            Err(RuleLoadError::ConflictingFieldDefault { .. })
        ));
    }
}
