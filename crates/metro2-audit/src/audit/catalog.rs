use super::fields::FieldValue;
use super::loader::RuleLoadError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const UNKNOWN_VIOLATION: &str = "Unknown violation code";

/// Static description of one violation code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationMetadata {
    pub code: String,
    pub id: u32,
    pub violation: String,
    pub severity: u8,
    pub fcra_section: String,
}

/// Dynamic fields merged over the static metadata; any field set here wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcra_section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields_impacted: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<BTreeMap<String, FieldValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bureau: Option<String>,
}

/// Enriched violation as handed to letter generation.
///
/// Serialization order is fixed: `code`, the static metadata, then dynamic fields.
/// Unknown codes carry only `code` and `violation`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationRecord {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub violation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcra_section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields_impacted: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<BTreeMap<String, FieldValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bureau: Option<String>,
}

impl ViolationRecord {
    pub fn unknown(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            id: None,
            violation: UNKNOWN_VIOLATION.to_string(),
            severity: None,
            fcra_section: None,
            detail: None,
            category: None,
            fields_impacted: None,
            scope: None,
            evidence: None,
            bureau: None,
        }
    }

    /// Whether static metadata exists for this code.
    pub fn is_modeled(&self) -> bool {
        self.id.is_some()
    }

    pub fn with_bureau(mut self, bureau: impl Into<String>) -> Self {
        self.bureau = Some(bureau.into());
        self
    }

    fn from_metadata(metadata: &ViolationMetadata, extra: ViolationExtra) -> Self {
        Self {
            code: metadata.code.clone(),
            id: Some(metadata.id),
            violation: extra
                .violation
                .unwrap_or_else(|| metadata.violation.clone()),
            severity: extra.severity.or(Some(metadata.severity)),
            fcra_section: extra
                .fcra_section
                .or_else(|| Some(metadata.fcra_section.clone())),
            detail: extra.detail,
            category: extra.category,
            fields_impacted: extra.fields_impacted,
            scope: extra.scope,
            evidence: extra.evidence,
            bureau: extra.bureau,
        }
    }
}

pub(crate) fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Read-only violation metadata table keyed by normalized code.
#[derive(Debug, Clone, Default)]
pub struct ViolationCatalog {
    entries: HashMap<String, ViolationMetadata>,
}

impl ViolationCatalog {
    pub fn from_entries(entries: Vec<ViolationMetadata>) -> Result<Self, RuleLoadError> {
        let mut catalog = HashMap::with_capacity(entries.len());
        for mut metadata in entries {
            let key = normalize_code(&metadata.code);
            metadata.code = key.clone();
            if catalog.insert(key.clone(), metadata).is_some() {
                return Err(RuleLoadError::DuplicateViolationCode { code: key });
            }
        }
        Ok(Self { entries: catalog })
    }

    pub fn from_json(text: &str) -> Result<Self, RuleLoadError> {
        let entries: Vec<ViolationMetadata> =
            serde_json::from_str(text).map_err(RuleLoadError::json("violation metadata"))?;
        Self::from_entries(entries)
    }

    pub fn metadata(&self, code: &str) -> Option<&ViolationMetadata> {
        self.entries.get(&normalize_code(code))
    }

    pub fn enrich(&self, code: &str, extra: Option<ViolationExtra>) -> ViolationRecord {
        match self.metadata(code) {
            Some(metadata) => ViolationRecord::from_metadata(metadata, extra.unwrap_or_default()),
            None => {
                tracing::debug!(code, "no metadata for violation code");
                ViolationRecord::unknown(code)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> ViolationCatalog {
        ViolationCatalog::from_json(
            r#"[
                {"code": "MISSING_DOFD", "id": 2, "violation": "Missing DOFD", "severity": 5, "fcraSection": "§ 623(a)(5)"}
            ]"#,
        )
        .expect("valid catalog")
    }

    #[test]
    fn lookup_ignores_case() {
        let catalog = catalog();
        assert_eq!(
            catalog.enrich("MISSING_DOFD", None),
            catalog.enrich("missing_dofd", None)
        );
        assert_eq!(catalog.enrich(" Missing_Dofd ", None).id, Some(2));
    }

    #[test]
    fn unknown_codes_serialize_to_code_and_description_only() {
        let record = catalog().enrich("NOT_A_REAL_CODE", None);
        assert!(!record.is_modeled());
        assert_eq!(
            serde_json::to_value(&record).expect("serialize"),
            json!({"code": "NOT_A_REAL_CODE", "violation": "Unknown violation code"})
        );
    }

    #[test]
    fn extra_fields_override_metadata() {
        let record = catalog().enrich(
            "missing_dofd",
            Some(ViolationExtra {
                severity: Some(3),
                bureau: Some("Equifax".to_string()),
                ..ViolationExtra::default()
            }),
        );
        assert_eq!(record.severity, Some(3));
        assert_eq!(record.fcra_section.as_deref(), Some("§ 623(a)(5)"));
        assert_eq!(record.bureau.as_deref(), Some("Equifax"));
    }

    #[test]
    fn serialized_record_starts_with_code() {
        let record = catalog().enrich("missing_dofd", None);
        let text = serde_json::to_string(&record).expect("serialize");
        assert!(text.starts_with(r#"{"code":"MISSING_DOFD","id":2,"violation""#));
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let result = ViolationCatalog::from_json(
            r#"[
                {"code": "A", "id": 1, "violation": "a", "severity": 1, "fcraSection": "x"},
                {"code": "a", "id": 2, "violation": "b", "severity": 1, "fcraSection": "x"}
            ]"#,
        );
        assert!(matches!(
            result,
            Err(RuleLoadError::DuplicateViolationCode { .. })
        ));
    }
}
