use super::catalog::ViolationRecord;
use super::fields::BureauFields;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Bureau field maps in header-column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerBureau(Vec<(String, BureauFields)>);

impl PerBureau {
    pub fn get(&self, bureau: &str) -> Option<&BureauFields> {
        self.0
            .iter()
            .find(|(name, _)| name == bureau)
            .map(|(_, fields)| fields)
    }

    pub(crate) fn entry(&mut self, bureau: &str) -> &mut BureauFields {
        let position = match self.0.iter().position(|(name, _)| name == bureau) {
            Some(position) => position,
            None => {
                self.0.push((bureau.to_string(), BureauFields::new()));
                self.0.len() - 1
            }
        };
        &mut self.0[position].1
    }

    pub fn bureaus(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BureauFields)> {
        self.0.iter().map(|(name, fields)| (name.as_str(), fields))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for PerBureau {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (bureau, fields) in &self.0 {
            map.serialize_entry(bureau, fields)?;
        }
        map.end()
    }
}

/// One account as laid out in a single report table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tradeline {
    #[serde(skip_serializing_if = "Option::is_none")]
    creditor: Option<String>,
    per_bureau: PerBureau,
    violations: Vec<ViolationRecord>,
}

impl Tradeline {
    pub(crate) fn new(creditor: Option<String>, per_bureau: PerBureau) -> Self {
        Self {
            creditor,
            per_bureau,
            violations: Vec::new(),
        }
    }

    pub(crate) fn push_violations(&mut self, violations: impl IntoIterator<Item = ViolationRecord>) {
        self.violations.extend(violations);
    }

    /// Heading text found next to the table, usually the furnisher name.
    pub fn creditor(&self) -> Option<&str> {
        self.creditor.as_deref()
    }

    pub fn per_bureau(&self) -> &PerBureau {
        &self.per_bureau
    }

    pub fn violations(&self) -> &[ViolationRecord] {
        &self.violations
    }

    pub fn violations_for<'a>(&'a self, bureau: &'a str) -> impl Iterator<Item = &'a ViolationRecord> {
        self.violations
            .iter()
            .filter(move |violation| violation.bureau.as_deref() == Some(bureau))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditReport {
    pub tradelines: Vec<Tradeline>,
}

impl AuditReport {
    pub fn violation_count(&self) -> usize {
        self.tradelines
            .iter()
            .map(|tradeline| tradeline.violations.len())
            .sum()
    }

    pub fn summary(&self) -> AuditSummary {
        let mut summary = AuditSummary {
            tradelines: self.tradelines.len(),
            ..AuditSummary::default()
        };

        for violation in self.tradelines.iter().flat_map(|t| t.violations.iter()) {
            summary.violations += 1;
            if let Some(bureau) = violation.bureau.as_deref() {
                *summary.by_bureau.entry(bureau.to_string()).or_default() += 1;
            }
            match violation.severity {
                Some(severity) => *summary.by_severity.entry(severity).or_default() += 1,
                None => summary.unmodeled += 1,
            }
        }

        summary
    }
}

/// Counts for dashboards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditSummary {
    pub tradelines: usize,
    pub violations: usize,
    pub by_bureau: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<u8, usize>,
    pub unmodeled: usize,
}
