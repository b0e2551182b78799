use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

const RAW_SUFFIX: &str = "_raw";
const BLANK_PLACEHOLDERS: &[&str] = &["n/a", "na", "not reported", "--"];

/// Closed set of tradeline fields the validators and default rule table know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalField {
    AccountNumber,
    AccountType,
    AccountStatus,
    PaymentStatus,
    Creditor,
    Balance,
    PastDue,
    HighCredit,
    CreditLimit,
    MonthlyPayment,
    DateOpened,
    DateClosed,
    LastReported,
    DateLastActive,
    DateLastPayment,
    DateOfFirstDelinquency,
    Remarks,
    Terms,
    Times30Late,
    Times60Late,
    Times90Late,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 21] = [
        CanonicalField::AccountNumber,
        CanonicalField::AccountType,
        CanonicalField::AccountStatus,
        CanonicalField::PaymentStatus,
        CanonicalField::Creditor,
        CanonicalField::Balance,
        CanonicalField::PastDue,
        CanonicalField::HighCredit,
        CanonicalField::CreditLimit,
        CanonicalField::MonthlyPayment,
        CanonicalField::DateOpened,
        CanonicalField::DateClosed,
        CanonicalField::LastReported,
        CanonicalField::DateLastActive,
        CanonicalField::DateLastPayment,
        CanonicalField::DateOfFirstDelinquency,
        CanonicalField::Remarks,
        CanonicalField::Terms,
        CanonicalField::Times30Late,
        CanonicalField::Times60Late,
        CanonicalField::Times90Late,
    ];

    /// Name used by rule tables and in serialized field maps.
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::AccountNumber => "account_number",
            CanonicalField::AccountType => "account_type",
            CanonicalField::AccountStatus => "account_status",
            CanonicalField::PaymentStatus => "payment_status",
            CanonicalField::Creditor => "creditor",
            CanonicalField::Balance => "balance",
            CanonicalField::PastDue => "past_due",
            CanonicalField::HighCredit => "high_credit",
            CanonicalField::CreditLimit => "credit_limit",
            CanonicalField::MonthlyPayment => "monthly_payment",
            CanonicalField::DateOpened => "date_opened",
            CanonicalField::DateClosed => "date_closed",
            CanonicalField::LastReported => "last_reported",
            CanonicalField::DateLastActive => "date_last_active",
            CanonicalField::DateLastPayment => "date_last_payment",
            CanonicalField::DateOfFirstDelinquency => "date_of_first_delinquency",
            CanonicalField::Remarks => "remarks",
            CanonicalField::Terms => "terms",
            CanonicalField::Times30Late => "times_30_late",
            CanonicalField::Times60Late => "times_60_late",
            CanonicalField::Times90Late => "times_90_late",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.as_str() == name)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid field name (expected lowercase snake_case without a `_raw` suffix)")]
pub struct InvalidFieldName(pub String);

/// Key of one extracted field: either a canonical field or a rule-table extension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
    Canonical(CanonicalField),
    Extension(String),
}

impl FieldKey {
    pub fn parse(name: &str) -> Result<Self, InvalidFieldName> {
        let name = name.trim();
        if let Some(field) = CanonicalField::from_name(name) {
            return Ok(Self::Canonical(field));
        }

        let mut chars = name.chars();
        let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let snake_case = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !starts_with_letter || !snake_case || name.ends_with(RAW_SUFFIX) {
            return Err(InvalidFieldName(name.to_string()));
        }

        Ok(Self::Extension(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldKey::Canonical(field) => field.as_str(),
            FieldKey::Extension(name) => name,
        }
    }

    pub fn raw_name(&self) -> String {
        format!("{}{RAW_SUFFIX}", self.as_str())
    }
}

impl From<CanonicalField> for FieldKey {
    fn from(field: CanonicalField) -> Self {
        Self::Canonical(field)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized value of a field. `Empty` is the sentinel for values a normalizer could not read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
    Empty,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            FieldValue::Text(text) => Some(Cow::Borrowed(text.as_str())),
            FieldValue::Number(number) => Some(Cow::Owned(number.to_string())),
            FieldValue::List(_) | FieldValue::Empty => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(number) if number.is_finite() => Some(*number),
            FieldValue::Text(text) => parse_number(text),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(text) => is_blank_text(text),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Number(number) => !number.is_finite(),
        }
    }
}

/// Locale-agnostic number read: every character except digits, `.` and `-` is dropped.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|number| number.is_finite())
}

pub(crate) fn is_blank_text(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty()
        || BLANK_PLACEHOLDERS
            .iter()
            .any(|placeholder| trimmed.eq_ignore_ascii_case(placeholder))
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub value: FieldValue,
    pub raw: String,
}

/// Which half of a field entry a path reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPart {
    Value,
    Raw,
}

/// Compiled accessor into a [`BureauFields`] map.
///
/// Accepted spellings: `balance`, `balance.value`, `balance_raw`, `balance.raw`,
/// optionally prefixed with `fields.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    key: FieldKey,
    part: FieldPart,
    source: String,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self, InvalidFieldName> {
        let source = path.trim().to_string();
        let invalid = || InvalidFieldName(source.clone());
        let mut segments: Vec<&str> = source.split('.').collect();
        if segments.first() == Some(&"fields") && segments.len() > 1 {
            segments.remove(0);
        }

        let (name, part) = match segments.as_slice() {
            [single] => match single.strip_suffix(RAW_SUFFIX) {
                Some(stripped) => (stripped, FieldPart::Raw),
                None => (*single, FieldPart::Value),
            },
            [name, "raw"] => (*name, FieldPart::Raw),
            [name, "value"] => (*name, FieldPart::Value),
            _ => return Err(invalid()),
        };

        let key = FieldKey::parse(name).map_err(|_| invalid())?;
        Ok(Self { key, part, source })
    }

    pub fn key(&self) -> &FieldKey {
        &self.key
    }

    pub fn part(&self) -> FieldPart {
        self.part
    }

    /// The path exactly as written in the rule document.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Field map extracted for one bureau column: normalized value plus raw companion per key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BureauFields {
    entries: BTreeMap<FieldKey, FieldEntry>,
}

impl BureauFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<FieldKey>, value: FieldValue, raw: impl Into<String>) {
        self.entries.insert(
            key.into(),
            FieldEntry {
                value,
                raw: raw.into(),
            },
        );
    }

    /// Builder-style insert where the raw string is the value's own text.
    pub fn with(mut self, field: CanonicalField, value: FieldValue) -> Self {
        let raw = value
            .as_text()
            .map(|text| text.into_owned())
            .unwrap_or_default();
        self.insert(field, value, raw);
        self
    }

    pub fn entry(&self, key: &FieldKey) -> Option<&FieldEntry> {
        self.entries.get(key)
    }

    pub fn value(&self, field: CanonicalField) -> Option<&FieldValue> {
        self.entries
            .get(&FieldKey::Canonical(field))
            .map(|entry| &entry.value)
    }

    pub fn raw(&self, field: CanonicalField) -> Option<&str> {
        self.entries
            .get(&FieldKey::Canonical(field))
            .map(|entry| entry.raw.as_str())
    }

    pub fn resolve(&self, path: &FieldPath) -> Option<Cow<'_, FieldValue>> {
        let entry = self.entries.get(&path.key)?;
        Some(match path.part {
            FieldPart::Value => Cow::Borrowed(&entry.value),
            FieldPart::Raw => Cow::Owned(FieldValue::Text(entry.raw.clone())),
        })
    }

    /// Missing fields read as blank.
    pub fn is_blank(&self, field: CanonicalField) -> bool {
        self.value(field).map_or(true, FieldValue::is_blank)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &FieldEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for BureauFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len() * 2))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key.as_str(), &entry.value)?;
            map.serialize_entry(&key.raw_name(), &entry.raw)?;
        }
        map.end()
    }
}
