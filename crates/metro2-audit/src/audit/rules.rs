use super::fields::{FieldKey, FieldValue};
use super::loader::RuleLoadError;
use super::normalizer::Normalizer;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

const DEFAULT_SPLIT: &str = "/";

/// Label matcher as written in the rule table: a bare string is an exact match.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PatternDefinition {
    Exact(String),
    Regex {
        regex: String,
        #[serde(default)]
        case_insensitive: bool,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldRuleDefinition {
    pub patterns: Vec<PatternDefinition>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    #[serde(default)]
    pub split: Option<String>,
    #[serde(default)]
    pub normalizer: Option<String>,
}

#[derive(Debug, Clone)]
pub enum LabelPattern {
    Exact(String),
    Regex(Regex),
}

impl LabelPattern {
    pub fn matches(&self, label: &str) -> bool {
        match self {
            LabelPattern::Exact(expected) => expected == label,
            LabelPattern::Regex(regex) => regex.is_match(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleTarget {
    Single(FieldKey),
    Split {
        keys: Vec<FieldKey>,
        delimiter: String,
    },
}

/// One compiled entry of the label dispatch table.
#[derive(Debug, Clone)]
pub struct FieldRule {
    patterns: Vec<LabelPattern>,
    target: RuleTarget,
    normalizer: Option<Normalizer>,
}

impl FieldRule {
    pub fn compile(index: usize, definition: FieldRuleDefinition) -> Result<Self, RuleLoadError> {
        let invalid = |reason: &str| RuleLoadError::InvalidFieldRule {
            index,
            reason: reason.to_string(),
        };

        if definition.patterns.is_empty() {
            return Err(invalid("at least one pattern is required"));
        }

        let patterns = definition
            .patterns
            .into_iter()
            .map(|pattern| compile_pattern(index, pattern))
            .collect::<Result<Vec<_>, _>>()?;

        let parse_key = |name: &str| {
            FieldKey::parse(name).map_err(|err| RuleLoadError::InvalidFieldRule {
                index,
                reason: err.to_string(),
            })
        };

        let target = match (definition.key, definition.keys) {
            (Some(_), Some(_)) => return Err(invalid("`key` and `keys` are mutually exclusive")),
            (None, None) => return Err(invalid("one of `key` or `keys` is required")),
            (Some(key), None) => {
                if definition.split.is_some() {
                    return Err(invalid("`split` only applies to multi-key rules"));
                }
                RuleTarget::Single(parse_key(&key)?)
            }
            (None, Some(keys)) => {
                if keys.is_empty() {
                    return Err(invalid("`keys` must not be empty"));
                }
                let delimiter = definition
                    .split
                    .unwrap_or_else(|| DEFAULT_SPLIT.to_string());
                if delimiter.is_empty() {
                    return Err(invalid("`split` delimiter must not be empty"));
                }
                let keys = keys
                    .iter()
                    .map(|key| parse_key(key))
                    .collect::<Result<Vec<_>, _>>()?;
                RuleTarget::Split { keys, delimiter }
            }
        };

        let normalizer = definition
            .normalizer
            .map(|name| {
                Normalizer::from_name(&name)
                    .ok_or(RuleLoadError::UnknownNormalizer { index, name })
            })
            .transpose()?;

        Ok(Self {
            patterns,
            target,
            normalizer,
        })
    }

    pub fn matches(&self, label: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(label))
    }

    pub fn target(&self) -> &RuleTarget {
        &self.target
    }

    pub fn normalizer(&self) -> Option<Normalizer> {
        self.normalizer
    }

    pub fn targets(&self, key: &FieldKey) -> bool {
        match &self.target {
            RuleTarget::Single(single) => single == key,
            RuleTarget::Split { keys, .. } => keys.contains(key),
        }
    }

    pub fn normalize(&self, raw: &str) -> FieldValue {
        match self.normalizer {
            Some(normalizer) => normalizer.apply(raw),
            None => FieldValue::text(raw),
        }
    }

    /// Turns one cell into `(key, normalized, raw)` triples.
    ///
    /// Multi-key rules normalize each split part on its own; missing trailing parts
    /// normalize from an empty string.
    pub fn extract(&self, raw: &str) -> Vec<(FieldKey, FieldValue, String)> {
        match &self.target {
            RuleTarget::Single(key) => vec![(key.clone(), self.normalize(raw), raw.to_string())],
            RuleTarget::Split { keys, delimiter } => {
                let parts: Vec<&str> = raw.split(delimiter.as_str()).map(str::trim).collect();
                keys.iter()
                    .enumerate()
                    .map(|(position, key)| {
                        let part = parts.get(position).copied().unwrap_or("");
                        (key.clone(), self.normalize(part), part.to_string())
                    })
                    .collect()
            }
        }
    }
}

fn compile_pattern(index: usize, pattern: PatternDefinition) -> Result<LabelPattern, RuleLoadError> {
    match pattern {
        PatternDefinition::Exact(text) => Ok(LabelPattern::Exact(text)),
        PatternDefinition::Regex {
            regex,
            case_insensitive,
        } => RegexBuilder::new(&regex)
            .case_insensitive(case_insensitive)
            .build()
            .map(LabelPattern::Regex)
            .map_err(|source| RuleLoadError::InvalidPattern {
                index,
                pattern: regex,
                source,
            }),
    }
}

/// Ordered label dispatch table. Lookup is first match in registration order.
#[derive(Debug, Clone, Default)]
pub struct FieldRuleRegistry {
    rules: Vec<FieldRule>,
}

impl FieldRuleRegistry {
    pub fn from_definitions(
        definitions: Vec<FieldRuleDefinition>,
    ) -> Result<Self, RuleLoadError> {
        let rules = definitions
            .into_iter()
            .enumerate()
            .map(|(index, definition)| FieldRule::compile(index, definition))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn from_json(text: &str) -> Result<Self, RuleLoadError> {
        let definitions: Vec<FieldRuleDefinition> =
            serde_json::from_str(text).map_err(RuleLoadError::json("field rule"))?;
        Self::from_definitions(definitions)
    }

    pub fn find_rule(&self, label: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|rule| rule.matches(label))
    }

    /// First rule that writes `key`; used to normalize values supplied outside a document.
    pub fn rule_for_key(&self, key: &FieldKey) -> Option<&FieldRule> {
        self.rules.iter().find(|rule| rule.targets(key))
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::fields::CanonicalField;

    fn registry(json: &str) -> FieldRuleRegistry {
        FieldRuleRegistry::from_json(json).expect("valid rules")
    }

    #[test]
    fn first_registered_rule_wins() {
        let registry = registry(
            r#"[
                {"patterns": [{"regex": "^Balance"}], "key": "balance", "normalizer": "currency"},
                {"patterns": ["Balance / Past Due:"], "keys": ["balance", "past_due"]}
            ]"#,
        );

        let rule = registry.find_rule("Balance / Past Due:").expect("rule");
        assert_eq!(
            rule.target(),
            &RuleTarget::Single(CanonicalField::Balance.into())
        );
    }

    #[test]
    fn exact_patterns_are_case_sensitive_unless_regex_says_otherwise() {
        let registry = registry(
            r#"[
                {"patterns": ["Account #:"], "key": "account_number"},
                {"patterns": [{"regex": "^payment status:?$", "case_insensitive": true}], "key": "payment_status"}
            ]"#,
        );

        assert!(registry.find_rule("Account #:").is_some());
        assert!(registry.find_rule("account #:").is_none());
        assert!(registry.find_rule("Payment Status:").is_some());
        assert!(registry.find_rule("Creditor Remarks:").is_none());
    }

    #[test]
    fn multi_key_split_normalizes_each_part() {
        let registry = registry(
            r#"[{"patterns": ["Balance/Past Due"], "keys": ["balance", "past_due"], "normalizer": "currency"}]"#,
        );
        let rule = registry.find_rule("Balance/Past Due").expect("rule");

        let extracted = rule.extract("$500/$0");
        assert_eq!(
            extracted,
            vec![
                (
                    FieldKey::from(CanonicalField::Balance),
                    FieldValue::Number(500.0),
                    "$500".to_string()
                ),
                (
                    FieldKey::from(CanonicalField::PastDue),
                    FieldValue::Number(0.0),
                    "$0".to_string()
                ),
            ]
        );
    }

    #[test]
    fn missing_trailing_parts_normalize_from_empty() {
        let rule = FieldRule::compile(
            0,
            FieldRuleDefinition {
                patterns: vec![PatternDefinition::Exact("Lates".to_string())],
                key: None,
                keys: Some(vec![
                    "times_30_late".to_string(),
                    "times_60_late".to_string(),
                    "times_90_late".to_string(),
                ]),
                split: Some("/".to_string()),
                normalizer: Some("integer".to_string()),
            },
        )
        .expect("compile");

        let extracted = rule.extract("2/1");
        assert_eq!(extracted[2].1, FieldValue::Empty);
        assert_eq!(extracted[2].2, "");
    }

    #[test]
    fn malformed_rules_fail_at_construction() {
        let both = FieldRuleRegistry::from_json(
            r#"[{"patterns": ["x"], "key": "balance", "keys": ["balance"]}]"#,
        );
        assert!(matches!(
            both,
            Err(RuleLoadError::InvalidFieldRule { index: 0, .. })
        ));

        let neither = FieldRuleRegistry::from_json(r#"[{"patterns": ["x"]}]"#);
        assert!(matches!(neither, Err(RuleLoadError::InvalidFieldRule { .. })));

        let bad_regex =
            FieldRuleRegistry::from_json(r#"[{"patterns": [{"regex": "("}], "key": "balance"}]"#);
        assert!(matches!(bad_regex, Err(RuleLoadError::InvalidPattern { .. })));

        let bad_normalizer = FieldRuleRegistry::from_json(
            r#"[{"patterns": ["x"], "key": "balance", "normalizer": "magic"}]"#,
        );
        assert!(matches!(
            bad_normalizer,
            Err(RuleLoadError::UnknownNormalizer { .. })
        ));

        let raw_key =
            FieldRuleRegistry::from_json(r#"[{"patterns": ["x"], "key": "balance_raw"}]"#);
        assert!(matches!(raw_key, Err(RuleLoadError::InvalidFieldRule { .. })));

        let not_json = FieldRuleRegistry::from_json("{");
        assert!(matches!(not_json, Err(RuleLoadError::Json { .. })));
    }
}
