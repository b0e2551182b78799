use super::fields::{BureauFields, CanonicalField, FieldValue};
use super::normalizer::parse_date;

pub const CURRENT_BUT_PASTDUE: &str = "CURRENT_BUT_PASTDUE";
pub const MISSING_DOFD: &str = "MISSING_DOFD";
pub const DOFD_BEFORE_OPEN_DATE: &str = "DOFD_BEFORE_OPEN_DATE";

/// Always-on sanity rule that does not depend on the knowledge graph.
#[derive(Debug, Clone, Copy)]
pub struct StaticValidator {
    pub code: &'static str,
    check: fn(&BureauFields) -> bool,
}

impl StaticValidator {
    pub fn fires(&self, fields: &BureauFields) -> bool {
        (self.check)(fields)
    }
}

/// Evaluated in this order; emitted codes keep it.
pub const STATIC_VALIDATORS: &[StaticValidator] = &[
    StaticValidator {
        code: CURRENT_BUT_PASTDUE,
        check: current_but_past_due,
    },
    StaticValidator {
        code: MISSING_DOFD,
        check: derogatory_without_dofd,
    },
    StaticValidator {
        code: DOFD_BEFORE_OPEN_DATE,
        check: dofd_before_open_date,
    },
];

/// Codes of every static validator that fires, before enrichment.
pub fn validate(fields: &BureauFields) -> Vec<&'static str> {
    STATIC_VALIDATORS
        .iter()
        .filter(|validator| validator.fires(fields))
        .map(|validator| validator.code)
        .collect()
}

fn current_but_past_due(fields: &BureauFields) -> bool {
    let status = StatusWords::of(fields);
    let reads_current = status.has("current") || status.has("paid");
    let past_due = fields
        .value(CanonicalField::PastDue)
        .and_then(FieldValue::as_number)
        .unwrap_or(0.0);
    reads_current && past_due > 0.0
}

fn derogatory_without_dofd(fields: &BureauFields) -> bool {
    let status = StatusWords::of(fields);
    let derogatory = status.has("chargeoff")
        || status.has("collection")
        || status.has("collections")
        || status.has_pair("charge", "off")
        || status.has_pair("charged", "off");
    derogatory && fields.is_blank(CanonicalField::DateOfFirstDelinquency)
}

fn dofd_before_open_date(fields: &BureauFields) -> bool {
    let date = |field| {
        fields
            .value(field)
            .and_then(FieldValue::as_text)
            .and_then(|text| parse_date(&text))
    };
    match (
        date(CanonicalField::DateOfFirstDelinquency),
        date(CanonicalField::DateOpened),
    ) {
        (Some(dofd), Some(opened)) => dofd < opened,
        _ => false,
    }
}

/// Lowercased whole words of the account and payment status fields.
struct StatusWords(Vec<String>);

impl StatusWords {
    fn of(fields: &BureauFields) -> Self {
        let words = [CanonicalField::AccountStatus, CanonicalField::PaymentStatus]
            .into_iter()
            .filter_map(|field| fields.value(field).and_then(FieldValue::as_text))
            .flat_map(|text| {
                text.split(|c: char| !c.is_alphanumeric())
                    .filter(|word| !word.is_empty())
                    .map(str::to_lowercase)
                    .collect::<Vec<_>>()
            })
            .collect();
        Self(words)
    }

    fn has(&self, word: &str) -> bool {
        self.0.iter().any(|candidate| candidate == word)
    }

    fn has_pair(&self, first: &str, second: &str) -> bool {
        self.0
            .windows(2)
            .any(|pair| pair[0] == first && pair[1] == second)
    }
}
