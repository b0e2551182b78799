use super::fields::{parse_number, FieldValue};
use chrono::{DateTime, NaiveDate};

const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// Value transforms a field rule may reference by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    Identity,
    Currency,
    Date,
    Integer,
    Upper,
}

impl Normalizer {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "identity" | "text" => Some(Self::Identity),
            "currency" | "money" => Some(Self::Currency),
            "date" => Some(Self::Date),
            "integer" | "count" => Some(Self::Integer),
            "upper" | "uppercase" => Some(Self::Upper),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Normalizer::Identity => "identity",
            Normalizer::Currency => "currency",
            Normalizer::Date => "date",
            Normalizer::Integer => "integer",
            Normalizer::Upper => "upper",
        }
    }

    pub fn apply(self, raw: &str) -> FieldValue {
        match self {
            Normalizer::Identity => FieldValue::text(raw.trim()),
            Normalizer::Currency => normalize_currency(raw),
            Normalizer::Date => normalize_date(raw),
            Normalizer::Integer => normalize_integer(raw),
            Normalizer::Upper => FieldValue::text(raw.trim().to_uppercase()),
        }
    }
}

/// `"$1,250.00"` becomes `1250.0`; anything without a readable number becomes `Empty`.
pub fn normalize_currency(raw: &str) -> FieldValue {
    parse_number(raw)
        .map(FieldValue::Number)
        .unwrap_or(FieldValue::Empty)
}

/// Canonicalizes to `YYYY-MM-DD`. Unreadable dates become an empty string.
pub fn normalize_date(raw: &str) -> FieldValue {
    let formatted = parse_date(raw)
        .map(|date| date.format(CANONICAL_DATE_FORMAT).to_string())
        .unwrap_or_default();
    FieldValue::Text(formatted)
}

pub fn normalize_integer(raw: &str) -> FieldValue {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits
        .parse::<u64>()
        .map(|count| FieldValue::Number(count as f64))
        .unwrap_or(FieldValue::Empty)
}

/// Collapses whitespace runs and strips zero-width marks left behind by report exporters.
pub fn clean_cell_text(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc().date());
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, CANONICAL_DATE_FORMAT) {
        return Some(date);
    }

    let two_digit_year = trimmed
        .rsplit(['/', '-'])
        .next()
        .is_some_and(|year| year.len() == 2 && year.chars().all(|c| c.is_ascii_digit()));
    let day_formats: &[&str] = if two_digit_year {
        &["%m/%d/%y", "%m-%d-%y"]
    } else {
        &["%m/%d/%Y", "%m-%d-%Y", "%b %d, %Y", "%B %d, %Y", "%d %b %Y"]
    };

    for format in day_formats {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    // Month-only dates are pinned to the first of the month.
    let first_of_month: &[(&str, &str)] = &[("01/", "%d/%m/%Y"), ("1 ", "%d %B %Y"), ("1 ", "%d %b %Y")];
    for (prefix, format) in first_of_month {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{prefix}{trimmed}"), format) {
            return Some(date);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_strips_symbols_and_separators() {
        assert_eq!(normalize_currency("$1,250.00"), FieldValue::Number(1250.0));
        assert_eq!(normalize_currency("$0"), FieldValue::Number(0.0));
        assert_eq!(normalize_currency("-"), FieldValue::Empty);
        assert_eq!(normalize_currency(""), FieldValue::Empty);
    }

    #[test]
    fn dates_canonicalize_common_report_formats() {
        assert_eq!(normalize_date("03/15/2019"), FieldValue::text("2019-03-15"));
        assert_eq!(normalize_date("3/5/19"), FieldValue::text("2019-03-05"));
        assert_eq!(normalize_date("2019-03-15"), FieldValue::text("2019-03-15"));
        assert_eq!(normalize_date("Mar 15, 2019"), FieldValue::text("2019-03-15"));
        assert_eq!(normalize_date("03/2019"), FieldValue::text("2019-03-01"));
        assert_eq!(normalize_date("March 2019"), FieldValue::text("2019-03-01"));
        assert_eq!(
            normalize_date("2019-03-15T10:00:00Z"),
            FieldValue::text("2019-03-15")
        );
    }

    #[test]
    fn unreadable_dates_become_empty_strings() {
        assert_eq!(normalize_date("-"), FieldValue::text(""));
        assert_eq!(normalize_date("soon"), FieldValue::text(""));
        assert_eq!(normalize_date("  "), FieldValue::text(""));
    }

    #[test]
    fn integer_and_identity_normalizers() {
        assert_eq!(normalize_integer("3"), FieldValue::Number(3.0));
        assert_eq!(normalize_integer(""), FieldValue::Empty);
        assert_eq!(Normalizer::Identity.apply("  Open "), FieldValue::text("Open"));
        assert_eq!(Normalizer::Upper.apply("individual"), FieldValue::text("INDIVIDUAL"));
    }

    #[test]
    fn normalizer_names_resolve() {
        assert_eq!(Normalizer::from_name("Currency"), Some(Normalizer::Currency));
        assert_eq!(Normalizer::from_name("date"), Some(Normalizer::Date));
        assert_eq!(Normalizer::from_name("sparkle"), None);
    }

    #[test]
    fn cell_text_cleaning_collapses_whitespace() {
        assert_eq!(
            clean_cell_text("\u{feff}Account \n\t #:\u{a0}"),
            "Account #:"
        );
    }
}
