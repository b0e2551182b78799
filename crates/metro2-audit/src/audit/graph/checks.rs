use serde_json::Value;

use crate::audit::fields::{parse_number, FieldValue};

/// Fixed operator vocabulary for `checks` entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckOperator {
    GreaterThan(f64),
    NotZero,
    Blank,
    Required,
}

/// A known numeric operator whose `value` is not a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidThreshold;

impl CheckOperator {
    /// `Ok(None)` for operator names outside the vocabulary.
    pub fn parse(name: &str, value: Option<&Value>) -> Result<Option<Self>, InvalidThreshold> {
        let operator = match name.trim() {
            "numericGreaterThan" | "gt" => {
                Self::GreaterThan(threshold(value).ok_or(InvalidThreshold)?)
            }
            "notZero" | "numericNotZero" => Self::NotZero,
            "blank" | "empty" => Self::Blank,
            "required" | "notBlank" | "exists" => Self::Required,
            _ => return Ok(None),
        };
        Ok(Some(operator))
    }

    /// Missing fields are passed as `None`.
    pub fn holds(self, value: Option<&FieldValue>) -> bool {
        match self {
            CheckOperator::GreaterThan(limit) => number(value).is_some_and(|n| n > limit),
            CheckOperator::NotZero => number(value).is_some_and(|n| n.abs() > 0.0),
            CheckOperator::Blank => value.map_or(true, FieldValue::is_blank),
            CheckOperator::Required => !value.map_or(true, FieldValue::is_blank),
        }
    }
}

fn number(value: Option<&FieldValue>) -> Option<f64> {
    value.and_then(FieldValue::as_number)
}

fn threshold(value: Option<&Value>) -> Option<f64> {
    match value {
        None | Some(Value::Null) => Some(0.0),
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => parse_number(text),
        Some(_) => None,
    }
}
