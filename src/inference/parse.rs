use chrono::Utc;
use log::warn;
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::models::{AnalysisResult, ConfidenceLevel};

/// Strictly parse the model's JSON answer.
///
/// `count` must be a non-negative integer and `description` a non-blank string.
/// An unrecognised `confidenceLevel` is dropped rather than failing the call.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let value: Value = serde_json::from_str(text)?;
    let object = value.as_object().ok_or(ParseError::NotAnObject)?;

    Ok(AnalysisResult {
        count: parse_count(object)?,
        description: parse_description(object)?,
        confidence_level: parse_confidence(object),
        analyzed_at: Utc::now(),
    })
}

fn required<'a>(object: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, ParseError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(ParseError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn parse_count(object: &Map<String, Value>) -> Result<u32, ParseError> {
    let value = required(object, "count")?;
    let invalid = |reason: &str| ParseError::InvalidField {
        field: "count",
        reason: reason.to_string(),
    };

    let Value::Number(number) = value else {
        return Err(invalid("not a number"));
    };
    if let Some(count) = number.as_u64() {
        return u32::try_from(count).map_err(|_| invalid("out of range"));
    }
    if number.as_i64().is_some_and(|n| n < 0) {
        return Err(invalid("negative"));
    }
    match number.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) => Ok(f as u32),
        Some(f) if f < 0.0 => Err(invalid("negative")),
        _ => Err(invalid("not an integer")),
    }
}

fn parse_description(object: &Map<String, Value>) -> Result<String, ParseError> {
    match required(object, "description")? {
        Value::String(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Value::String(_) => Err(ParseError::InvalidField {
            field: "description",
            reason: "blank".into(),
        }),
        _ => Err(ParseError::InvalidField {
            field: "description",
            reason: "not a string".into(),
        }),
    }
}

fn parse_confidence(object: &Map<String, Value>) -> Option<ConfidenceLevel> {
    match object.get("confidenceLevel")? {
        Value::String(label) => {
            let level = ConfidenceLevel::from_label(label);
            if level.is_none() {
                warn!("Ignoring unknown confidence level {label:?}");
            }
            level
        }
        Value::Null => None,
        other => {
            warn!("Ignoring non-string confidence level {other}");
            None
        }
    }
}
