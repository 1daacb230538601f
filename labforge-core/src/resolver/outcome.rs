//! Validation of the reaction JSON returned by the inference service.

use labforge_schemas::reaction::{OutcomeSource, ReactionOutcome, ReactionProduct};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutcomeError {
    #[error("response is not valid JSON: {0}")]
    Json(String),
    #[error("response is not a JSON object")]
    NotAnObject,
    #[error("required field `{0}` is missing or has the wrong type")]
    MissingField(&'static str),
}

/// Removes ```json / ``` fences the model likes to wrap its answer in.
pub fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    loop {
        let lower = text.to_ascii_lowercase();
        match lower.find("```json") {
            Some(at) => text.replace_range(at..at + "```json".len(), ""),
            None => break,
        }
    }
    text.replace("```", "").trim().to_string()
}

/// Parses and validates a raw response body.
pub fn parse_outcome(raw: &str, volume_a: f64, volume_b: f64) -> Result<ReactionOutcome, OutcomeError> {
    let cleaned = strip_code_fences(raw);
    let value: Value =
        serde_json::from_str(&cleaned).map_err(|e| OutcomeError::Json(e.to_string()))?;
    normalize_value(&value, volume_a, volume_b, OutcomeSource::Remote)
}

/// Builds a strictly typed outcome out of loosely typed JSON.
///
/// `reactionName` (non-empty string) and `reacts` (boolean) are required.
/// Numbers may arrive as numbers or numeric strings; anything else reads
/// as zero. A missing or non-positive `outputVolume` becomes
/// `volume_a + volume_b`.
pub fn normalize_value(
    value: &Value,
    volume_a: f64,
    volume_b: f64,
    source: OutcomeSource,
) -> Result<ReactionOutcome, OutcomeError> {
    let obj = value.as_object().ok_or(OutcomeError::NotAnObject)?;

    let reaction_name = text(obj, "reactionName").ok_or(OutcomeError::MissingField("reactionName"))?;
    let reacts = obj
        .get("reacts")
        .and_then(Value::as_bool)
        .ok_or(OutcomeError::MissingField("reacts"))?;

    let combined = finite_or_zero(volume_a) + finite_or_zero(volume_b);
    let output_volume = number(obj, "outputVolume")
        .filter(|v| *v > 0.0)
        .unwrap_or(combined);

    Ok(ReactionOutcome {
        reaction_name,
        equation: text(obj, "equation").unwrap_or_default(),
        description: text(obj, "description").unwrap_or_default(),
        reaction_type: text(obj, "type").unwrap_or_default(),
        reacts,
        products: products(obj),
        output_chemical: text(obj, "outputChemical"),
        output_volume,
        final_color: text(obj, "finalColor"),
        final_temperature: number(obj, "finalTemperature"),
        gas: text(obj, "gas"),
        precipitate: text(obj, "precipitate"),
        danger: text(obj, "danger"),
        safety_level: text(obj, "safetyLevel"),
        energy: number(obj, "energy").unwrap_or(0.0),
        color_change: None,
        source,
    })
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let n = match obj.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

fn products(obj: &Map<String, Value>) -> Vec<ReactionProduct> {
    let Some(items) = obj.get("products").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) if !name.trim().is_empty() => Some(ReactionProduct {
                name: name.trim().to_string(),
                state: String::new(),
                color: String::new(),
            }),
            Value::Object(product) => Some(ReactionProduct {
                name: text(product, "name")?,
                state: text(product, "state").unwrap_or_default(),
                color: text(product, "color").unwrap_or_default(),
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEUTRALIZATION: &str = r##"{
        "reactionName": "Neutralization",
        "equation": "HCl + NaOH -> NaCl + H2O",
        "description": "Acid meets base.",
        "type": "acid_base",
        "reacts": true,
        "products": [{"name": "NaCl", "state": "aq", "color": "clear"}, {"name": ""}],
        "outputChemical": "Salt Water",
        "outputVolume": 0,
        "finalColor": "#F0F8FF",
        "finalTemperature": "31.5",
        "gas": "",
        "precipitate": "",
        "danger": "",
        "safetyLevel": "safe",
        "energy": 57.3
    }"##;

    #[test]
    fn fenced_response_is_unwrapped() {
        let wrapped = format!("```json\n{NEUTRALIZATION}\n```");
        let outcome = parse_outcome(&wrapped, 50.0, 50.0).unwrap();
        assert_eq!(outcome.reaction_name, "Neutralization");
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.output_volume, 100.0);
        assert_eq!(outcome.final_temperature, Some(31.5));
        assert_eq!(outcome.gas, None);
        assert_eq!(outcome.energy, 57.3);
        assert_eq!(outcome.source, OutcomeSource::Remote);
    }

    #[test]
    fn uppercase_fence_is_unwrapped() {
        assert_eq!(strip_code_fences("```JSON\n{}\n```"), "{}");
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = parse_outcome("Sure! Here is the reaction: {", 1.0, 1.0).unwrap_err();
        assert!(matches!(err, OutcomeError::Json(_)));
    }

    #[test]
    fn missing_reacts_flag_is_an_error() {
        let err = parse_outcome(r#"{"reactionName": "X"}"#, 1.0, 1.0).unwrap_err();
        assert_eq!(err, OutcomeError::MissingField("reacts"));
    }

    #[test]
    fn non_object_is_an_error() {
        assert_eq!(parse_outcome("[1, 2]", 1.0, 1.0).unwrap_err(), OutcomeError::NotAnObject);
    }

    #[test]
    fn garbage_numbers_read_as_zero() {
        let outcome = parse_outcome(
            r#"{"reactionName": "No Reaction", "reacts": false, "energy": "lots", "outputVolume": -4}"#,
            10.0,
            f64::NAN,
        )
        .unwrap();
        assert!(!outcome.reacts);
        assert_eq!(outcome.energy, 0.0);
        assert_eq!(outcome.output_volume, 10.0);
    }
}
