//! Custom serde deserializers for flexible type handling
//!
//! Listing APIs are inconsistent about field types: the same rating can arrive
//! as `4.5`, `"4.5"` or `"4.5 stars"`, and durations as `5` or `"5 hours"`.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum FlexibleValue {
    Float(f64),
    Int(i64),
    String(String),
    Bool(bool),
}

/// Deserialize an optional number that may be encoded as:
/// - JSON number: `4.5`, `4`
/// - String with a leading number: `"4.5"`, `"4.5 stars"`
///
/// Anything else (empty strings, booleans, text without a number) becomes
/// `None`; scraped data is never rejected over a cosmetic field.
pub fn deserialize_flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<FlexibleValue> = Option::deserialize(deserializer)?;

    Ok(match value {
        None | Some(FlexibleValue::Bool(_)) => None,
        Some(FlexibleValue::Float(f)) => Some(f),
        Some(FlexibleValue::Int(i)) => Some(i as f64),
        Some(FlexibleValue::String(s)) => leading_number(&s),
    })
}

/// Deserialize an optional free-form text field that may arrive as a number.
///
/// Numbers are rendered back to text (`5` -> `"5"`), blank strings become `None`.
pub fn deserialize_flexible_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<FlexibleValue> = Option::deserialize(deserializer)?;

    Ok(match value {
        None | Some(FlexibleValue::Bool(_)) => None,
        Some(FlexibleValue::Float(f)) => Some(f.to_string()),
        Some(FlexibleValue::Int(i)) => Some(i.to_string()),
        Some(FlexibleValue::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
    })
}

/// Parse the first decimal number in `text`
pub fn leading_number(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Listing {
        #[serde(default, deserialize_with = "deserialize_flexible_f64")]
        rating: Option<f64>,
        #[serde(default, deserialize_with = "deserialize_flexible_text")]
        duration: Option<String>,
    }

    #[test]
    fn test_rating_as_number() {
        let result: Listing = serde_json::from_value(json!({"rating": 4.5})).unwrap();
        assert_eq!(result.rating, Some(4.5));
    }

    #[test]
    fn test_rating_as_integer() {
        let result: Listing = serde_json::from_value(json!({"rating": 4})).unwrap();
        assert_eq!(result.rating, Some(4.0));
    }

    #[test]
    fn test_rating_as_string() {
        let result: Listing = serde_json::from_value(json!({"rating": "4.7"})).unwrap();
        assert_eq!(result.rating, Some(4.7));
    }

    #[test]
    fn test_rating_with_suffix() {
        let result: Listing = serde_json::from_value(json!({"rating": "4.1 stars"})).unwrap();
        assert_eq!(result.rating, Some(4.1));
    }

    #[test]
    fn test_rating_unparseable_is_none() {
        let result: Listing = serde_json::from_value(json!({"rating": "n/a"})).unwrap();
        assert_eq!(result.rating, None);

        let result: Listing = serde_json::from_value(json!({"rating": ""})).unwrap();
        assert_eq!(result.rating, None);
    }

    #[test]
    fn test_null_and_missing() {
        let result: Listing = serde_json::from_value(json!({"rating": null})).unwrap();
        assert_eq!(result.rating, None);

        let result: Listing = serde_json::from_value(json!({})).unwrap();
        assert_eq!(result, Listing { rating: None, duration: None });
    }

    #[test]
    fn test_duration_number_becomes_text() {
        let result: Listing = serde_json::from_value(json!({"duration": 5})).unwrap();
        assert_eq!(result.duration.as_deref(), Some("5"));
    }

    #[test]
    fn test_duration_blank_is_none() {
        let result: Listing = serde_json::from_value(json!({"duration": "   "})).unwrap();
        assert_eq!(result.duration, None);
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("  12.5 hours"), Some(12.5));
        assert_eq!(leading_number("hours"), None);
    }
}
