//! Key and value formatting between wire and canonical representations.
//!
//! Canonical names are underscored; the wire format is chosen per request.
//! `format` and `unformat` are inverses for every valid field name.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Wire-format policy for member names and URL segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    /// Canonical snake_case, passed through unchanged.
    #[default]
    Underscored,
    /// lowerCamelCase on the wire.
    Camelized,
    /// dash-separated on the wire.
    Dasherized,
}

impl KeyFormat {
    /// Parse a key format name. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "underscored" => Some(KeyFormat::Underscored),
            "camelized" => Some(KeyFormat::Camelized),
            "dasherized" => Some(KeyFormat::Dasherized),
            _ => None,
        }
    }

    /// Map a canonical (underscored) name to its wire form.
    pub fn format(&self, key: &str) -> String {
        match self {
            KeyFormat::Underscored => key.to_string(),
            KeyFormat::Camelized => camelize(key),
            KeyFormat::Dasherized => key.replace('_', "-"),
        }
    }

    /// Map a wire-form name back to its canonical form.
    pub fn unformat(&self, key: &str) -> String {
        match self {
            KeyFormat::Underscored => key.to_string(),
            KeyFormat::Camelized => underscore(key),
            KeyFormat::Dasherized => key.replace('-', "_"),
        }
    }
}

fn camelize(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn underscore(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_uppercase() {
            out.push('_');
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Per-attribute value format tag.
///
/// The default tag is identity; primary keys carry the `id` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeFormat {
    #[default]
    Default,
    /// Encoded as a string on the wire regardless of storage type.
    Id,
    /// Coerced to an integer on input.
    Integer,
}

impl AttributeFormat {
    /// Format a canonical value for the output document.
    pub fn format(&self, value: &Value) -> Value {
        match self {
            AttributeFormat::Default | AttributeFormat::Integer => value.clone(),
            AttributeFormat::Id => match scalar_to_string(value) {
                Some(s) => Value::String(s),
                None => value.clone(),
            },
        }
    }

    /// Coerce a raw input value to its canonical form.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFieldValue` when the raw value cannot be coerced.
    pub fn unformat(&self, field: &str, value: &Value) -> Result<Value, ProtocolError> {
        match self {
            AttributeFormat::Default => Ok(value.clone()),
            AttributeFormat::Id => match scalar_to_string(value) {
                Some(s) => Ok(Value::String(s)),
                None => Err(invalid_field_value(field, value)),
            },
            AttributeFormat::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::String(s) => match s.trim().parse::<i64>() {
                    Ok(n) => Ok(Value::from(n)),
                    Err(_) => Err(invalid_field_value(field, value)),
                },
                _ => Err(invalid_field_value(field, value)),
            },
        }
    }
}

fn invalid_field_value(field: &str, value: &Value) -> ProtocolError {
    ProtocolError::InvalidFieldValue {
        field: field.to_string(),
        value: display_value(value),
    }
}

/// String form of a scalar JSON value, `None` for null and composites.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Compact display form of a JSON value for error details.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn camelized_roundtrip() {
        let format = KeyFormat::Camelized;
        for key in ["created_at", "title", "iso_currency_code"] {
            assert_eq!(format.unformat(&format.format(key)), key);
        }
        assert_eq!(format.format("created_at"), "createdAt");
        assert_eq!(format.unformat("createdAt"), "created_at");
    }

    #[test]
    fn dasherized_roundtrip() {
        let format = KeyFormat::Dasherized;
        assert_eq!(format.format("created_at"), "created-at");
        assert_eq!(format.unformat("created-at"), "created_at");
    }

    #[test]
    fn underscored_is_identity() {
        let format = KeyFormat::Underscored;
        assert_eq!(format.format("created_at"), "created_at");
        assert_eq!(format.unformat("created_at"), "created_at");
    }

    #[test]
    fn key_format_parse() {
        assert_eq!(KeyFormat::parse("camelized"), Some(KeyFormat::Camelized));
        assert_eq!(KeyFormat::parse("snake"), None);
    }

    #[test]
    fn id_format_stringifies_numbers() {
        assert_eq!(AttributeFormat::Id.format(&json!(12)), json!("12"));
        assert_eq!(AttributeFormat::Id.format(&json!("12")), json!("12"));
    }

    #[test]
    fn id_unformat_rejects_composites() {
        let result = AttributeFormat::Id.unformat("id", &json!([1, 2]));
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn integer_unformat_coerces_strings() {
        assert_eq!(
            AttributeFormat::Integer.unformat("cost", &json!("42")).unwrap(),
            json!(42)
        );
        assert_eq!(
            AttributeFormat::Integer.unformat("cost", &json!(42)).unwrap(),
            json!(42)
        );
    }

    #[test]
    fn integer_unformat_rejects_garbage() {
        let result = AttributeFormat::Integer.unformat("cost", &json!("a lot"));
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidFieldValue { field, .. }) if field == "cost"
        ));
    }
}
