//! Validated, not-yet-executed mutation operations.
//!
//! The parser emits operations in request order; execution (and any retry
//! policy) belongs to the storage layer.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Result of validating a raw payload against a permitted-fields set.
///
/// Attribute values are already unformatted; association keys are already
/// verified against the target type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerifiedParamSet {
    pub attributes: Map<String, Value>,
    pub has_one: BTreeMap<String, Option<String>>,
    pub has_many: BTreeMap<String, Vec<String>>,
}

/// One validated mutation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateResource {
        #[serde(rename = "type")]
        type_name: String,
        params: VerifiedParamSet,
    },
    ReplaceFields {
        #[serde(rename = "type")]
        type_name: String,
        key: String,
        params: VerifiedParamSet,
    },
    RemoveResource {
        #[serde(rename = "type")]
        type_name: String,
        key: String,
    },
    CreateHasOneAssociation {
        #[serde(rename = "type")]
        type_name: String,
        parent_key: String,
        association: String,
        key: Option<String>,
    },
    ReplaceHasOneAssociation {
        #[serde(rename = "type")]
        type_name: String,
        parent_key: String,
        association: String,
        key: Option<String>,
    },
    RemoveHasOneAssociation {
        #[serde(rename = "type")]
        type_name: String,
        parent_key: String,
        association: String,
    },
    CreateHasManyAssociation {
        #[serde(rename = "type")]
        type_name: String,
        parent_key: String,
        association: String,
        keys: Vec<String>,
    },
    ReplaceHasManyAssociation {
        #[serde(rename = "type")]
        type_name: String,
        parent_key: String,
        association: String,
        keys: Vec<String>,
    },
    RemoveHasManyAssociation {
        #[serde(rename = "type")]
        type_name: String,
        parent_key: String,
        association: String,
        key: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_serializes_with_tag() {
        let op = Operation::RemoveResource {
            type_name: "posts".into(),
            key: "7".into(),
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({ "op": "remove_resource", "type": "posts", "key": "7" })
        );
    }

    #[test]
    fn param_set_serializes_sections() {
        let mut params = VerifiedParamSet::default();
        params.attributes.insert("title".into(), json!("A post"));
        params.has_one.insert("author".into(), Some("3".into()));
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["attributes"]["title"], "A post");
        assert_eq!(value["has_one"]["author"], "3");
    }
}
